use crate::cif_fields::{
    expect_record_type, field, produce_cif_error_closure, read_code, read_date,
    read_optional_string, slice_and_trim, CifCode, CifError, CifErrorType, CifLine,
    HEADER_DATE_FORMAT, HEADER_TIMESTAMP_FORMAT, OPEN_ENDED_DATE,
};
use crate::error::Error;
use crate::nr_json::{NrJsonError, NrJsonMetadata, NrJsonRecord, NrJsonSender, NrJsonTimetable};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateIndicator {
    Full,
    Update,
}

impl CifCode for UpdateIndicator {
    const CODES: &'static [(Self, &'static str)] =
        &[(UpdateIndicator::Full, "F"), (UpdateIndicator::Update, "U")];

    fn invalid(code: String) -> CifErrorType {
        CifErrorType::InvalidUpdateIndicator(code)
    }
}

/// JSON extracts are numbered by days since this date.
fn json_sequence_start_date(sequence: u64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2012, 6, 13)?.checked_add_days(chrono::Days::new(sequence))
}

fn json_sequence_for(date: NaiveDate) -> u64 {
    match NaiveDate::from_ymd_opt(2012, 6, 13) {
        Some(epoch) => u64::try_from((date - epoch).num_days()).unwrap_or(0),
        None => 0,
    }
}

/// The first record of every extract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub file_identity: String,
    pub extracted_at: NaiveDateTime,
    pub current_file_reference: String,
    pub previous_file_reference: Option<String>,
    pub update_indicator: UpdateIndicator,
    pub version: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Header {
    pub fn from_cif(line: &str) -> Result<Header, CifError> {
        expect_record_type(line, &["HD"])?;

        let extracted_at =
            match NaiveDateTime::parse_from_str(field(line, 22, 32), HEADER_TIMESTAMP_FORMAT) {
                Ok(x) => x,
                Err(x) => return Err(CifError::new(CifErrorType::ChronoParseError(x), 22)),
            };
        let code = field(line, 46, 47);
        let error_logic = produce_cif_error_closure(46);
        let update_indicator: UpdateIndicator = match read_code(code, error_logic)? {
            Some(x) => x,
            None => {
                return Err(CifError::new(
                    CifErrorType::InvalidUpdateIndicator(code.to_string()),
                    46,
                ))
            }
        };

        Ok(Header {
            file_identity: slice_and_trim(line, 2, 22),
            extracted_at,
            current_file_reference: slice_and_trim(line, 32, 39),
            previous_file_reference: read_optional_string(field(line, 39, 46)),
            update_indicator,
            version: read_optional_string(field(line, 47, 48)),
            start_date: read_date(
                field(line, 48, 54),
                HEADER_DATE_FORMAT,
                produce_cif_error_closure(48),
            )?,
            end_date: read_date(
                field(line, 54, 60),
                HEADER_DATE_FORMAT,
                produce_cif_error_closure(54),
            )?,
        })
    }

    pub fn to_cif(&self) -> String {
        let extracted_at = self.extracted_at.format(HEADER_TIMESTAMP_FORMAT).to_string();
        CifLine::new("HD")
            .text(2, 20, Some(&self.file_identity))
            .text(22, 10, Some(&extracted_at))
            .text(32, 7, Some(&self.current_file_reference))
            .text(39, 7, self.previous_file_reference.as_deref())
            .code(46, 1, Some(self.update_indicator))
            .text(47, 1, self.version.as_deref())
            .date(48, Some(self.start_date), HEADER_DATE_FORMAT)
            .date(54, Some(self.end_date), HEADER_DATE_FORMAT)
            .finish()
    }

    /// The `Metadata.sequence` of a JSON extract stands in for the file
    /// references; an update's predecessor is the previous sequence number.
    pub fn from_nr_json(timetable: &NrJsonTimetable) -> Result<Header, NrJsonError> {
        let extracted_at = match DateTime::from_timestamp(timetable.timestamp, 0) {
            Some(x) => x.naive_utc(),
            None => {
                return Err(NrJsonError::new(
                    CifErrorType::InvalidNumber(timetable.timestamp.to_string()),
                    "timestamp",
                ))
            }
        };
        let update_indicator = match timetable.metadata.file_type.to_lowercase().as_str() {
            "full" => UpdateIndicator::Full,
            "update" => UpdateIndicator::Update,
            _ => {
                return Err(NrJsonError::new(
                    CifErrorType::InvalidUpdateIndicator(timetable.metadata.file_type.clone()),
                    "type",
                ))
            }
        };
        let sequence = timetable.metadata.sequence;
        let start_date = json_sequence_start_date(sequence).ok_or_else(|| {
            NrJsonError::new(CifErrorType::InvalidSequence(sequence.to_string()), "sequence")
        })?;
        let previous_file_reference = match update_indicator {
            UpdateIndicator::Full => None,
            UpdateIndicator::Update => sequence.checked_sub(1).map(|x| x.to_string()),
        };

        Ok(Header {
            file_identity: timetable.owner.clone(),
            extracted_at,
            current_file_reference: sequence.to_string(),
            previous_file_reference,
            update_indicator,
            version: None,
            start_date,
            end_date: OPEN_ENDED_DATE,
        })
    }

    pub fn from_json(line: &str) -> Result<Header, Error> {
        match serde_json::from_str::<NrJsonRecord>(line)? {
            NrJsonRecord::Header(x) => Ok(Header::from_nr_json(&x)?),
            _ => Err(Error::NrJsonError(NrJsonError::new(
                CifErrorType::InvalidRecordType(line.chars().take(20).collect()),
                "JsonTimetableV1",
            ))),
        }
    }

    pub fn to_nr_json(&self) -> NrJsonTimetable {
        let sequence = self
            .current_file_reference
            .parse::<u64>()
            .unwrap_or_else(|_| json_sequence_for(self.start_date));
        NrJsonTimetable {
            classification: "public".to_string(),
            timestamp: self.extracted_at.and_utc().timestamp(),
            owner: self.file_identity.clone(),
            sender: NrJsonSender {
                organisation: String::new(),
                application: "NTROD".to_string(),
                component: "SCHEDULE".to_string(),
            },
            metadata: NrJsonMetadata {
                file_type: match self.update_indicator {
                    UpdateIndicator::Full => "full".to_string(),
                    UpdateIndicator::Update => "update".to_string(),
                },
                sequence,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&NrJsonRecord::Header(self.to_nr_json()))
    }

    /// Identifies the file in the update chain.
    pub fn key(&self) -> &str {
        &self.current_file_reference
    }

    pub fn is_full(&self) -> bool {
        self.update_indicator == UpdateIndicator::Full
    }

    pub fn is_update(&self) -> bool {
        self.update_indicator == UpdateIndicator::Update
    }

    /// A full extract header covering the same period, as written at the top
    /// of a regenerated extract.
    pub fn to_full_extract(&self) -> Header {
        Header {
            file_identity: String::new(),
            extracted_at: self.extracted_at,
            current_file_reference: String::new(),
            previous_file_reference: None,
            update_indicator: UpdateIndicator::Full,
            version: None,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "File {:?} (version {}) at {}. {} extract for {} to {}.",
            self.file_identity,
            self.version.as_deref().unwrap_or(""),
            self.extracted_at.format("%Y-%m-%d %H:%M"),
            if self.is_full() { "A full" } else { "An update" },
            self.start_date,
            self.end_date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_line() -> String {
        format!("{:<80}", "HDTPS.UDFROC1.PD1806181906181945DFROC1MDFROC1LUA190618190619")
    }

    #[test]
    fn reads_cif() {
        let header = Header::from_cif(&update_line()).unwrap();
        assert_eq!(header.file_identity, "TPS.UDFROC1.PD180618");
        assert_eq!(
            header.extracted_at,
            NaiveDate::from_ymd_opt(2018, 6, 19).unwrap().and_hms_opt(19, 45, 0).unwrap()
        );
        assert_eq!(header.key(), "DFROC1M");
        assert_eq!(header.previous_file_reference.as_deref(), Some("DFROC1L"));
        assert!(header.is_update());
        assert_eq!(header.version.as_deref(), Some("A"));
        assert_eq!(header.start_date, NaiveDate::from_ymd_opt(2018, 6, 19).unwrap());
        assert_eq!(header.end_date, NaiveDate::from_ymd_opt(2019, 6, 19).unwrap());
    }

    #[test]
    fn cif_round_trip() {
        let line = update_line();
        assert_eq!(Header::from_cif(&line).unwrap().to_cif(), line);
    }

    #[test]
    fn open_ended_header() {
        let line = format!(
            "{:<80}",
            "HDTPS.UDFROC1.PD1806181906181945DFROC1MDFROC1LFA190618999999"
        );
        let header = Header::from_cif(&line).unwrap();
        assert_eq!(header.end_date, OPEN_ENDED_DATE);
        assert!(header.is_full());
        assert_eq!(header.to_cif(), line);
    }

    #[test]
    fn rejects_other_records() {
        let error = Header::from_cif(&format!("{:<80}", "TIABCDE")).unwrap_err();
        assert!(matches!(error.error_type(), CifErrorType::InvalidRecordType(_)));
    }

    #[test]
    fn rejects_bad_indicator() {
        let line = format!(
            "{:<80}",
            "HDTPS.UDFROC1.PD1806181906181945DFROC1MDFROC1LXA190618190619"
        );
        let error = Header::from_cif(&line).unwrap_err();
        assert_eq!(error.column(), 46);
    }

    #[test]
    fn full_extract_header() {
        let header = Header::from_cif(&update_line()).unwrap().to_full_extract();
        assert_eq!(
            header.to_cif(),
            format!(
                "{:<80}",
                format!("HD{}1906181945{}F {}", " ".repeat(20), " ".repeat(14), "190618190619")
            )
        );
    }

    #[test]
    fn display() {
        let header = Header::from_cif(&update_line()).unwrap();
        assert_eq!(
            header.to_string(),
            "File \"TPS.UDFROC1.PD180618\" (version A) at 2018-06-19 19:45. An update extract for 2018-06-19 to 2019-06-19."
        );
    }

    #[test]
    fn reads_json() {
        let line = r#"{"JsonTimetableV1":{"classification":"public","timestamp":1529438700,"owner":"Network Rail","Sender":{"organisation":"Rockshore","application":"NTROD","component":"SCHEDULE"},"Metadata":{"type":"update","sequence":2211}}}"#;
        let header = Header::from_json(line).unwrap();
        assert!(header.is_update());
        assert_eq!(header.current_file_reference, "2211");
        assert_eq!(header.previous_file_reference.as_deref(), Some("2210"));
        assert_eq!(header.start_date, NaiveDate::from_ymd_opt(2018, 7, 3).unwrap());
        assert_eq!(header.end_date, OPEN_ENDED_DATE);
        assert_eq!(
            header.extracted_at,
            NaiveDate::from_ymd_opt(2018, 6, 19).unwrap().and_hms_opt(20, 5, 0).unwrap()
        );
    }

    #[test]
    fn json_round_trip() {
        let line = r#"{"JsonTimetableV1":{"classification":"public","timestamp":1529438700,"owner":"Network Rail","Sender":{"organisation":"","application":"NTROD","component":"SCHEDULE"},"Metadata":{"type":"full","sequence":2211}}}"#;
        let header = Header::from_json(line).unwrap();
        assert_eq!(header.to_json().unwrap(), line);
        assert_eq!(Header::from_json(&header.to_json().unwrap()).unwrap(), header);
    }
}
