//! Line-delimited JSON encoding of the extract. Each line is a single object
//! whose only key names the record type.

use crate::cif_fields::{CifErrorType, OPEN_ENDED_DATE};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use std::fmt;

pub const JSON_DATE_FORMAT: &str = "%Y-%m-%d";
pub const JSON_OPEN_ENDED_DATE: &str = "9999-12-31";

pub const NR_JSON_HEADER_KEY: &str = "JsonTimetableV1";
pub const NR_JSON_TIPLOC_KEY: &str = "TiplocV1";
pub const NR_JSON_ASSOCIATION_KEY: &str = "JsonAssociationV1";
pub const NR_JSON_SCHEDULE_KEY: &str = "JsonScheduleV1";
pub const NR_JSON_TRAILER_KEY: &str = "EOF";

#[derive(Debug)]
pub struct NrJsonError {
    error_type: CifErrorType,
    field_name: String,
}

impl NrJsonError {
    pub fn new(error_type: CifErrorType, field_name: &str) -> Self {
        NrJsonError {
            error_type,
            field_name: field_name.to_string(),
        }
    }

    pub fn error_type(&self) -> &CifErrorType {
        &self.error_type
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl fmt::Display for NrJsonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Error reading JSON field {}: {}",
            self.field_name, self.error_type
        )
    }
}

pub(crate) fn produce_nr_json_error_closure(
    field_name: &str,
) -> Box<dyn FnOnce(CifErrorType) -> NrJsonError> {
    let field_name = field_name.to_string();
    Box::new(move |x| NrJsonError {
        error_type: x,
        field_name,
    })
}

/// Some feeds send short codes as bare numbers.
fn deserialize_optional_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(x)) => Some(x),
        Some(x) => Some(x.to_string()),
    })
}

/// Dates arrive either as `YYYY-MM-DD` or as a midnight timestamp.
pub fn read_json_date(value: &str, field_name: &str) -> Result<NaiveDate, NrJsonError> {
    let date = value.get(0..10).unwrap_or(value);
    if date == JSON_OPEN_ENDED_DATE {
        return Ok(OPEN_ENDED_DATE);
    }
    NaiveDate::parse_from_str(date, JSON_DATE_FORMAT)
        .map_err(|x| NrJsonError::new(CifErrorType::ChronoParseError(x), field_name))
}

pub fn read_optional_json_date(
    value: &Option<String>,
    field_name: &str,
) -> Result<Option<NaiveDate>, NrJsonError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(x) => read_json_date(x, field_name).map(Some),
    }
}

pub fn write_json_date(date: NaiveDate) -> String {
    if date == OPEN_ENDED_DATE {
        JSON_OPEN_ENDED_DATE.to_string()
    } else {
        date.format(JSON_DATE_FORMAT).to_string()
    }
}

/// Blank strings carry no more information than a missing key.
pub fn json_string(value: &Option<String>) -> Option<String> {
    match value {
        Some(x) if !x.trim().is_empty() => Some(x.clone()),
        _ => None,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NrJsonRecord {
    #[serde(rename = "JsonTimetableV1")]
    Header(NrJsonTimetable),
    #[serde(rename = "TiplocV1")]
    Tiploc(NrJsonTiploc),
    #[serde(rename = "JsonAssociationV1")]
    Association(NrJsonAssociation),
    #[serde(rename = "JsonScheduleV1")]
    Schedule(NrJsonSchedule),
    #[serde(rename = "EOF")]
    Trailer(bool),
}

impl NrJsonRecord {
    pub fn is_record_key(key: &str) -> bool {
        matches!(
            key,
            NR_JSON_HEADER_KEY
                | NR_JSON_TIPLOC_KEY
                | NR_JSON_ASSOCIATION_KEY
                | NR_JSON_SCHEDULE_KEY
                | NR_JSON_TRAILER_KEY
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NrJsonSender {
    pub organisation: String,
    pub application: String,
    pub component: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NrJsonMetadata {
    #[serde(rename = "type")]
    pub file_type: String,
    pub sequence: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NrJsonTimetable {
    pub classification: String,
    pub timestamp: i64,
    pub owner: String,
    #[serde(rename = "Sender")]
    pub sender: NrJsonSender,
    #[serde(rename = "Metadata")]
    pub metadata: NrJsonMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NrJsonTiploc {
    pub transaction_type: String,
    pub tiploc_code: String,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub nalco: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub stanox: Option<String>,
    #[serde(default)]
    pub crs_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tps_description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NrJsonAssociation {
    pub transaction_type: String,
    pub main_train_uid: String,
    pub assoc_train_uid: String,
    pub assoc_start_date: String,
    #[serde(default)]
    pub assoc_end_date: Option<String>,
    #[serde(default)]
    pub assoc_days: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date_indicator: Option<String>,
    pub location: String,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub base_location_suffix: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub assoc_location_suffix: Option<String>,
    #[serde(default)]
    pub diagram_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assoc_type: Option<String>,
    #[serde(rename = "CIF_stp_indicator")]
    pub cif_stp_indicator: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NrJsonNewScheduleSegment {
    #[serde(default)]
    pub traction_class: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub uic_code: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NrJsonScheduleLocation {
    pub location_type: String,
    pub record_identity: String,
    pub tiploc_code: String,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub tiploc_instance: Option<String>,
    #[serde(default)]
    pub arrival: Option<String>,
    #[serde(default)]
    pub public_arrival: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default)]
    pub public_departure: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub platform: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub engineering_allowance: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub pathing_allowance: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub performance_allowance: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NrJsonScheduleSegment {
    #[serde(default)]
    pub signalling_id: Option<String>,
    #[serde(default, rename = "CIF_train_category")]
    pub cif_train_category: Option<String>,
    #[serde(default, rename = "CIF_headcode", deserialize_with = "deserialize_optional_code")]
    pub cif_headcode: Option<String>,
    #[serde(
        default,
        rename = "CIF_course_indicator",
        deserialize_with = "deserialize_optional_code"
    )]
    pub cif_course_indicator: Option<String>,
    #[serde(
        default,
        rename = "CIF_train_service_code",
        deserialize_with = "deserialize_optional_code"
    )]
    pub cif_train_service_code: Option<String>,
    #[serde(default, rename = "CIF_business_sector")]
    pub cif_business_sector: Option<String>,
    #[serde(default, rename = "CIF_power_type")]
    pub cif_power_type: Option<String>,
    #[serde(default, rename = "CIF_timing_load")]
    pub cif_timing_load: Option<String>,
    #[serde(default, rename = "CIF_speed", deserialize_with = "deserialize_optional_code")]
    pub cif_speed: Option<String>,
    #[serde(default, rename = "CIF_operating_characteristics")]
    pub cif_operating_characteristics: Option<String>,
    #[serde(default, rename = "CIF_train_class")]
    pub cif_train_class: Option<String>,
    #[serde(default, rename = "CIF_sleepers")]
    pub cif_sleepers: Option<String>,
    #[serde(default, rename = "CIF_reservations")]
    pub cif_reservations: Option<String>,
    #[serde(default, rename = "CIF_connection_indicator")]
    pub cif_connection_indicator: Option<String>,
    #[serde(default, rename = "CIF_catering_code")]
    pub cif_catering_code: Option<String>,
    #[serde(default, rename = "CIF_service_branding")]
    pub cif_service_branding: Option<String>,
    #[serde(default)]
    pub schedule_location: Vec<NrJsonScheduleLocation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NrJsonSchedule {
    #[serde(default, rename = "CIF_bank_holiday_running")]
    pub cif_bank_holiday_running: Option<String>,
    #[serde(rename = "CIF_stp_indicator")]
    pub cif_stp_indicator: String,
    #[serde(rename = "CIF_train_uid")]
    pub cif_train_uid: String,
    #[serde(default)]
    pub applicable_timetable: Option<String>,
    #[serde(default)]
    pub atoc_code: Option<String>,
    #[serde(default)]
    pub new_schedule_segment: Option<NrJsonNewScheduleSegment>,
    #[serde(default)]
    pub schedule_days_runs: Option<String>,
    pub schedule_start_date: String,
    #[serde(default)]
    pub schedule_end_date: Option<String>,
    #[serde(default)]
    pub schedule_segment: Option<NrJsonScheduleSegment>,
    #[serde(default)]
    pub train_status: Option<String>,
    pub transaction_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trailer() {
        let record: NrJsonRecord = serde_json::from_str(r#"{"EOF":true}"#).unwrap();
        assert!(matches!(record, NrJsonRecord::Trailer(true)));
        assert_eq!(
            serde_json::to_string(&NrJsonRecord::Trailer(true)).unwrap(),
            r#"{"EOF":true}"#
        );
    }

    #[test]
    fn numeric_codes_become_strings() {
        let tiploc: NrJsonTiploc = serde_json::from_str(
            r#"{"transaction_type":"Create","tiploc_code":"ABCD","nalco":123456,"stanox":null}"#,
        )
        .unwrap();
        assert_eq!(tiploc.nalco, Some("123456".to_string()));
        assert_eq!(tiploc.stanox, None);
        assert_eq!(tiploc.crs_code, None);
    }

    #[test]
    fn record_keys() {
        assert!(NrJsonRecord::is_record_key("TiplocV1"));
        assert!(NrJsonRecord::is_record_key("EOF"));
        assert!(!NrJsonRecord::is_record_key("VSTPCIFMsgV1"));
    }

    #[test]
    fn dates() {
        assert_eq!(
            read_json_date("2018-08-05T00:00:00Z", "assoc_start_date").unwrap(),
            NaiveDate::from_ymd_opt(2018, 8, 5).unwrap()
        );
        assert_eq!(read_json_date("9999-12-31", "schedule_end_date").unwrap(), OPEN_ENDED_DATE);
        assert_eq!(write_json_date(OPEN_ENDED_DATE), "9999-12-31");
        assert_eq!(read_optional_json_date(&None, "x").unwrap(), None);
        let error = read_json_date("05/08/2018", "assoc_start_date").unwrap_err();
        assert_eq!(error.field_name(), "assoc_start_date");
    }
}
