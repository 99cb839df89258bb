use crate::cif_fields::{
    expect_record_type, field, produce_cif_error_closure, read_allowance, read_optional_number,
    read_optional_string, read_optional_wtt_time, read_public_time, read_wtt_time,
    slice_and_trim, write_allowance, write_public_time, write_wtt_time, CifError, CifErrorType,
    CifLine,
};
use crate::nr_json::{
    json_string, produce_nr_json_error_closure, NrJsonError, NrJsonScheduleLocation,
};
use crate::train_schedule::TrainAttributes;

use chrono::NaiveTime;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub tiploc: String,
    pub tiploc_suffix: Option<u8>,
    pub scheduled_departure: NaiveTime,
    pub public_departure: Option<NaiveTime>,
    pub platform: Option<String>,
    pub line: Option<String>,
    pub engineering_allowance: Option<u32>,
    pub pathing_allowance: Option<u32>,
    pub activity: Option<String>,
    pub performance_allowance: Option<u32>,
}

/// A call or a pass. Passing points have only a scheduled pass time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intermediate {
    pub tiploc: String,
    pub tiploc_suffix: Option<u8>,
    pub scheduled_arrival: Option<NaiveTime>,
    pub scheduled_departure: Option<NaiveTime>,
    pub scheduled_pass: Option<NaiveTime>,
    pub public_arrival: Option<NaiveTime>,
    pub public_departure: Option<NaiveTime>,
    pub platform: Option<String>,
    pub line: Option<String>,
    pub path: Option<String>,
    pub activity: Option<String>,
    pub engineering_allowance: Option<u32>,
    pub pathing_allowance: Option<u32>,
    pub performance_allowance: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Terminating {
    pub tiploc: String,
    pub tiploc_suffix: Option<u8>,
    pub scheduled_arrival: NaiveTime,
    pub public_arrival: Option<NaiveTime>,
    pub platform: Option<String>,
    pub path: Option<String>,
    pub activity: Option<String>,
}

/// New operating details which take effect from this location onwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEnRoute {
    pub tiploc: String,
    pub tiploc_suffix: Option<u8>,
    pub attributes: TrainAttributes,
}

impl ChangeEnRoute {
    pub fn apply_to(&self, attributes: &mut TrainAttributes) {
        *attributes = self.attributes.clone();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JourneyEntry {
    Origin(Origin),
    Intermediate(Intermediate),
    Terminating(Terminating),
    ChangeEnRoute(ChangeEnRoute),
}

fn read_suffix(line: &str) -> Result<Option<u8>, CifError> {
    read_optional_number(field(line, 9, 10), produce_cif_error_closure(9))
}

fn location_line(record_type: &str, tiploc: &str, tiploc_suffix: Option<u8>) -> CifLine {
    let mut line = CifLine::new(record_type);
    line.text(2, 7, Some(tiploc)).number(9, 1, tiploc_suffix);
    line
}

impl JourneyEntry {
    pub fn from_cif(line: &str) -> Result<JourneyEntry, CifError> {
        let at = |start: usize, end: usize| field(line, start, end);
        let column = produce_cif_error_closure;
        let entry = match expect_record_type(line, &["LO", "LI", "LT", "CR"])? {
            "LO" => JourneyEntry::Origin(Origin {
                tiploc: slice_and_trim(line, 2, 9),
                tiploc_suffix: read_suffix(line)?,
                scheduled_departure: read_wtt_time(at(10, 15), column(10))?,
                public_departure: read_public_time(at(15, 19), column(15))?,
                platform: read_optional_string(at(19, 22)),
                line: read_optional_string(at(22, 25)),
                engineering_allowance: read_allowance(at(25, 27), column(25))?,
                pathing_allowance: read_allowance(at(27, 29), column(27))?,
                activity: read_optional_string(at(29, 41)),
                performance_allowance: read_allowance(at(41, 43), column(41))?,
            }),
            "LI" => JourneyEntry::Intermediate(Intermediate {
                tiploc: slice_and_trim(line, 2, 9),
                tiploc_suffix: read_suffix(line)?,
                scheduled_arrival: read_optional_wtt_time(at(10, 15), column(10))?,
                scheduled_departure: read_optional_wtt_time(at(15, 20), column(15))?,
                scheduled_pass: read_optional_wtt_time(at(20, 25), column(20))?,
                public_arrival: read_public_time(at(25, 29), column(25))?,
                public_departure: read_public_time(at(29, 33), column(29))?,
                platform: read_optional_string(at(33, 36)),
                line: read_optional_string(at(36, 39)),
                path: read_optional_string(at(39, 42)),
                activity: read_optional_string(at(42, 54)),
                engineering_allowance: read_allowance(at(54, 56), column(54))?,
                pathing_allowance: read_allowance(at(56, 58), column(56))?,
                performance_allowance: read_allowance(at(58, 60), column(58))?,
            }),
            "LT" => JourneyEntry::Terminating(Terminating {
                tiploc: slice_and_trim(line, 2, 9),
                tiploc_suffix: read_suffix(line)?,
                scheduled_arrival: read_wtt_time(at(10, 15), column(10))?,
                public_arrival: read_public_time(at(15, 19), column(15))?,
                platform: read_optional_string(at(19, 22)),
                path: read_optional_string(at(22, 25)),
                activity: read_optional_string(at(25, 37)),
            }),
            _ => {
                let mut attributes = TrainAttributes::read_cif(line, 10)?;
                attributes.traction_class = read_optional_string(at(58, 62));
                attributes.uic_code = read_optional_number(at(62, 67), column(62))?;
                attributes.retail_service_id = read_optional_string(at(67, 75));
                JourneyEntry::ChangeEnRoute(ChangeEnRoute {
                    tiploc: slice_and_trim(line, 2, 9),
                    tiploc_suffix: read_suffix(line)?,
                    attributes,
                })
            }
        };
        Ok(entry)
    }

    pub fn to_cif(&self) -> String {
        match self {
            JourneyEntry::Origin(x) => {
                let mut line = location_line("LO", &x.tiploc, x.tiploc_suffix);
                line.wtt_time(10, Some(x.scheduled_departure))
                    .public_time(15, x.public_departure)
                    .text(19, 3, x.platform.as_deref())
                    .text(22, 3, x.line.as_deref())
                    .allowance(25, x.engineering_allowance)
                    .allowance(27, x.pathing_allowance)
                    .text(29, 12, x.activity.as_deref())
                    .allowance(41, x.performance_allowance);
                line.finish()
            }
            JourneyEntry::Intermediate(x) => {
                let mut line = location_line("LI", &x.tiploc, x.tiploc_suffix);
                line.wtt_time(10, x.scheduled_arrival)
                    .wtt_time(15, x.scheduled_departure)
                    .wtt_time(20, x.scheduled_pass)
                    .public_time(25, x.public_arrival)
                    .public_time(29, x.public_departure)
                    .text(33, 3, x.platform.as_deref())
                    .text(36, 3, x.line.as_deref())
                    .text(39, 3, x.path.as_deref())
                    .text(42, 12, x.activity.as_deref())
                    .allowance(54, x.engineering_allowance)
                    .allowance(56, x.pathing_allowance)
                    .allowance(58, x.performance_allowance);
                line.finish()
            }
            JourneyEntry::Terminating(x) => {
                let mut line = location_line("LT", &x.tiploc, x.tiploc_suffix);
                line.wtt_time(10, Some(x.scheduled_arrival))
                    .public_time(15, x.public_arrival)
                    .text(19, 3, x.platform.as_deref())
                    .text(22, 3, x.path.as_deref())
                    .text(25, 12, x.activity.as_deref());
                line.finish()
            }
            JourneyEntry::ChangeEnRoute(x) => {
                let mut line = location_line("CR", &x.tiploc, x.tiploc_suffix);
                x.attributes.write_cif(&mut line, 10);
                line.text(58, 4, x.attributes.traction_class.as_deref())
                    .zero_filled(62, 5, x.attributes.uic_code)
                    .text(67, 8, x.attributes.retail_service_id.as_deref());
                line.finish()
            }
        }
    }

    /// Change en route records have no JSON form.
    pub fn from_nr_json(json: &NrJsonScheduleLocation) -> Result<JourneyEntry, NrJsonError> {
        let tiploc = json.tiploc_code.trim_end().to_string();
        let tiploc_suffix = read_optional_number(
            json.tiploc_instance.as_deref().unwrap_or(""),
            produce_nr_json_error_closure("tiploc_instance"),
        )?;
        let time = |value: &Option<String>, name: &str| {
            read_optional_wtt_time(
                value.as_deref().unwrap_or(""),
                produce_nr_json_error_closure(name),
            )
        };
        let public_time = |value: &Option<String>, name: &str| {
            read_public_time(value.as_deref().unwrap_or(""), produce_nr_json_error_closure(name))
        };
        let allowance = |value: &Option<String>, name: &str| {
            read_allowance(value.as_deref().unwrap_or(""), produce_nr_json_error_closure(name))
        };
        let required = |value: Option<NaiveTime>, name: &str| {
            value.ok_or_else(|| {
                NrJsonError::new(
                    CifErrorType::InvalidJourney(format!("missing {}", name)),
                    name,
                )
            })
        };

        let entry = match json.record_identity.as_str() {
            "LO" => JourneyEntry::Origin(Origin {
                tiploc,
                tiploc_suffix,
                scheduled_departure: required(time(&json.departure, "departure")?, "departure")?,
                public_departure: public_time(&json.public_departure, "public_departure")?,
                platform: json_string(&json.platform),
                line: json_string(&json.line),
                engineering_allowance: allowance(
                    &json.engineering_allowance,
                    "engineering_allowance",
                )?,
                pathing_allowance: allowance(&json.pathing_allowance, "pathing_allowance")?,
                activity: None,
                performance_allowance: allowance(
                    &json.performance_allowance,
                    "performance_allowance",
                )?,
            }),
            "LI" => JourneyEntry::Intermediate(Intermediate {
                tiploc,
                tiploc_suffix,
                scheduled_arrival: time(&json.arrival, "arrival")?,
                scheduled_departure: time(&json.departure, "departure")?,
                scheduled_pass: time(&json.pass, "pass")?,
                public_arrival: public_time(&json.public_arrival, "public_arrival")?,
                public_departure: public_time(&json.public_departure, "public_departure")?,
                platform: json_string(&json.platform),
                line: json_string(&json.line),
                path: json_string(&json.path),
                activity: None,
                engineering_allowance: allowance(
                    &json.engineering_allowance,
                    "engineering_allowance",
                )?,
                pathing_allowance: allowance(&json.pathing_allowance, "pathing_allowance")?,
                performance_allowance: allowance(
                    &json.performance_allowance,
                    "performance_allowance",
                )?,
            }),
            "LT" => JourneyEntry::Terminating(Terminating {
                tiploc,
                tiploc_suffix,
                scheduled_arrival: required(time(&json.arrival, "arrival")?, "arrival")?,
                public_arrival: public_time(&json.public_arrival, "public_arrival")?,
                platform: json_string(&json.platform),
                path: json_string(&json.path),
                activity: None,
            }),
            x => {
                return Err(NrJsonError::new(
                    CifErrorType::InvalidRecordType(x.to_string()),
                    "record_identity",
                ))
            }
        };
        Ok(entry)
    }

    pub fn to_nr_json(&self) -> Option<NrJsonScheduleLocation> {
        let non_empty = |x: String| if x.is_empty() { None } else { Some(x) };
        let location = |record_identity: &str, tiploc: &str, tiploc_suffix: Option<u8>| {
            NrJsonScheduleLocation {
                location_type: record_identity.to_string(),
                record_identity: record_identity.to_string(),
                tiploc_code: tiploc.to_string(),
                tiploc_instance: tiploc_suffix.map(|x| x.to_string()),
                ..Default::default()
            }
        };
        match self {
            JourneyEntry::Origin(x) => Some(NrJsonScheduleLocation {
                departure: non_empty(write_wtt_time(Some(x.scheduled_departure))),
                public_departure: non_empty(write_public_time(x.public_departure)),
                platform: x.platform.clone(),
                line: x.line.clone(),
                engineering_allowance: non_empty(write_allowance(x.engineering_allowance)),
                pathing_allowance: non_empty(write_allowance(x.pathing_allowance)),
                performance_allowance: non_empty(write_allowance(x.performance_allowance)),
                ..location("LO", &x.tiploc, x.tiploc_suffix)
            }),
            JourneyEntry::Intermediate(x) => Some(NrJsonScheduleLocation {
                arrival: non_empty(write_wtt_time(x.scheduled_arrival)),
                departure: non_empty(write_wtt_time(x.scheduled_departure)),
                pass: non_empty(write_wtt_time(x.scheduled_pass)),
                public_arrival: non_empty(write_public_time(x.public_arrival)),
                public_departure: non_empty(write_public_time(x.public_departure)),
                platform: x.platform.clone(),
                line: x.line.clone(),
                path: x.path.clone(),
                engineering_allowance: non_empty(write_allowance(x.engineering_allowance)),
                pathing_allowance: non_empty(write_allowance(x.pathing_allowance)),
                performance_allowance: non_empty(write_allowance(x.performance_allowance)),
                ..location("LI", &x.tiploc, x.tiploc_suffix)
            }),
            JourneyEntry::Terminating(x) => Some(NrJsonScheduleLocation {
                arrival: non_empty(write_wtt_time(Some(x.scheduled_arrival))),
                public_arrival: non_empty(write_public_time(x.public_arrival)),
                platform: x.platform.clone(),
                path: x.path.clone(),
                ..location("LT", &x.tiploc, x.tiploc_suffix)
            }),
            JourneyEntry::ChangeEnRoute(_) => None,
        }
    }

    pub fn tiploc(&self) -> &str {
        match self {
            JourneyEntry::Origin(x) => &x.tiploc,
            JourneyEntry::Intermediate(x) => &x.tiploc,
            JourneyEntry::Terminating(x) => &x.tiploc,
            JourneyEntry::ChangeEnRoute(x) => &x.tiploc,
        }
    }

    pub fn tiploc_suffix(&self) -> Option<u8> {
        match self {
            JourneyEntry::Origin(x) => x.tiploc_suffix,
            JourneyEntry::Intermediate(x) => x.tiploc_suffix,
            JourneyEntry::Terminating(x) => x.tiploc_suffix,
            JourneyEntry::ChangeEnRoute(x) => x.tiploc_suffix,
        }
    }

    /// `TIPLOC-SUFFIX`, matching association event ids.
    pub fn location_id(&self) -> String {
        match self.tiploc_suffix() {
            Some(x) => format!("{}-{}", self.tiploc(), x),
            None => format!("{}-", self.tiploc()),
        }
    }

    pub fn record_type(&self) -> &'static str {
        match self {
            JourneyEntry::Origin(_) => "LO",
            JourneyEntry::Intermediate(_) => "LI",
            JourneyEntry::Terminating(_) => "LT",
            JourneyEntry::ChangeEnRoute(_) => "CR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(parts: &[&str]) -> String {
        format!("{:<80}", parts.concat())
    }

    fn origin_line() -> String {
        line(&[
            "LO", "BATHSPA", " ", "0708H", "0708", "2  ", "ML ", " H", "  ", "TB          ", "1 ",
        ])
    }

    fn intermediate_line() -> String {
        line(&[
            "LI", "CHPNHAM", "2", "0719 ", "0720H", "     ", "0719", "0720", "1  ", "   ", "   ",
            "T           ", "  ", "1H", "  ",
        ])
    }

    fn pass_line() -> String {
        line(&[
            "LI", "WOOTTNB", " ", "     ", "     ", "0725H", "0000", "0000", "   ", "UM ", "   ",
        ])
    }

    fn terminating_line() -> String {
        line(&["LT", "BRSTLTM", "1", "0745 ", "0745", "7  ", "   ", "TF          "])
    }

    fn change_line() -> String {
        line(&[
            "CR", "SWINDON", " ", "OO", "1A23", "1234", "1", "21700001", " ", "DMU", "S   ",
            "100", "D     ", "B", " ", "S", " ", "    ", "    ", "    ", "12345", "GW123400",
        ])
    }

    #[test]
    fn reads_origin() {
        match JourneyEntry::from_cif(&origin_line()).unwrap() {
            JourneyEntry::Origin(x) => {
                assert_eq!(x.tiploc, "BATHSPA");
                assert_eq!(x.tiploc_suffix, None);
                assert_eq!(x.scheduled_departure, NaiveTime::from_hms_opt(7, 8, 30).unwrap());
                assert_eq!(x.public_departure, NaiveTime::from_hms_opt(7, 8, 0));
                assert_eq!(x.platform.as_deref(), Some("2"));
                assert_eq!(x.line.as_deref(), Some("ML"));
                assert_eq!(x.engineering_allowance, Some(30));
                assert_eq!(x.pathing_allowance, None);
                assert_eq!(x.activity.as_deref(), Some("TB"));
                assert_eq!(x.performance_allowance, Some(60));
            }
            x => panic!("expected an origin, got {:?}", x),
        }
    }

    #[test]
    fn reads_pass() {
        match JourneyEntry::from_cif(&pass_line()).unwrap() {
            JourneyEntry::Intermediate(x) => {
                assert_eq!(x.scheduled_arrival, None);
                assert_eq!(x.scheduled_departure, None);
                assert_eq!(x.scheduled_pass, NaiveTime::from_hms_opt(7, 25, 30));
                assert_eq!(x.public_arrival, NaiveTime::from_hms_opt(0, 0, 0));
                assert_eq!(x.line.as_deref(), Some("UM"));
            }
            x => panic!("expected an intermediate, got {:?}", x),
        }
    }

    #[test]
    fn reads_change_en_route() {
        match JourneyEntry::from_cif(&change_line()).unwrap() {
            JourneyEntry::ChangeEnRoute(x) => {
                assert_eq!(x.tiploc, "SWINDON");
                assert_eq!(x.attributes.category.as_deref(), Some("OO"));
                assert_eq!(x.attributes.reservation_headcode, Some(1234));
                assert_eq!(x.attributes.service_code, Some(21700001));
                assert_eq!(x.attributes.power_type.as_deref(), Some("DMU"));
                assert_eq!(x.attributes.speed, Some(100));
                assert_eq!(x.attributes.uic_code, Some(12345));
                assert_eq!(x.attributes.retail_service_id.as_deref(), Some("GW123400"));
            }
            x => panic!("expected a change en route, got {:?}", x),
        }
    }

    #[test]
    fn cif_round_trips() {
        let lines = [
            origin_line(),
            intermediate_line(),
            pass_line(),
            terminating_line(),
            change_line(),
        ];
        for line in lines {
            assert_eq!(JourneyEntry::from_cif(&line).unwrap().to_cif(), line);
        }
    }

    #[test]
    fn rejects_bad_times() {
        let mut line = origin_line();
        line.replace_range(10..15, "0708X");
        let error = JourneyEntry::from_cif(&line).unwrap_err();
        assert_eq!(error.column(), 10);
        assert!(matches!(error.error_type(), CifErrorType::InvalidMinuteFraction(_)));
        assert!(JourneyEntry::from_cif(&line[..0]).is_err());
    }

    #[test]
    fn change_en_route_overrides_everything() {
        let mut attributes = TrainAttributes {
            category: Some("XX".to_string()),
            catering: Some("C".to_string()),
            ..Default::default()
        };
        match JourneyEntry::from_cif(&change_line()).unwrap() {
            JourneyEntry::ChangeEnRoute(x) => x.apply_to(&mut attributes),
            x => panic!("expected a change en route, got {:?}", x),
        }
        assert_eq!(attributes.category.as_deref(), Some("OO"));
        assert_eq!(attributes.catering, None);
    }

    #[test]
    fn json_round_trip() {
        for line in [origin_line(), intermediate_line(), pass_line(), terminating_line()] {
            let mut entry = JourneyEntry::from_cif(&line).unwrap();
            match &mut entry {
                JourneyEntry::Origin(x) => x.activity = None,
                JourneyEntry::Intermediate(x) => x.activity = None,
                JourneyEntry::Terminating(x) => x.activity = None,
                JourneyEntry::ChangeEnRoute(_) => (),
            }
            let json = entry.to_nr_json().unwrap();
            assert_eq!(JourneyEntry::from_nr_json(&json).unwrap(), entry);
        }
        assert!(JourneyEntry::from_cif(&change_line()).unwrap().to_nr_json().is_none());
    }

    #[test]
    fn location_ids() {
        assert_eq!(JourneyEntry::from_cif(&origin_line()).unwrap().location_id(), "BATHSPA-");
        assert_eq!(JourneyEntry::from_cif(&terminating_line()).unwrap().location_id(), "BRSTLTM-1");
    }
}
