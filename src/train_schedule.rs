use crate::cif_fields::{
    expect_record_type, field, produce_cif_error_closure, read_date, read_optional_date,
    read_optional_number, read_optional_string, slice_and_trim, CifError, CifErrorType, CifLine,
    CIF_DATE_FORMAT,
};
use crate::days::Days;
use crate::error::Error;
use crate::journey::JourneyEntry;
use crate::nr_json::{
    json_string, produce_nr_json_error_closure, read_json_date, read_optional_json_date,
    write_json_date, NrJsonError, NrJsonNewScheduleSegment, NrJsonRecord, NrJsonSchedule,
    NrJsonScheduleSegment,
};
use crate::parser::ModificationType;
use crate::stp_indicator::StpIndicator;

use chrono::NaiveDate;

use std::cmp::Ordering;

/// Operating details of a train. Set by the basic and extra records and
/// replaced wholesale by each change en route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainAttributes {
    pub category: Option<String>,
    pub signalling_headcode: Option<String>,
    pub reservation_headcode: Option<u16>,
    pub course_indicator: Option<String>,
    pub service_code: Option<u32>,
    pub portion_id: Option<String>,
    pub power_type: Option<String>,
    pub timing_load: Option<String>,
    pub speed: Option<u16>,
    pub operating_characteristics: Option<String>,
    pub seating_class: Option<String>,
    pub sleeping_class: Option<String>,
    pub reservations: Option<String>,
    pub connection_indicator: Option<String>,
    pub catering: Option<String>,
    pub branding: Option<String>,
    pub traction_class: Option<String>,
    pub uic_code: Option<u32>,
    pub retail_service_id: Option<String>,
}

impl TrainAttributes {
    /// The category to branding block shared by `BS` (at column 30) and
    /// `CR` (at column 10).
    pub(crate) fn read_cif(line: &str, base: usize) -> Result<TrainAttributes, CifError> {
        let at = |offset: usize, width: usize| field(line, base + offset, base + offset + width);
        let column = |offset: usize| produce_cif_error_closure(base + offset);
        Ok(TrainAttributes {
            category: read_optional_string(at(0, 2)),
            signalling_headcode: read_optional_string(at(2, 4)),
            reservation_headcode: read_optional_number(at(6, 4), column(6))?,
            course_indicator: read_optional_string(at(10, 1)),
            service_code: read_optional_number(at(11, 8), column(11))?,
            portion_id: read_optional_string(at(19, 1)),
            power_type: read_optional_string(at(20, 3)),
            timing_load: read_optional_string(at(23, 4)),
            speed: read_optional_number(at(27, 3), column(27))?,
            operating_characteristics: read_optional_string(at(30, 6)),
            seating_class: read_optional_string(at(36, 1)),
            sleeping_class: read_optional_string(at(37, 1)),
            reservations: read_optional_string(at(38, 1)),
            connection_indicator: read_optional_string(at(39, 1)),
            catering: read_optional_string(at(40, 4)),
            branding: read_optional_string(at(44, 4)),
            traction_class: None,
            uic_code: None,
            retail_service_id: None,
        })
    }

    pub(crate) fn write_cif(&self, line: &mut CifLine, base: usize) {
        line.text(base, 2, self.category.as_deref())
            .text(base + 2, 4, self.signalling_headcode.as_deref())
            .zero_filled(base + 6, 4, self.reservation_headcode)
            .text(base + 10, 1, self.course_indicator.as_deref())
            .zero_filled(base + 11, 8, self.service_code)
            .text(base + 19, 1, self.portion_id.as_deref())
            .text(base + 20, 3, self.power_type.as_deref())
            .text(base + 23, 4, self.timing_load.as_deref())
            .zero_filled(base + 27, 3, self.speed)
            .text(base + 30, 6, self.operating_characteristics.as_deref())
            .text(base + 36, 1, self.seating_class.as_deref())
            .text(base + 37, 1, self.sleeping_class.as_deref())
            .text(base + 38, 1, self.reservations.as_deref())
            .text(base + 39, 1, self.connection_indicator.as_deref())
            .text(base + 40, 4, self.catering.as_deref())
            .text(base + 44, 4, self.branding.as_deref());
    }
}

/// One validity period of a train. The same UID may have several.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub uid: String,
    pub start_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainSchedule {
    pub uid: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub days: Days,
    pub bank_holiday_running: Option<String>,
    pub status: Option<String>,
    pub attributes: TrainAttributes,
    pub atoc_code: Option<String>,
    pub applicable_timetable: Option<bool>,
    pub data_source: Option<String>,
    pub stp_indicator: StpIndicator,
    pub journey: Vec<JourneyEntry>,
}

impl TrainSchedule {
    pub fn new(uid: &str, start_date: NaiveDate) -> Self {
        TrainSchedule {
            uid: uid.to_string(),
            start_date,
            end_date: None,
            days: Days::default(),
            bank_holiday_running: None,
            status: None,
            attributes: TrainAttributes::default(),
            atoc_code: None,
            applicable_timetable: None,
            data_source: None,
            stp_indicator: StpIndicator::Blank,
            journey: vec![],
        }
    }

    /// Reads a `BSN`, `BSR` or `BSD` record into a schedule with no journey.
    pub fn from_basic_cif(line: &str) -> Result<(ModificationType, TrainSchedule), CifError> {
        expect_record_type(line, &["BSN", "BSR", "BSD"])?;
        let modification_type = match ModificationType::from_cif_code(field(line, 2, 3)) {
            Some(x) => x,
            None => {
                return Err(CifError::new(
                    CifErrorType::InvalidTransactionType(field(line, 2, 3).to_string()),
                    2,
                ))
            }
        };

        let schedule = TrainSchedule {
            uid: slice_and_trim(line, 3, 9),
            start_date: read_date(
                field(line, 9, 15),
                CIF_DATE_FORMAT,
                produce_cif_error_closure(9),
            )?,
            end_date: read_optional_date(
                field(line, 15, 21),
                CIF_DATE_FORMAT,
                modification_type == ModificationType::Delete,
                produce_cif_error_closure(15),
            )?,
            days: Days::from_cif(field(line, 21, 28)),
            bank_holiday_running: read_optional_string(field(line, 28, 29)),
            status: read_optional_string(field(line, 29, 30)),
            attributes: TrainAttributes::read_cif(line, 30)?,
            atoc_code: None,
            applicable_timetable: None,
            data_source: None,
            stp_indicator: StpIndicator::from_cif(field(line, 79, 80)),
            journey: vec![],
        };
        Ok((modification_type, schedule))
    }

    /// Applies a `BX` record to this schedule.
    pub fn update_extra_from_cif(&mut self, line: &str) -> Result<(), CifError> {
        expect_record_type(line, &["BX"])?;
        self.attributes.traction_class = read_optional_string(field(line, 2, 6));
        self.attributes.uic_code =
            read_optional_number(field(line, 6, 11), produce_cif_error_closure(6))?;
        self.atoc_code = read_optional_string(field(line, 11, 13));
        self.applicable_timetable = match field(line, 13, 14) {
            "Y" => Some(true),
            "N" => Some(false),
            "" | " " => None,
            x => {
                return Err(CifError::new(
                    CifErrorType::InvalidApplicableTimetable(x.to_string()),
                    13,
                ))
            }
        };
        self.attributes.retail_service_id = read_optional_string(field(line, 14, 22));
        self.data_source = read_optional_string(field(line, 22, 23));
        Ok(())
    }

    fn has_extra_details(&self) -> bool {
        self.attributes.traction_class.is_some()
            || self.attributes.uic_code.is_some()
            || self.atoc_code.is_some()
            || self.applicable_timetable.is_some()
            || self.attributes.retail_service_id.is_some()
            || self.data_source.is_some()
    }

    pub fn basic_to_cif(&self, modification_type: ModificationType) -> String {
        let mut line = CifLine::new("BS");
        line.text(2, 1, Some(modification_type.cif_code()))
            .text(3, 6, Some(&self.uid))
            .date(9, Some(self.start_date), CIF_DATE_FORMAT)
            .date(15, self.end_date, CIF_DATE_FORMAT)
            .text(21, 7, Some(&self.days.to_cif_field()))
            .text(28, 1, self.bank_holiday_running.as_deref())
            .text(29, 1, self.status.as_deref());
        self.attributes.write_cif(&mut line, 30);
        line.text(79, 1, Some(&self.stp_indicator.to_cif().to_string()));
        line.finish()
    }

    pub fn extra_to_cif(&self) -> String {
        let applicable_timetable = self.applicable_timetable.map(|x| if x { "Y" } else { "N" });
        CifLine::new("BX")
            .text(2, 4, self.attributes.traction_class.as_deref())
            .zero_filled(6, 5, self.attributes.uic_code)
            .text(11, 2, self.atoc_code.as_deref())
            .text(13, 1, applicable_timetable)
            .text(14, 8, self.attributes.retail_service_id.as_deref())
            .text(22, 1, self.data_source.as_deref())
            .finish()
    }

    /// The basic record followed by the extra record (if there is anything
    /// to put in it) and the journey. A delete is the basic record alone.
    pub fn to_cif_as(&self, modification_type: ModificationType) -> Vec<String> {
        let mut lines = vec![self.basic_to_cif(modification_type)];
        if modification_type == ModificationType::Delete {
            return lines;
        }
        if self.has_extra_details() {
            lines.push(self.extra_to_cif());
        }
        lines.extend(self.journey.iter().map(JourneyEntry::to_cif));
        lines
    }

    pub fn to_cif(&self) -> Vec<String> {
        self.to_cif_as(ModificationType::Insert)
    }

    /// An empty journey is allowed (cancellations, deletes). Otherwise it must
    /// run from one origin to one terminating location with only intermediate
    /// and change en route entries between.
    pub fn validate_journey(&self) -> Result<(), CifErrorType> {
        let last = match self.journey.len() {
            0 => return Ok(()),
            x => x - 1,
        };
        if last == 0 {
            return Err(CifErrorType::InvalidJourney(format!(
                "train {} has only a {} record",
                self.uid,
                self.journey[0].record_type()
            )));
        }
        for (i, entry) in self.journey.iter().enumerate() {
            let valid = match entry {
                JourneyEntry::Origin(_) => i == 0,
                JourneyEntry::Terminating(_) => i == last,
                JourneyEntry::Intermediate(_) | JourneyEntry::ChangeEnRoute(_) => {
                    i != 0 && i != last
                }
            };
            if !valid {
                return Err(CifErrorType::InvalidJourney(format!(
                    "train {} has {} at position {} of {}",
                    self.uid,
                    entry.record_type(),
                    i + 1,
                    last + 1
                )));
            }
        }
        Ok(())
    }

    /// The operating details in force at `leg_index`, after every change en
    /// route up to and including it.
    pub fn attributes_at(&self, leg_index: usize) -> TrainAttributes {
        let mut attributes = self.attributes.clone();
        for entry in self.journey.iter().take(leg_index + 1) {
            if let JourneyEntry::ChangeEnRoute(x) = entry {
                x.apply_to(&mut attributes);
            }
        }
        attributes
    }

    pub fn from_nr_json(json: &NrJsonSchedule) -> Result<TrainSchedule, NrJsonError> {
        let segment = json.schedule_segment.clone().unwrap_or_default();
        let new_segment = json.new_schedule_segment.clone().unwrap_or_default();
        let number = |value: &Option<String>| value.as_deref().unwrap_or("").to_string();

        let attributes = TrainAttributes {
            category: json_string(&segment.cif_train_category),
            signalling_headcode: json_string(&segment.signalling_id),
            reservation_headcode: read_optional_number(
                &number(&segment.cif_headcode),
                produce_nr_json_error_closure("CIF_headcode"),
            )?,
            course_indicator: json_string(&segment.cif_course_indicator),
            service_code: read_optional_number(
                &number(&segment.cif_train_service_code),
                produce_nr_json_error_closure("CIF_train_service_code"),
            )?,
            portion_id: json_string(&segment.cif_business_sector),
            power_type: json_string(&segment.cif_power_type),
            timing_load: json_string(&segment.cif_timing_load),
            speed: read_optional_number(
                &number(&segment.cif_speed),
                produce_nr_json_error_closure("CIF_speed"),
            )?,
            operating_characteristics: json_string(&segment.cif_operating_characteristics),
            seating_class: json_string(&segment.cif_train_class),
            sleeping_class: json_string(&segment.cif_sleepers),
            reservations: json_string(&segment.cif_reservations),
            connection_indicator: json_string(&segment.cif_connection_indicator),
            catering: json_string(&segment.cif_catering_code),
            branding: json_string(&segment.cif_service_branding),
            traction_class: json_string(&new_segment.traction_class),
            uic_code: read_optional_number(
                &number(&new_segment.uic_code),
                produce_nr_json_error_closure("uic_code"),
            )?,
            retail_service_id: None,
        };

        let applicable_timetable = match json.applicable_timetable.as_deref().map(str::trim) {
            Some("Y") => Some(true),
            Some("N") => Some(false),
            None | Some("") => None,
            Some(x) => {
                return Err(NrJsonError::new(
                    CifErrorType::InvalidApplicableTimetable(x.to_string()),
                    "applicable_timetable",
                ))
            }
        };

        let journey = segment
            .schedule_location
            .iter()
            .map(JourneyEntry::from_nr_json)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TrainSchedule {
            uid: json.cif_train_uid.trim_end().to_string(),
            start_date: read_json_date(&json.schedule_start_date, "schedule_start_date")?,
            end_date: read_optional_json_date(&json.schedule_end_date, "schedule_end_date")?,
            days: Days::from_cif(json.schedule_days_runs.as_deref().unwrap_or("")),
            bank_holiday_running: json_string(&json.cif_bank_holiday_running),
            status: json_string(&json.train_status),
            attributes,
            atoc_code: json_string(&json.atoc_code),
            applicable_timetable,
            data_source: None,
            stp_indicator: StpIndicator::from_cif(&json.cif_stp_indicator),
            journey,
        })
    }

    pub fn from_json(line: &str) -> Result<TrainSchedule, Error> {
        match serde_json::from_str::<NrJsonRecord>(line)? {
            NrJsonRecord::Schedule(x) => Ok(TrainSchedule::from_nr_json(&x)?),
            _ => Err(Error::NrJsonError(NrJsonError::new(
                CifErrorType::InvalidRecordType(line.chars().take(20).collect()),
                "JsonScheduleV1",
            ))),
        }
    }

    pub fn to_nr_json(&self, transaction_type: ModificationType) -> NrJsonSchedule {
        let attributes = &self.attributes;
        let new_schedule_segment =
            match attributes.traction_class.is_some() || attributes.uic_code.is_some() {
                true => Some(NrJsonNewScheduleSegment {
                    traction_class: attributes.traction_class.clone(),
                    uic_code: attributes.uic_code.map(|x| format!("{:05}", x)),
                }),
                false => None,
            };
        let schedule_segment = NrJsonScheduleSegment {
            signalling_id: attributes.signalling_headcode.clone(),
            cif_train_category: attributes.category.clone(),
            cif_headcode: attributes.reservation_headcode.map(|x| format!("{:04}", x)),
            cif_course_indicator: attributes.course_indicator.clone(),
            cif_train_service_code: attributes.service_code.map(|x| format!("{:08}", x)),
            cif_business_sector: attributes.portion_id.clone(),
            cif_power_type: attributes.power_type.clone(),
            cif_timing_load: attributes.timing_load.clone(),
            cif_speed: attributes.speed.map(|x| format!("{:03}", x)),
            cif_operating_characteristics: attributes.operating_characteristics.clone(),
            cif_train_class: attributes.seating_class.clone(),
            cif_sleepers: attributes.sleeping_class.clone(),
            cif_reservations: attributes.reservations.clone(),
            cif_connection_indicator: attributes.connection_indicator.clone(),
            cif_catering_code: attributes.catering.clone(),
            cif_service_branding: attributes.branding.clone(),
            schedule_location: self.journey.iter().filter_map(JourneyEntry::to_nr_json).collect(),
        };

        NrJsonSchedule {
            cif_bank_holiday_running: self.bank_holiday_running.clone(),
            cif_stp_indicator: self.stp_indicator.to_cif().to_string(),
            cif_train_uid: self.uid.clone(),
            applicable_timetable: self
                .applicable_timetable
                .map(|x| (if x { "Y" } else { "N" }).to_string()),
            atoc_code: self.atoc_code.clone(),
            new_schedule_segment,
            schedule_days_runs: match self.days.is_unknown() {
                true => None,
                false => Some(self.days.to_cif()),
            },
            schedule_start_date: write_json_date(self.start_date),
            schedule_end_date: self.end_date.map(write_json_date),
            schedule_segment: Some(schedule_segment),
            train_status: self.status.clone(),
            transaction_type: transaction_type.json_name().to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&NrJsonRecord::Schedule(self.to_nr_json(ModificationType::Insert)))
    }

    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            uid: self.uid.clone(),
            start_date: self.start_date,
        }
    }

    pub fn is_key(&self, key: &ScheduleKey) -> bool {
        self.uid == key.uid && self.start_date == key.start_date
    }

    /// By start date, then UID.
    pub fn natural_cmp(&self, other: &TrainSchedule) -> Ordering {
        self.start_date
            .cmp(&other.start_date)
            .then_with(|| self.uid.cmp(&other.uid))
    }
}
