use crate::cif_fields::{
    expect_record_type, field, produce_cif_error_closure, read_code, read_date,
    read_optional_date, read_optional_number, read_optional_string, slice_and_trim, CifCode,
    CifError, CifErrorType, CifLine, CIF_DATE_FORMAT,
};
use crate::days::Days;
use crate::error::Error;
use crate::nr_json::{
    json_string, produce_nr_json_error_closure, read_json_date, read_optional_json_date,
    write_json_date, NrJsonAssociation, NrJsonError, NrJsonRecord,
};
use crate::parser::ModificationType;
use crate::stp_indicator::StpIndicator;

use chrono::NaiveDate;

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssociationCategory {
    Join,
    Divide,
    Next,
}

impl CifCode for AssociationCategory {
    const CODES: &'static [(Self, &'static str)] = &[
        (AssociationCategory::Join, "JJ"),
        (AssociationCategory::Divide, "VV"),
        (AssociationCategory::Next, "NP"),
    ];

    fn invalid(code: String) -> CifErrorType {
        CifErrorType::InvalidAssociationCategory(code)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssociationDateIndicator {
    Standard,
    OverNextMidnight,
    OverPreviousMidnight,
}

impl CifCode for AssociationDateIndicator {
    const CODES: &'static [(Self, &'static str)] = &[
        (AssociationDateIndicator::Standard, "S"),
        (AssociationDateIndicator::OverNextMidnight, "N"),
        (AssociationDateIndicator::OverPreviousMidnight, "P"),
    ];

    fn invalid(code: String) -> CifErrorType {
        CifErrorType::InvalidAssociationDateIndicator(code)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssociationType {
    Passenger,
    Operating,
}

impl CifCode for AssociationType {
    const CODES: &'static [(Self, &'static str)] =
        &[(AssociationType::Passenger, "P"), (AssociationType::Operating, "O")];

    fn invalid(code: String) -> CifErrorType {
        CifErrorType::InvalidAssociationType(code)
    }
}

/// Associations are matched on where they happen, not on which trains are
/// involved: the location suffixes already single out the event on each side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssociationKey {
    pub tiploc: String,
    pub main_location_suffix: Option<u8>,
    pub associated_location_suffix: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
    pub main_train_uid: String,
    pub associated_train_uid: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub days: Days,
    pub category: Option<AssociationCategory>,
    pub date_indicator: Option<AssociationDateIndicator>,
    pub tiploc: String,
    pub main_location_suffix: Option<u8>,
    pub associated_location_suffix: Option<u8>,
    pub diagram_type: Option<String>,
    pub association_type: Option<AssociationType>,
    pub stp_indicator: StpIndicator,
}

impl Association {
    /// Reads `AAN`, `AAR` or `AAD`. Only a delete may leave the end date out.
    pub fn from_cif(line: &str) -> Result<Association, CifError> {
        let record_type = expect_record_type(line, &["AAN", "AAR", "AAD"])?;
        let is_delete = record_type == "AAD";

        Ok(Association {
            main_train_uid: slice_and_trim(line, 3, 9),
            associated_train_uid: slice_and_trim(line, 9, 15),
            start_date: read_date(
                field(line, 15, 21),
                CIF_DATE_FORMAT,
                produce_cif_error_closure(15),
            )?,
            end_date: read_optional_date(
                field(line, 21, 27),
                CIF_DATE_FORMAT,
                is_delete,
                produce_cif_error_closure(21),
            )?,
            days: Days::from_cif(field(line, 27, 34)),
            category: read_code(field(line, 34, 36), produce_cif_error_closure(34))?,
            date_indicator: read_code(field(line, 36, 37), produce_cif_error_closure(36))?,
            tiploc: slice_and_trim(line, 37, 44),
            main_location_suffix: read_optional_number(
                field(line, 44, 45),
                produce_cif_error_closure(44),
            )?,
            associated_location_suffix: read_optional_number(
                field(line, 45, 46),
                produce_cif_error_closure(45),
            )?,
            diagram_type: read_optional_string(field(line, 46, 47)),
            association_type: read_code(field(line, 47, 48), produce_cif_error_closure(47))?,
            stp_indicator: StpIndicator::from_cif(field(line, 79, 80)),
        })
    }

    pub fn to_cif_as(&self, modification_type: ModificationType) -> String {
        let mut line = CifLine::new("AA");
        line.text(2, 1, Some(modification_type.cif_code()))
            .text(3, 6, Some(&self.main_train_uid))
            .text(9, 6, Some(&self.associated_train_uid))
            .date(15, Some(self.start_date), CIF_DATE_FORMAT)
            .date(21, self.end_date, CIF_DATE_FORMAT)
            .text(27, 7, Some(&self.days.to_cif_field()))
            .code(34, 2, self.category)
            .code(36, 1, self.date_indicator)
            .text(37, 7, Some(&self.tiploc))
            .number(44, 1, self.main_location_suffix)
            .number(45, 1, self.associated_location_suffix)
            .text(46, 1, self.diagram_type.as_deref())
            .code(47, 1, self.association_type)
            .text(79, 1, Some(&self.stp_indicator.to_cif().to_string()));
        line.finish()
    }

    pub fn to_cif(&self) -> String {
        self.to_cif_as(ModificationType::Insert)
    }

    pub fn from_nr_json(json: &NrJsonAssociation) -> Result<Association, NrJsonError> {
        let base_suffix = json.base_location_suffix.clone().unwrap_or_default();
        let assoc_suffix = json.assoc_location_suffix.clone().unwrap_or_default();
        Ok(Association {
            main_train_uid: json.main_train_uid.trim_end().to_string(),
            associated_train_uid: json.assoc_train_uid.trim_end().to_string(),
            start_date: read_json_date(&json.assoc_start_date, "assoc_start_date")?,
            end_date: read_optional_json_date(&json.assoc_end_date, "assoc_end_date")?,
            days: Days::from_cif(json.assoc_days.as_deref().unwrap_or("")),
            category: read_code(
                json.category.as_deref().unwrap_or(""),
                produce_nr_json_error_closure("category"),
            )?,
            date_indicator: read_code(
                json.date_indicator.as_deref().unwrap_or(""),
                produce_nr_json_error_closure("date_indicator"),
            )?,
            tiploc: json.location.trim_end().to_string(),
            main_location_suffix: read_optional_number(
                &base_suffix,
                produce_nr_json_error_closure("base_location_suffix"),
            )?,
            associated_location_suffix: read_optional_number(
                &assoc_suffix,
                produce_nr_json_error_closure("assoc_location_suffix"),
            )?,
            diagram_type: json_string(&json.diagram_type),
            association_type: read_code(
                json.assoc_type.as_deref().unwrap_or(""),
                produce_nr_json_error_closure("assoc_type"),
            )?,
            stp_indicator: StpIndicator::from_cif(&json.cif_stp_indicator),
        })
    }

    pub fn from_json(line: &str) -> Result<Association, Error> {
        match serde_json::from_str::<NrJsonRecord>(line)? {
            NrJsonRecord::Association(x) => Ok(Association::from_nr_json(&x)?),
            _ => Err(Error::NrJsonError(NrJsonError::new(
                CifErrorType::InvalidRecordType(line.chars().take(20).collect()),
                "JsonAssociationV1",
            ))),
        }
    }

    pub fn to_nr_json(&self, transaction_type: ModificationType) -> NrJsonAssociation {
        let timestamp = |x: NaiveDate| format!("{}T00:00:00Z", write_json_date(x));
        NrJsonAssociation {
            transaction_type: transaction_type.json_name().to_string(),
            main_train_uid: self.main_train_uid.clone(),
            assoc_train_uid: self.associated_train_uid.clone(),
            assoc_start_date: timestamp(self.start_date),
            assoc_end_date: self.end_date.map(timestamp),
            assoc_days: match self.days.is_unknown() {
                true => None,
                false => Some(self.days.to_cif()),
            },
            category: self.category.map(|x| x.code().to_string()),
            date_indicator: self.date_indicator.map(|x| x.code().to_string()),
            location: self.tiploc.clone(),
            base_location_suffix: self.main_location_suffix.map(|x| x.to_string()),
            assoc_location_suffix: self.associated_location_suffix.map(|x| x.to_string()),
            diagram_type: self.diagram_type.clone(),
            assoc_type: self.association_type.map(|x| x.code().to_string()),
            cif_stp_indicator: self.stp_indicator.to_cif().to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&NrJsonRecord::Association(
            self.to_nr_json(ModificationType::Insert),
        ))
    }

    pub fn key(&self) -> AssociationKey {
        AssociationKey {
            tiploc: self.tiploc.clone(),
            main_location_suffix: self.main_location_suffix,
            associated_location_suffix: self.associated_location_suffix,
        }
    }

    pub fn natural_cmp(&self, other: &Association) -> Ordering {
        self.start_date.cmp(&other.start_date)
    }

    pub fn is_join(&self) -> bool {
        self.category == Some(AssociationCategory::Join)
    }

    pub fn is_divide(&self) -> bool {
        self.category == Some(AssociationCategory::Divide)
    }

    pub fn is_next(&self) -> bool {
        self.category == Some(AssociationCategory::Next)
    }

    pub fn is_same_day(&self) -> bool {
        self.date_indicator == Some(AssociationDateIndicator::Standard)
    }

    pub fn is_over_next_midnight(&self) -> bool {
        self.date_indicator == Some(AssociationDateIndicator::OverNextMidnight)
    }

    pub fn is_over_previous_midnight(&self) -> bool {
        self.date_indicator == Some(AssociationDateIndicator::OverPreviousMidnight)
    }

    pub fn is_passenger_use(&self) -> bool {
        self.association_type == Some(AssociationType::Passenger)
    }

    pub fn is_operating_use(&self) -> bool {
        self.association_type == Some(AssociationType::Operating)
    }

    pub fn main_train_event_id(&self) -> String {
        event_id(&self.tiploc, self.main_location_suffix)
    }

    pub fn associated_train_event_id(&self) -> String {
        event_id(&self.tiploc, self.associated_location_suffix)
    }
}

fn event_id(tiploc: &str, suffix: Option<u8>) -> String {
    match suffix {
        Some(x) => format!("{}-{}", tiploc, x),
        None => format!("{}-", tiploc),
    }
}
