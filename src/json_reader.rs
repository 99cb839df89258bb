use crate::association::Association;
use crate::error::Error;
use crate::header::Header;
use crate::nr_json::{NrJsonError, NrJsonRecord};
use crate::parser::{Event, ModificationType, RecordReader};
use crate::tiploc::Tiploc;
use crate::train_schedule::TrainSchedule;

use serde_json::{Map, Value};
use tracing::error;

/// Reads the JSON encoding, one record object per line. Unlike the fixed
/// width encoding a whole schedule arrives on one line, so nothing is held
/// between lines.
#[derive(Debug, Default)]
pub struct JsonReader {}

impl JsonReader {
    pub fn new() -> Self {
        Self {}
    }

    fn modification_type(transaction_type: &str, record_key: &str) -> Option<ModificationType> {
        let modification_type = ModificationType::from_json(transaction_type);
        if modification_type.is_none() {
            error!("Don't know how to {:?} a {}", transaction_type, record_key);
        }
        modification_type
    }
}

impl RecordReader for JsonReader {
    fn read_line(&mut self, line: &str, events: &mut Vec<Event>) -> Result<(), Error> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let object: Map<String, Value> = match serde_json::from_str(line) {
            Ok(x) => x,
            Err(_) => {
                error!("Can't understand line: {:?}", line);
                return Ok(());
            }
        };
        let key = match object.keys().next() {
            Some(x) if object.len() == 1 && NrJsonRecord::is_record_key(x) => x.clone(),
            _ => {
                error!("Can't understand line: {:?}", line);
                return Ok(());
            }
        };

        let record: NrJsonRecord = serde_json::from_value(Value::Object(object))?;
        match record {
            NrJsonRecord::Header(x) => events.push(Event::Header(Header::from_nr_json(&x)?)),
            NrJsonRecord::Tiploc(x) => {
                let tiploc = Tiploc::from_nr_json(&x)?;
                let event = match JsonReader::modification_type(&x.transaction_type, &key) {
                    Some(ModificationType::Insert) => Event::TiplocInsert(tiploc),
                    Some(ModificationType::Amend) => Event::TiplocAmend {
                        old_tiploc: tiploc.tiploc.clone(),
                        tiploc,
                    },
                    Some(ModificationType::Delete) => Event::TiplocDelete(tiploc.tiploc),
                    None => return Ok(()),
                };
                events.push(event);
            }
            NrJsonRecord::Association(x) => {
                let association = Association::from_nr_json(&x)?;
                let event = match JsonReader::modification_type(&x.transaction_type, &key) {
                    Some(ModificationType::Insert) => Event::AssociationCreate(association),
                    Some(ModificationType::Amend) => Event::AssociationUpdate(association),
                    Some(ModificationType::Delete) => Event::AssociationDelete(association),
                    None => return Ok(()),
                };
                events.push(event);
            }
            NrJsonRecord::Schedule(x) => {
                let schedule = TrainSchedule::from_nr_json(&x)?;
                if let Err(error_type) = schedule.validate_journey() {
                    return Err(Error::NrJsonError(NrJsonError::new(
                        error_type,
                        "schedule_location",
                    )));
                }
                let event = match JsonReader::modification_type(&x.transaction_type, &key) {
                    Some(ModificationType::Insert) => Event::TrainScheduleCreate(schedule),
                    Some(ModificationType::Amend) => Event::TrainScheduleUpdate(schedule),
                    Some(ModificationType::Delete) => Event::TrainScheduleDelete(schedule),
                    None => return Ok(()),
                };
                events.push(event);
            }
            NrJsonRecord::Trailer(_) => events.push(Event::Trailer),
        }
        Ok(())
    }

    fn reset(&mut self) {}
}
