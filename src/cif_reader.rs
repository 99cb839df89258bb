use crate::association::Association;
use crate::cif_fields::{field, CifError, CifErrorType};
use crate::error::Error;
use crate::header::Header;
use crate::journey::JourneyEntry;
use crate::parser::{Event, ModificationType, RecordReader};
use crate::tiploc::Tiploc;
use crate::train_schedule::TrainSchedule;

use tracing::{error, warn};

/// Reads the fixed width encoding. A train schedule is a basic record plus
/// whatever extra, location and change en route records follow it, so the
/// schedule being built is only emitted once the next basic record or the
/// trailer turns up.
#[derive(Debug, Default)]
pub struct CifReader {
    current: Option<(ModificationType, TrainSchedule)>,
    last_basic_was_delete: bool,
}

impl CifReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish_current_train(&mut self, events: &mut Vec<Event>) -> Result<(), Error> {
        let (modification_type, schedule) = match self.current.take() {
            Some(x) => x,
            None => return Ok(()),
        };
        if let Err(x) = schedule.validate_journey() {
            return Err(Error::CifError(CifError::new(x, 0)));
        }
        events.push(match modification_type {
            ModificationType::Insert => Event::TrainScheduleCreate(schedule),
            ModificationType::Amend => Event::TrainScheduleUpdate(schedule),
            ModificationType::Delete => Event::TrainScheduleDelete(schedule),
        });
        Ok(())
    }

    fn read_basic(&mut self, line: &str, events: &mut Vec<Event>) -> Result<(), Error> {
        self.finish_current_train(events)?;
        let (modification_type, schedule) = TrainSchedule::from_basic_cif(line)?;
        if modification_type == ModificationType::Delete {
            self.last_basic_was_delete = true;
            events.push(Event::TrainScheduleDelete(schedule));
        } else {
            self.last_basic_was_delete = false;
            self.current = Some((modification_type, schedule));
        }
        Ok(())
    }

    /// Returns the schedule a continuation record belongs to, or `None` when
    /// it trails a delete and should be dropped.
    fn continuing(&mut self, line: &str) -> Result<Option<&mut TrainSchedule>, Error> {
        match self.current {
            Some((_, ref mut schedule)) => Ok(Some(schedule)),
            None if self.last_basic_was_delete => {
                warn!("Ignoring {} record following a deleted schedule", field(line, 0, 2));
                Ok(None)
            }
            None => Err(Error::CifError(CifError::new(
                CifErrorType::UnexpectedRecordType(field(line, 0, 2).to_string(), "BS".to_string()),
                0,
            ))),
        }
    }

    fn read_association(line: &str) -> Result<Event, Error> {
        let association = Association::from_cif(line)?;
        Ok(match ModificationType::from_cif_code(field(line, 2, 3)) {
            Some(ModificationType::Insert) => Event::AssociationCreate(association),
            Some(ModificationType::Amend) => Event::AssociationUpdate(association),
            Some(ModificationType::Delete) => Event::AssociationDelete(association),
            None => {
                return Err(Error::CifError(CifError::new(
                    CifErrorType::InvalidTransactionType(field(line, 2, 3).to_string()),
                    2,
                )))
            }
        })
    }
}

impl RecordReader for CifReader {
    fn read_line(&mut self, line: &str, events: &mut Vec<Event>) -> Result<(), Error> {
        if let Some(comment) = line.strip_prefix('/') {
            events.push(Event::Comment(comment.to_string()));
            return Ok(());
        }
        if line.trim().is_empty() {
            return Ok(());
        }

        match (field(line, 0, 3), field(line, 0, 2)) {
            ("AAN" | "AAR" | "AAD", _) => {
                events.push(CifReader::read_association(line)?);
            }
            ("BSN" | "BSR" | "BSD", _) => {
                self.read_basic(line, events)?;
            }
            (_, "HD") => {
                self.current = None;
                self.last_basic_was_delete = false;
                events.push(Event::Header(Header::from_cif(line)?));
            }
            (_, "TI") => events.push(Event::TiplocInsert(Tiploc::from_cif(line)?)),
            (_, "TA") => {
                let (old_tiploc, tiploc) = Tiploc::amend_from_cif(line)?;
                events.push(Event::TiplocAmend { old_tiploc, tiploc });
            }
            (_, "TD") => events.push(Event::TiplocDelete(Tiploc::from_cif(line)?.tiploc)),
            (_, "BX") => {
                if let Some(schedule) = self.continuing(line)? {
                    schedule.update_extra_from_cif(line)?;
                }
            }
            (_, "LO" | "LI" | "LT" | "CR") => {
                let entry = JourneyEntry::from_cif(line)?;
                if let Some(schedule) = self.continuing(line)? {
                    schedule.journey.push(entry);
                }
            }
            (_, "ZZ") => {
                self.finish_current_train(events)?;
                self.last_basic_was_delete = false;
                events.push(Event::Trailer);
            }
            _ => error!("Can't understand line: {:?}", line),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.current = None;
        self.last_basic_was_delete = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> String {
        format!("{:<80}", text)
    }

    fn basic(transaction: &str, uid: &str) -> String {
        format!("{:<79}P", format!("BS{}{}1805211812081111100", transaction, uid))
    }

    fn read_all(lines: &[String]) -> Result<Vec<Event>, Error> {
        let mut reader = CifReader::new();
        let mut events = vec![];
        for x in lines {
            reader.read_line(x, &mut events)?;
        }
        Ok(events)
    }

    fn journey() -> Vec<String> {
        vec![
            line("LOBATHSPA 0708H0708"),
            line("LICHPNHAM 0719 0720H     07190720"),
            line("LTSWINDON 0745 0745"),
        ]
    }

    #[test]
    fn assembles_schedule() {
        let mut lines = vec![basic("N", "C12345"), line("BX         GWY")];
        lines.extend(journey());
        lines.push(basic("N", "C54321"));
        lines.extend(journey());
        lines.push(line("ZZ"));

        let events = read_all(&lines).unwrap();
        assert_eq!(events.len(), 3);
        match &events[0] {
            Event::TrainScheduleCreate(x) => {
                assert_eq!(x.uid, "C12345");
                assert_eq!(x.atoc_code.as_deref(), Some("GW"));
                assert_eq!(x.journey.len(), 3);
            }
            x => panic!("Unexpected event {:?}", x),
        }
        assert!(matches!(&events[1], Event::TrainScheduleCreate(x) if x.uid == "C54321"));
        assert_eq!(events[2], Event::Trailer);
    }

    #[test]
    fn emits_on_next_basic_record() {
        let mut reader = CifReader::new();
        let mut events = vec![];
        reader.read_line(&basic("R", "C12345"), &mut events).unwrap();
        for x in journey() {
            reader.read_line(&x, &mut events).unwrap();
        }
        assert!(events.is_empty());
        reader.read_line(&basic("N", "C54321"), &mut events).unwrap();
        assert!(matches!(&events[..], [Event::TrainScheduleUpdate(x)] if x.journey.len() == 3));
    }

    #[test]
    fn delete_is_immediate() {
        let lines = vec![
            basic("N", "C12345"),
            line("BSDC123451805211812081111100"),
        ];
        let events = read_all(&lines).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::TrainScheduleCreate(x) if x.uid == "C12345"));
        assert!(matches!(&events[1], Event::TrainScheduleDelete(x) if x.uid == "C12345"));
    }

    #[test]
    fn continuation_after_delete_is_skipped() {
        let mut lines = vec![line("BSDC12345180521")];
        lines.extend(journey());
        lines.push(line("ZZ"));
        let events = read_all(&lines).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::TrainScheduleDelete(x) if x.end_date.is_none()));
    }

    #[test]
    fn continuation_without_schedule() {
        match read_all(&journey()) {
            Err(Error::CifError(x)) => assert!(matches!(
                x.error_type(),
                CifErrorType::UnexpectedRecordType(found, _) if found == "LO"
            )),
            x => panic!("Unexpected result {:?}", x),
        }
    }

    #[test]
    fn invalid_journey() {
        let lines = vec![basic("N", "C12345"), line("LTSWINDON 0745 0745"), line("ZZ")];
        match read_all(&lines) {
            Err(Error::CifError(x)) => {
                assert!(matches!(x.error_type(), CifErrorType::InvalidJourney(_)))
            }
            x => panic!("Unexpected result {:?}", x),
        }
    }

    #[test]
    fn tiplocs() {
        let mut amend = line("TAOLDCODE");
        amend.replace_range(72..79, "NEWCODE");
        let lines = vec![line("TINEWONE"), amend, line("TDGONE")];
        let events = read_all(&lines).unwrap();
        assert_eq!(
            events,
            vec![
                Event::TiplocInsert(Tiploc::new("NEWONE")),
                Event::TiplocAmend {
                    old_tiploc: "OLDCODE".to_string(),
                    tiploc: Tiploc::new("NEWCODE"),
                },
                Event::TiplocDelete("GONE".to_string()),
            ]
        );
    }

    #[test]
    fn associations() {
        let lines = vec![
            format!("{:<79}P", "AANC12345C543211808051809010000001JJSBATHSPA 2TP"),
            format!("{:<79}P", "AADC12345C54321180805                BATHSPA 2"),
        ];
        let events = read_all(&lines).unwrap();
        assert!(matches!(
            &events[0],
            Event::AssociationCreate(x)
                if x.tiploc == "BATHSPA" && x.associated_location_suffix == Some(2)
        ));
        assert!(matches!(&events[1], Event::AssociationDelete(x) if x.end_date.is_none()));
    }

    #[test]
    fn comments_and_unknown_lines() {
        let lines = vec!["/!! Start of file".to_string(), line("QQ something"), String::new()];
        let events = read_all(&lines).unwrap();
        assert_eq!(events, vec![Event::Comment("!! Start of file".to_string())]);
    }

    #[test]
    fn header_resets_state() {
        let mut reader = CifReader::new();
        let mut events = vec![];
        reader.read_line(&basic("N", "C12345"), &mut events).unwrap();
        reader
            .read_line(
                &line("HDTPS.UDFROC1.PD1806181906181945DFROC1MDFROC1LUA190618190619"),
                &mut events,
            )
            .unwrap();
        assert!(matches!(&events[..], [Event::Header(_)]));
        assert!(reader.read_line(&journey()[0], &mut events).is_err());
    }
}
