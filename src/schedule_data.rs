use crate::association::Association;
use crate::cif_fields::CifLine;
use crate::cif_reader::CifReader;
use crate::error::Error;
use crate::header::Header;
use crate::json_reader::JsonReader;
use crate::parser::{Event, EventHandler, ParseControl, Parser};
use crate::tiploc::Tiploc;
use crate::train_schedule::{ScheduleKey, TrainSchedule};

use chrono::{Local, NaiveDateTime};
use itertools::Itertools;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::info;

use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleDataError {
    UpdateBeforeFullExtract,
    UpdateTooOld,
    MissingUpdates { last_applied: String, required: String },
    NoLoadedData,
}

impl fmt::Display for ScheduleDataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScheduleDataError::UpdateBeforeFullExtract => {
                write!(f, "Update can't be loaded before loading a full extract.")
            }
            ScheduleDataError::UpdateTooOld => {
                write!(f, "Update is too old, it is before the last applied update.")
            }
            ScheduleDataError::MissingUpdates { last_applied, required } => write!(
                f,
                "Missing update(s). Last applied update is {:?}, this update requires {:?} to be the previous applied update.",
                last_applied, required
            ),
            ScheduleDataError::NoLoadedData => write!(f, "No loaded data"),
        }
    }
}

impl std::error::Error for ScheduleDataError {}

/// Which encoding a stream is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Cif,
    Json,
}

/// The merged timetable: the latest full extract with every update since
/// applied on top.
#[derive(Clone, Debug, Default)]
pub struct ScheduleData {
    last_header: Option<Header>,
    tiplocs: HashMap<String, Tiploc>,
    associations: Vec<Association>,
    trains: HashMap<String, Vec<TrainSchedule>>,
}

impl ScheduleData {
    pub fn new() -> Self {
        Self::default()
    }

    /// The header of the most recently applied extract, `None` until
    /// something has been loaded.
    pub fn last_header(&self) -> Option<&Header> {
        self.last_header.as_ref()
    }

    pub fn tiplocs(&self) -> &HashMap<String, Tiploc> {
        &self.tiplocs
    }

    pub fn tiploc(&self, tiploc: &str) -> Option<&Tiploc> {
        self.tiplocs.get(tiploc)
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn trains(&self) -> &HashMap<String, Vec<TrainSchedule>> {
        &self.trains
    }

    /// Every schedule held for a train UID.
    pub fn train(&self, uid: &str) -> &[TrainSchedule] {
        self.trains.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn train_count(&self) -> usize {
        self.trains.values().map(Vec::len).sum()
    }

    /// Checks that `header` may be applied on top of what is loaded. A full
    /// extract always may. An update needs a full extract underneath it and,
    /// following another update, must be newer than it and name it as its
    /// predecessor.
    pub fn ensure_correct_update_order(&self, header: &Header) -> Result<(), ScheduleDataError> {
        if header.is_full() {
            return Ok(());
        }
        let last_header = match &self.last_header {
            Some(x) => x,
            None => return Err(ScheduleDataError::UpdateBeforeFullExtract),
        };
        if last_header.is_update() {
            if header.extracted_at < last_header.extracted_at {
                return Err(ScheduleDataError::UpdateTooOld);
            }
            if header.previous_file_reference.as_deref() != Some(last_header.key()) {
                return Err(ScheduleDataError::MissingUpdates {
                    last_applied: last_header.key().to_string(),
                    required: header.previous_file_reference.clone().unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.tiplocs.clear();
        self.associations.clear();
        self.trains.clear();
    }

    fn apply_train(&mut self, schedule: TrainSchedule) {
        let schedules = self.trains.entry(schedule.uid.clone()).or_default();
        let key = schedule.key();
        match schedules.iter_mut().find(|x| x.is_key(&key)) {
            Some(x) => *x = schedule,
            None => schedules.push(schedule),
        }
    }

    fn remove_train(&mut self, key: &ScheduleKey) {
        if let Some(schedules) = self.trains.get_mut(&key.uid) {
            schedules.retain(|x| !x.is_key(key));
            if schedules.is_empty() {
                self.trains.remove(&key.uid);
            }
        }
    }

    fn log_counts(&self) {
        info!(
            "Loaded {} tiplocs, {} associations and {} train schedules",
            self.tiplocs.len(),
            self.associations.len(),
            self.train_count()
        );
    }

    pub async fn load_cif<S: AsyncBufRead + Unpin>(&mut self, stream: S) -> Result<(), Error> {
        self.load(stream, Format::Cif).await
    }

    pub async fn load_json<S: AsyncBufRead + Unpin>(&mut self, stream: S) -> Result<(), Error> {
        self.load(stream, Format::Json).await
    }

    /// Applies one extract. On failure the data may be partly updated, so
    /// load into a copy when that matters (see `ScheduleManager`).
    pub async fn load<S: AsyncBufRead + Unpin>(
        &mut self,
        stream: S,
        format: Format,
    ) -> Result<(), Error> {
        match format {
            Format::Cif => Parser::new(CifReader::new()).parse(stream, self).await?,
            Format::Json => Parser::new(JsonReader::new()).parse(stream, self).await?,
        };
        self.log_counts();
        Ok(())
    }

    /// Applies several extracts in order.
    pub async fn load_all<I, S>(&mut self, streams: I, format: Format) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsyncBufRead + Unpin,
    {
        match format {
            Format::Cif => Parser::new(CifReader::new()).parse_all(streams, self).await?,
            Format::Json => Parser::new(JsonReader::new()).parse_all(streams, self).await?,
        };
        self.log_counts();
        Ok(())
    }

    pub fn generate_cif(&self) -> Result<Vec<String>, Error> {
        self.generate_cif_at(Local::now().naive_local())
    }

    /// Writes everything out as a single full extract, stamped with
    /// `generated_at`.
    pub fn generate_cif_at(&self, generated_at: NaiveDateTime) -> Result<Vec<String>, Error> {
        let header = match &self.last_header {
            Some(x) => x.to_full_extract(),
            None => return Err(Error::ScheduleDataError(ScheduleDataError::NoLoadedData)),
        };

        let mut lines = vec![
            "/!! Start of file".to_string(),
            format!("/!! Generated: {}", generated_at.format("%d/%m/%Y %H:%M")),
            header.to_cif(),
        ];
        lines.extend(
            self.tiplocs
                .values()
                .sorted_by(|a, b| a.natural_cmp(b))
                .map(Tiploc::to_cif),
        );
        lines.extend(
            self.associations
                .iter()
                .sorted_by(|a, b| a.natural_cmp(b))
                .map(Association::to_cif),
        );
        lines.extend(
            self.trains
                .values()
                .flatten()
                .sorted_by(|a, b| a.natural_cmp(b))
                .flat_map(TrainSchedule::to_cif),
        );
        lines.push(CifLine::new("ZZ").finish());
        lines.push("/!! End of file".to_string());
        Ok(lines)
    }

    pub async fn write_cif<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), Error> {
        write_lines(&self.generate_cif()?, writer).await
    }
}

/// Writes each line newline terminated, then flushes.
pub async fn write_lines<W: AsyncWrite + Unpin>(
    lines: &[String],
    writer: &mut W,
) -> Result<(), Error> {
    for line in lines {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

impl EventHandler for ScheduleData {
    fn handle(&mut self, event: Event, _control: &mut ParseControl) -> Result<(), Error> {
        match event {
            Event::Header(header) => {
                self.ensure_correct_update_order(&header)?;
                if header.is_full() {
                    self.clear();
                }
                self.last_header = Some(header);
            }
            Event::Trailer | Event::Comment(_) => (),
            Event::TiplocInsert(tiploc) => {
                self.tiplocs.insert(tiploc.tiploc.clone(), tiploc);
            }
            Event::TiplocAmend { old_tiploc, tiploc } => {
                self.tiplocs.remove(&old_tiploc);
                self.tiplocs.insert(tiploc.tiploc.clone(), tiploc);
            }
            Event::TiplocDelete(tiploc) => {
                self.tiplocs.remove(&tiploc);
            }
            Event::AssociationCreate(association) => self.associations.push(association),
            Event::AssociationUpdate(association) => {
                let key = association.key();
                match self.associations.iter_mut().find(|x| x.key() == key) {
                    Some(x) => *x = association,
                    None => self.associations.push(association),
                }
            }
            Event::AssociationDelete(association) => {
                let key = association.key();
                self.associations.retain(|x| x.key() != key);
            }
            Event::TrainScheduleCreate(schedule) | Event::TrainScheduleUpdate(schedule) => {
                self.apply_train(schedule)
            }
            Event::TrainScheduleDelete(schedule) => self.remove_train(&schedule.key()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::days::Days;
    use crate::header::UpdateIndicator;
    use crate::stp_indicator::StpIndicator;

    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 6, day).unwrap()
    }

    fn header(
        update_indicator: UpdateIndicator,
        current: &str,
        previous: Option<&str>,
        day: u32,
    ) -> Header {
        Header {
            file_identity: "TPS.UDFROC1.PD180618".to_string(),
            extracted_at: date(day).and_hms_opt(19, 45, 0).unwrap(),
            current_file_reference: current.to_string(),
            previous_file_reference: previous.map(str::to_string),
            update_indicator,
            version: Some("A".to_string()),
            start_date: date(day),
            end_date: date(day + 1),
        }
    }

    fn full(current: &str, day: u32) -> Header {
        header(UpdateIndicator::Full, current, None, day)
    }

    fn update(current: &str, previous: &str, day: u32) -> Header {
        header(UpdateIndicator::Update, current, Some(previous), day)
    }

    fn try_apply(data: &mut ScheduleData, event: Event) -> Result<(), Error> {
        data.handle(event, &mut ParseControl::default())
    }

    fn apply(data: &mut ScheduleData, event: Event) {
        try_apply(data, event).unwrap()
    }

    fn loaded() -> ScheduleData {
        let mut data = ScheduleData::new();
        apply(&mut data, Event::Header(full("DFROC1A", 10)));
        data
    }

    fn association(main: &str, suffix: Option<u8>, stp_indicator: &str) -> Association {
        Association {
            main_train_uid: main.to_string(),
            associated_train_uid: "C54321".to_string(),
            start_date: date(1),
            end_date: Some(date(30)),
            days: Days::from_cif("1111100"),
            category: None,
            date_indicator: None,
            tiploc: "BATHSPA".to_string(),
            main_location_suffix: None,
            associated_location_suffix: suffix,
            diagram_type: None,
            association_type: None,
            stp_indicator: StpIndicator::from_cif(stp_indicator),
        }
    }

    #[test]
    fn update_needs_full_extract() {
        let data = ScheduleData::new();
        assert_eq!(
            data.ensure_correct_update_order(&update("DFROC1B", "DFROC1A", 11)),
            Err(ScheduleDataError::UpdateBeforeFullExtract)
        );
        assert!(data.ensure_correct_update_order(&full("DFROC1A", 10)).is_ok());
    }

    #[test]
    fn update_after_full_is_unchecked() {
        let data = loaded();
        assert!(data.ensure_correct_update_order(&update("DFROC1X", "DFROC1W", 2)).is_ok());
    }

    #[test]
    fn update_chain() {
        let mut data = loaded();
        apply(&mut data, Event::Header(update("DFROC1B", "DFROC1A", 11)));

        assert_eq!(
            data.ensure_correct_update_order(&update("DFROC1C", "DFROC1B", 10)),
            Err(ScheduleDataError::UpdateTooOld)
        );
        let gap = data.ensure_correct_update_order(&update("DFROC1D", "DFROC1C", 13)).unwrap_err();
        assert_eq!(
            gap.to_string(),
            "Missing update(s). Last applied update is \"DFROC1B\", this update requires \"DFROC1C\" to be the previous applied update."
        );

        apply(&mut data, Event::Header(update("DFROC1C", "DFROC1B", 12)));
        assert_eq!(data.last_header().unwrap().key(), "DFROC1C");
        assert!(data.ensure_correct_update_order(&full("DFROC1Z", 1)).is_ok());
    }

    #[test]
    fn rejected_header_is_not_applied() {
        let mut data = loaded();
        apply(&mut data, Event::Header(update("DFROC1B", "DFROC1A", 11)));
        let result = try_apply(&mut data, Event::Header(update("DFROC1D", "DFROC1C", 13)));
        assert!(matches!(
            result,
            Err(Error::ScheduleDataError(ScheduleDataError::MissingUpdates { .. }))
        ));
        assert_eq!(data.last_header().unwrap().key(), "DFROC1B");
    }

    #[test]
    fn full_extract_clears() {
        let mut data = loaded();
        apply(&mut data, Event::TiplocInsert(Tiploc::new("OLD")));
        apply(&mut data, Event::AssociationCreate(association("C12345", None, "P")));
        apply(&mut data, Event::TrainScheduleCreate(TrainSchedule::new("C12345", date(1))));

        apply(&mut data, Event::Header(full("DFROC2A", 20)));
        assert!(data.tiplocs().is_empty());
        assert!(data.associations().is_empty());
        assert!(data.trains().is_empty());
    }

    #[test]
    fn tiploc_merging() {
        let mut data = loaded();
        apply(&mut data, Event::TiplocInsert(Tiploc::new("A")));
        apply(
            &mut data,
            Event::TiplocAmend {
                old_tiploc: "A".to_string(),
                tiploc: Tiploc::new("B"),
            },
        );
        apply(
            &mut data,
            Event::TiplocAmend {
                old_tiploc: "UNKNOWN".to_string(),
                tiploc: Tiploc::new("UNKNOWN"),
            },
        );
        apply(&mut data, Event::TiplocDelete("NOTHERE".to_string()));

        let mut keys: Vec<&String> = data.tiplocs().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["B", "UNKNOWN"]);
    }

    #[test]
    fn association_merging() {
        let mut data = loaded();
        apply(&mut data, Event::AssociationCreate(association("C12345", None, "P")));
        apply(&mut data, Event::AssociationCreate(association("C12345", None, "O")));
        apply(&mut data, Event::AssociationCreate(association("C12345", Some(2), "P")));
        assert_eq!(data.associations().len(), 3);

        apply(&mut data, Event::AssociationUpdate(association("W99999", None, "P")));
        assert_eq!(data.associations().len(), 3);
        assert_eq!(data.associations()[0].main_train_uid, "W99999");

        apply(&mut data, Event::AssociationUpdate(association("C12345", Some(3), "N")));
        assert_eq!(data.associations().len(), 4);

        apply(&mut data, Event::AssociationDelete(association("", None, " ")));
        assert_eq!(data.associations().len(), 2);
        assert!(data.associations().iter().all(|x| x.associated_location_suffix.is_some()));
    }

    #[test]
    fn train_merging() {
        let mut data = loaded();
        let mut first = TrainSchedule::new("C12345", date(1));
        apply(&mut data, Event::TrainScheduleCreate(first.clone()));
        apply(&mut data, Event::TrainScheduleCreate(TrainSchedule::new("C12345", date(5))));
        assert_eq!(data.train("C12345").len(), 2);

        first.stp_indicator = StpIndicator::Overlay;
        apply(&mut data, Event::TrainScheduleUpdate(first));
        assert_eq!(data.train("C12345").len(), 2);
        assert_eq!(data.train("C12345")[0].stp_indicator, StpIndicator::from_cif("O"));

        apply(&mut data, Event::TrainScheduleUpdate(TrainSchedule::new("W11111", date(1))));
        assert_eq!(data.train_count(), 3);

        apply(&mut data, Event::TrainScheduleDelete(TrainSchedule::new("C12345", date(9))));
        assert_eq!(data.train_count(), 3);
        apply(&mut data, Event::TrainScheduleDelete(TrainSchedule::new("W11111", date(1))));
        assert!(data.train("W11111").is_empty());
        assert!(!data.trains().contains_key("W11111"));
    }

    #[test]
    fn generate_without_data() {
        assert!(matches!(
            ScheduleData::new().generate_cif(),
            Err(Error::ScheduleDataError(ScheduleDataError::NoLoadedData))
        ));
    }

    #[test]
    fn generated_layout() {
        let mut data = loaded();
        apply(&mut data, Event::TiplocInsert(Tiploc::new("B")));
        apply(&mut data, Event::TiplocInsert(Tiploc::new("A")));
        apply(&mut data, Event::TrainScheduleCreate(TrainSchedule::new("C22222", date(2))));
        apply(&mut data, Event::TrainScheduleCreate(TrainSchedule::new("C11111", date(3))));
        apply(&mut data, Event::TrainScheduleCreate(TrainSchedule::new("C33333", date(2))));

        let generated_at = date(21).and_hms_opt(8, 5, 0).unwrap();
        let lines = data.generate_cif_at(generated_at).unwrap();
        assert_eq!(lines[0], "/!! Start of file");
        assert_eq!(lines[1], "/!! Generated: 21/06/2018 08:05");
        assert!(lines[2].starts_with("HD"));
        assert_eq!(&lines[2][46..47], "F");
        assert_eq!(lines[3], Tiploc::new("A").to_cif());
        assert_eq!(lines[4], Tiploc::new("B").to_cif());
        assert_eq!(&lines[5][3..9], "C22222");
        assert_eq!(&lines[6][3..9], "C33333");
        assert_eq!(&lines[7][3..9], "C11111");
        assert_eq!(lines[8], format!("{:<80}", "ZZ"));
        assert_eq!(lines[9], "/!! End of file");
        assert_eq!(lines.len(), 10);
    }

    #[tokio::test]
    async fn write_cif() {
        let data = loaded();
        let mut output: Vec<u8> = vec![];
        data.write_cif(&mut output).await.unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("/!! Start of file\n"));
        assert!(text.ends_with(&format!("{:<80}\n/!! End of file\n", "ZZ")));
    }
}
