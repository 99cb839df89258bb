use crate::association::Association;
use crate::error::Error;
use crate::header::Header;
use crate::tiploc::Tiploc;
use crate::train_schedule::TrainSchedule;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModificationType {
    Insert,
    Amend,
    Delete,
}

impl ModificationType {
    pub fn from_cif_code(code: &str) -> Option<Self> {
        match code {
            "N" => Some(ModificationType::Insert),
            "R" => Some(ModificationType::Amend),
            "D" => Some(ModificationType::Delete),
            _ => None,
        }
    }

    pub fn cif_code(&self) -> &'static str {
        match self {
            ModificationType::Insert => "N",
            ModificationType::Amend => "R",
            ModificationType::Delete => "D",
        }
    }

    /// JSON `transaction_type`, matched without regard to case.
    pub fn from_json(transaction_type: &str) -> Option<Self> {
        match transaction_type.to_lowercase().as_str() {
            "create" => Some(ModificationType::Insert),
            "update" => Some(ModificationType::Amend),
            "delete" => Some(ModificationType::Delete),
            _ => None,
        }
    }

    pub fn json_name(&self) -> &'static str {
        match self {
            ModificationType::Insert => "Create",
            ModificationType::Amend => "Update",
            ModificationType::Delete => "Delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Header(Header),
    Trailer,
    Comment(String),
    TiplocInsert(Tiploc),
    TiplocAmend { old_tiploc: String, tiploc: Tiploc },
    TiplocDelete(String),
    AssociationCreate(Association),
    AssociationUpdate(Association),
    AssociationDelete(Association),
    TrainScheduleCreate(TrainSchedule),
    TrainScheduleUpdate(TrainSchedule),
    TrainScheduleDelete(TrainSchedule),
}

/// Lets a handler cut a parse short, either for the current stream or for
/// every stream left in a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseControl {
    stop_parsing: bool,
    stop_all: bool,
}

impl ParseControl {
    pub fn stop_parsing(&mut self) {
        self.stop_parsing = true;
    }

    pub fn stop_all(&mut self) {
        self.stop_parsing = true;
        self.stop_all = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_parsing
    }

    pub fn is_all_stopped(&self) -> bool {
        self.stop_all
    }
}

pub trait EventHandler {
    fn handle(&mut self, event: Event, control: &mut ParseControl) -> Result<(), Error>;
}

impl<F> EventHandler for F
where
    F: FnMut(Event, &mut ParseControl) -> Result<(), Error>,
{
    fn handle(&mut self, event: Event, control: &mut ParseControl) -> Result<(), Error> {
        self(event, control)
    }
}

/// Turns single lines of one encoding into events. A reader may hold state
/// between lines (a train schedule spans several).
pub trait RecordReader {
    fn read_line(&mut self, line: &str, events: &mut Vec<Event>) -> Result<(), Error>;

    /// Drops any state left from a previous stream.
    fn reset(&mut self);
}

pub struct Parser<R: RecordReader> {
    reader: R,
}

impl<R: RecordReader> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Feeds every line of `stream` through the reader and hands the
    /// resulting events to `handler`, until the trailer record or a stop
    /// request. Running out of lines before either is an error.
    pub async fn parse<S, H>(&mut self, stream: S, handler: &mut H) -> Result<ParseControl, Error>
    where
        S: AsyncBufRead + Unpin,
        H: EventHandler + ?Sized,
    {
        self.reader.reset();
        let mut control = ParseControl::default();
        let mut lines = stream.lines();
        let mut line_number: u64 = 0;
        let mut events = Vec::new();
        let mut ended = false;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            let text = line.strip_suffix('\r').unwrap_or(&line);
            self.reader
                .read_line(text, &mut events)
                .map_err(|error| match error {
                    Error::CifError(x) => Error::CifError(x.on_line(line_number)),
                    x => x,
                })?;

            for event in events.drain(..) {
                match &event {
                    Event::Header(header) => info!("Starting parse. {}", header),
                    Event::Comment(comment) => debug!("Comment: {}", comment),
                    Event::Trailer => ended = true,
                    _ => (),
                }
                handler.handle(event, &mut control)?;
                if control.is_stopped() {
                    break;
                }
            }

            if control.is_stopped() {
                debug!("Parsing stopped at line {}", line_number);
                return Ok(control);
            }
            if ended {
                return Ok(control);
            }
        }

        Err(Error::IncompleteFile { lines: line_number })
    }

    /// Parses each stream in turn, skipping the rest once a handler asks to
    /// stop all.
    pub async fn parse_all<I, S, H>(
        &mut self,
        streams: I,
        handler: &mut H,
    ) -> Result<ParseControl, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsyncBufRead + Unpin,
        H: EventHandler + ?Sized,
    {
        let mut control = ParseControl::default();
        for stream in streams {
            control = self.parse(stream, handler).await?;
            if control.is_all_stopped() {
                debug!("Skipping remaining files");
                break;
            }
        }
        Ok(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cif_fields::CifErrorType;
    use crate::cif_reader::CifReader;

    fn collect(
        events: &mut Vec<Event>,
    ) -> impl FnMut(Event, &mut ParseControl) -> Result<(), Error> + '_ {
        move |event: Event, _control: &mut ParseControl| {
            events.push(event);
            Ok(())
        }
    }

    fn tiploc_line(code: &str) -> String {
        format!("{:<80}", format!("TI{}", code))
    }

    fn trailer() -> String {
        format!("{:<80}", "ZZ")
    }

    #[test]
    fn modification_type_codes() {
        assert_eq!(ModificationType::from_cif_code("N"), Some(ModificationType::Insert));
        assert_eq!(ModificationType::from_cif_code("R"), Some(ModificationType::Amend));
        assert_eq!(ModificationType::from_cif_code("D"), Some(ModificationType::Delete));
        assert_eq!(ModificationType::from_cif_code("X"), None);
        assert_eq!(ModificationType::from_json("cReAtE"), Some(ModificationType::Insert));
        assert_eq!(ModificationType::from_json("Update"), Some(ModificationType::Amend));
        assert_eq!(ModificationType::from_json("DELETE"), Some(ModificationType::Delete));
        assert_eq!(ModificationType::from_json("upsert"), None);
        assert_eq!(ModificationType::Amend.json_name(), "Update");
        assert_eq!(ModificationType::Delete.cif_code(), "D");
    }

    #[test]
    fn control() {
        let mut control = ParseControl::default();
        assert!(!control.is_stopped());
        control.stop_parsing();
        assert!(control.is_stopped());
        assert!(!control.is_all_stopped());
        control.stop_all();
        assert!(control.is_all_stopped());
    }

    #[tokio::test]
    async fn parses_to_trailer() {
        let input = format!(
            "/comment\n{}\r\n{}\n{}\n",
            tiploc_line("A"),
            trailer(),
            tiploc_line("IGNORED")
        );
        let mut events = vec![];
        Parser::new(CifReader::new())
            .parse(input.as_bytes(), &mut collect(&mut events))
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                Event::Comment("comment".to_string()),
                Event::TiplocInsert(Tiploc::new("A")),
                Event::Trailer,
            ]
        );
    }

    #[tokio::test]
    async fn missing_trailer() {
        let input = format!("{}\n{}\n", tiploc_line("A"), tiploc_line("B"));
        let mut events = vec![];
        let result = Parser::new(CifReader::new())
            .parse(input.as_bytes(), &mut collect(&mut events))
            .await;
        assert!(matches!(result, Err(Error::IncompleteFile { lines: 2 })));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn line_number_on_error() {
        let mut bad = tiploc_line("A");
        bad.replace_range(44..49, "3X087");
        let input = format!("/ok\n{}\n{}\n", bad, trailer());
        let mut events = vec![];
        let result = Parser::new(CifReader::new())
            .parse(input.as_bytes(), &mut collect(&mut events))
            .await;
        match result {
            Err(Error::CifError(x)) => {
                assert_eq!(x.line(), 2);
                assert_eq!(x.column(), 44);
                assert!(matches!(x.error_type(), CifErrorType::InvalidNumber(_)));
            }
            x => panic!("Unexpected result {:?}", x),
        }
    }

    #[tokio::test]
    async fn stop_parsing() {
        let input = format!("{}\n{}\n{}\n", tiploc_line("A"), tiploc_line("B"), trailer());
        let mut seen = vec![];
        let mut handler = |event: Event, control: &mut ParseControl| {
            seen.push(event);
            control.stop_parsing();
            Ok::<(), Error>(())
        };
        let control = Parser::new(CifReader::new())
            .parse(input.as_bytes(), &mut handler)
            .await
            .unwrap();
        assert!(control.is_stopped());
        assert_eq!(seen, vec![Event::TiplocInsert(Tiploc::new("A"))]);
    }

    #[tokio::test]
    async fn stop_all() {
        let first = format!("{}\n{}\n", tiploc_line("A"), trailer());
        let second = format!("{}\n{}\n", tiploc_line("B"), trailer());
        let third = format!("{}\n{}\n", tiploc_line("C"), trailer());
        let mut seen = vec![];
        let mut handler = |event: Event, control: &mut ParseControl| {
            if event == Event::TiplocInsert(Tiploc::new("B")) {
                control.stop_all();
            }
            seen.push(event);
            Ok::<(), Error>(())
        };
        let control = Parser::new(CifReader::new())
            .parse_all(
                vec![first.as_bytes(), second.as_bytes(), third.as_bytes()],
                &mut handler,
            )
            .await
            .unwrap();
        assert!(control.is_all_stopped());
        assert_eq!(
            seen,
            vec![
                Event::TiplocInsert(Tiploc::new("A")),
                Event::Trailer,
                Event::TiplocInsert(Tiploc::new("B")),
            ]
        );
    }
}
