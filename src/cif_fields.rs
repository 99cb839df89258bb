//! Fixed-width field reading and writing shared by every CIF record.
//!
//! Column positions are given as half-open `start..end` byte ranges, the same
//! way the records are sliced (`&line[2..9]` is the seven character TIPLOC).
//! Lines shorter than a requested range read as blank rather than panicking.

use chrono::format::ParseError;
use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

use std::fmt;
use std::str::FromStr;

pub const CIF_LINE_LENGTH: usize = 80;

/// `yymmdd`, used by associations and schedules.
pub const CIF_DATE_FORMAT: &str = "%y%m%d";
/// `ddmmyy`, used by the header record.
pub const HEADER_DATE_FORMAT: &str = "%d%m%y";
pub const HEADER_TIMESTAMP_FORMAT: &str = "%d%m%y%H%M";

pub const OPEN_ENDED_DATE_CODE: &str = "999999";
/// What an end date of `999999` decodes to.
pub const OPEN_ENDED_DATE: NaiveDate = NaiveDate::MAX;

#[derive(Debug)]
pub enum CifErrorType {
    InvalidRecordType(String),
    ChronoParseError(ParseError),
    InvalidNumber(String),
    InvalidTransactionType(String),
    InvalidUpdateIndicator(String),
    InvalidAssociationDateIndicator(String),
    InvalidAssociationType(String),
    InvalidAssociationCategory(String),
    InvalidStpIndicator(String),
    InvalidApplicableTimetable(String),
    InvalidMinuteFraction(String),
    InvalidAllowance(String),
    InvalidSequence(String),
    UnexpectedRecordType(String, String),
    InvalidJourney(String),
}

impl fmt::Display for CifErrorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CifErrorType::InvalidRecordType(x) => write!(f, "Invalid Record Type {}", x),
            CifErrorType::ChronoParseError(x) => {
                write!(f, "Failed to parse date and/or time: {}", x)
            }
            CifErrorType::InvalidNumber(x) => write!(f, "Invalid number {:?}", x),
            CifErrorType::InvalidTransactionType(x) => write!(f, "Invalid transaction type {}", x),
            CifErrorType::InvalidUpdateIndicator(x) => write!(f, "Invalid update indicator {}", x),
            CifErrorType::InvalidAssociationDateIndicator(x) => {
                write!(f, "Invalid association date indicator {}", x)
            }
            CifErrorType::InvalidAssociationType(x) => write!(f, "Invalid association type {}", x),
            CifErrorType::InvalidAssociationCategory(x) => {
                write!(f, "Invalid association category {}", x)
            }
            CifErrorType::InvalidStpIndicator(x) => write!(f, "Invalid STP indicator {}", x),
            CifErrorType::InvalidApplicableTimetable(x) => {
                write!(f, "Invalid applicable timetable flag {}", x)
            }
            CifErrorType::InvalidMinuteFraction(x) => write!(f, "Invalid minute fraction {}", x),
            CifErrorType::InvalidAllowance(x) => write!(f, "Invalid allowance {}", x),
            CifErrorType::InvalidSequence(x) => write!(f, "Invalid file sequence {}", x),
            CifErrorType::UnexpectedRecordType(x, y) => {
                write!(f, "Unexpected record type {} ({})", x, y)
            }
            CifErrorType::InvalidJourney(x) => write!(f, "Invalid journey: {}", x),
        }
    }
}

#[derive(Debug)]
pub struct CifError {
    error_type: CifErrorType,
    line: u64,
    column: usize,
}

impl CifError {
    pub fn new(error_type: CifErrorType, column: usize) -> Self {
        CifError {
            error_type,
            line: 0,
            column,
        }
    }

    /// Stamp the line number once the parser knows where the record came from.
    pub fn on_line(mut self, line: u64) -> Self {
        self.line = line;
        self
    }

    pub fn error_type(&self) -> &CifErrorType {
        &self.error_type
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for CifError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line == 0 {
            write!(
                f,
                "Error reading CIF record column {}: {}",
                self.column, self.error_type
            )
        } else {
            write!(
                f,
                "Error reading CIF file line {} column {}: {}",
                self.line, self.column, self.error_type
            )
        }
    }
}

pub(crate) fn produce_cif_error_closure(
    column: usize,
) -> Box<dyn FnOnce(CifErrorType) -> CifError> {
    Box::new(move |x| CifError::new(x, column))
}

/// A closed set of values with a fixed textual code in the extract.
pub trait CifCode: Sized + Copy + PartialEq + 'static {
    const CODES: &'static [(Self, &'static str)];

    fn invalid(code: String) -> CifErrorType;

    fn from_code(code: &str) -> Option<Self> {
        Self::CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(value, _)| *value)
    }

    fn code(&self) -> &'static str {
        Self::CODES
            .iter()
            .find(|(value, _)| value == self)
            .map(|(_, c)| *c)
            .unwrap_or("")
    }
}

pub fn field(line: &str, start: usize, end: usize) -> &str {
    let len = line.len();
    line.get(start.min(len)..end.min(len)).unwrap_or("")
}

/// Returns whichever of `record_types` the line starts with, refusing lines
/// meant for another decoder.
pub fn expect_record_type<'a>(line: &str, record_types: &[&'a str]) -> Result<&'a str, CifError> {
    match record_types.iter().find(|x| line.starts_with(**x)) {
        Some(x) => Ok(*x),
        None => Err(CifError::new(
            CifErrorType::InvalidRecordType(field(line, 0, 3).to_string()),
            0,
        )),
    }
}

pub fn slice_and_trim(line: &str, start: usize, end: usize) -> String {
    field(line, start, end).trim_end().to_string()
}

pub fn read_optional_string(slice: &str) -> Option<String> {
    if slice.trim().is_empty() {
        None
    } else {
        Some(slice.trim_end().to_string())
    }
}

pub fn read_optional_number<N, F, T>(slice: &str, error_logic: F) -> Result<Option<N>, T>
where
    N: FromStr,
    F: FnOnce(CifErrorType) -> T,
{
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<N>() {
        Ok(x) => Ok(Some(x)),
        Err(_) => Err(error_logic(CifErrorType::InvalidNumber(slice.to_string()))),
    }
}

pub fn read_code<C, F, T>(slice: &str, error_logic: F) -> Result<Option<C>, T>
where
    C: CifCode,
    F: FnOnce(CifErrorType) -> T,
{
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match C::from_code(trimmed) {
        Some(x) => Ok(Some(x)),
        None => Err(error_logic(C::invalid(trimmed.to_string()))),
    }
}

pub fn read_date<F, T>(date_slice: &str, format: &str, error_logic: F) -> Result<NaiveDate, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    if date_slice == OPEN_ENDED_DATE_CODE {
        return Ok(OPEN_ENDED_DATE);
    }
    match NaiveDate::parse_from_str(date_slice, format) {
        Ok(x) => Ok(x),
        Err(x) => Err(error_logic(CifErrorType::ChronoParseError(x))),
    }
}

/// As [`read_date`], but a blank field is `None` when `allow_absent` is set.
/// Delete records leave their end dates blank.
pub fn read_optional_date<F, T>(
    date_slice: &str,
    format: &str,
    allow_absent: bool,
    error_logic: F,
) -> Result<Option<NaiveDate>, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    if allow_absent && date_slice.trim().is_empty() {
        return Ok(None);
    }
    read_date(date_slice, format, error_logic).map(Some)
}

pub fn write_date(date: Option<NaiveDate>, format: &str) -> String {
    match date {
        None => String::new(),
        Some(x) if x == OPEN_ENDED_DATE => OPEN_ENDED_DATE_CODE.to_string(),
        Some(x) => x.format(format).to_string(),
    }
}

/// Working timetable time, `HHMM` plus an optional `H` for the half minute.
pub fn read_wtt_time<F, T>(slice: &str, error_logic: F) -> Result<NaiveTime, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    let wtt = NaiveTime::parse_from_str(slice.get(0..4).unwrap_or(slice), "%H%M");
    let wtt = match wtt {
        Ok(x) => x,
        Err(x) => return Err(error_logic(CifErrorType::ChronoParseError(x))),
    };
    match slice.get(4..).unwrap_or("").trim_end() {
        "H" => Ok(wtt + Duration::seconds(30)),
        "" => Ok(wtt),
        x => Err(error_logic(CifErrorType::InvalidMinuteFraction(
            x.to_string(),
        ))),
    }
}

pub fn read_optional_wtt_time<F, T>(slice: &str, error_logic: F) -> Result<Option<NaiveTime>, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    if slice.trim().is_empty() {
        return Ok(None);
    }
    read_wtt_time(slice, error_logic).map(Some)
}

pub fn write_wtt_time(time: Option<NaiveTime>) -> String {
    match time {
        None => String::new(),
        Some(x) if x.second() >= 30 => format!("{}H", x.format("%H%M")),
        Some(x) => x.format("%H%M").to_string(),
    }
}

pub fn read_public_time<F, T>(slice: &str, error_logic: F) -> Result<Option<NaiveTime>, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match NaiveTime::parse_from_str(trimmed, "%H%M") {
        Ok(x) => Ok(Some(x)),
        Err(x) => Err(error_logic(CifErrorType::ChronoParseError(x))),
    }
}

pub fn write_public_time(time: Option<NaiveTime>) -> String {
    match time {
        None => String::new(),
        Some(x) => x.format("%H%M").to_string(),
    }
}

/// Allowances are whole minutes with an optional trailing `H` for a half
/// minute. Returned in seconds.
pub fn read_allowance<F, T>(slice: &str, error_logic: F) -> Result<Option<u32>, T>
where
    F: FnOnce(CifErrorType) -> T,
{
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (minutes, seconds) = match trimmed.strip_suffix('H') {
        Some(x) => (x, 30),
        None => (trimmed, 0),
    };
    let minutes = if minutes.is_empty() {
        Ok(0)
    } else {
        minutes.parse::<u32>()
    };
    match minutes {
        Ok(x) => Ok(Some(x * 60 + seconds)),
        Err(_) => Err(error_logic(CifErrorType::InvalidAllowance(
            slice.to_string(),
        ))),
    }
}

pub fn write_allowance(seconds: Option<u32>) -> String {
    match seconds {
        None => String::new(),
        Some(x) => match (x / 60, x % 60 >= 30) {
            (0, true) => "H".to_string(),
            (minutes, true) => format!("{}H", minutes),
            (minutes, false) => minutes.to_string(),
        },
    }
}

/// An 80 column record being written. Every setter pads with blanks and
/// truncates anything wider than its column.
#[derive(Clone, Debug)]
pub struct CifLine {
    buffer: Vec<char>,
}

impl CifLine {
    pub fn new(record_type: &str) -> Self {
        let mut line = CifLine {
            buffer: vec![' '; CIF_LINE_LENGTH],
        };
        line.put(0, record_type.len(), record_type);
        line
    }

    fn put(&mut self, start: usize, width: usize, value: &str) -> &mut Self {
        for (i, chr) in value.chars().take(width).enumerate() {
            if let Some(slot) = self.buffer.get_mut(start + i) {
                *slot = chr;
            }
        }
        self
    }

    pub fn text(&mut self, start: usize, width: usize, value: Option<&str>) -> &mut Self {
        match value {
            Some(x) => self.put(start, width, x),
            None => self,
        }
    }

    /// Right-justified and blank padded.
    pub fn number<N: fmt::Display>(
        &mut self,
        start: usize,
        width: usize,
        value: Option<N>,
    ) -> &mut Self {
        match value {
            Some(x) => {
                let digits = format!("{:>width$}", x, width = width);
                self.put(start, width, &digits)
            }
            None => self,
        }
    }

    /// Right-justified and zero filled, for numeric codes such as STANOX
    /// that are always written with leading zeros.
    pub fn zero_filled<N: fmt::Display>(
        &mut self,
        start: usize,
        width: usize,
        value: Option<N>,
    ) -> &mut Self {
        match value {
            Some(x) => {
                let digits = format!("{:0>width$}", x, width = width);
                self.put(start, width, &digits)
            }
            None => self,
        }
    }

    pub fn code<C: CifCode>(&mut self, start: usize, width: usize, value: Option<C>) -> &mut Self {
        match value {
            Some(x) => self.put(start, width, x.code()),
            None => self,
        }
    }

    pub fn date(&mut self, start: usize, value: Option<NaiveDate>, format: &str) -> &mut Self {
        let text = write_date(value, format);
        self.put(start, 6, &text)
    }

    pub fn wtt_time(&mut self, start: usize, value: Option<NaiveTime>) -> &mut Self {
        let text = write_wtt_time(value);
        self.put(start, 5, &text)
    }

    pub fn public_time(&mut self, start: usize, value: Option<NaiveTime>) -> &mut Self {
        let text = write_public_time(value);
        self.put(start, 4, &text)
    }

    pub fn allowance(&mut self, start: usize, value: Option<u32>) -> &mut Self {
        let text = match write_allowance(value).as_str() {
            "H" => " H".to_string(),
            x => x.to_string(),
        };
        self.put(start, 2, &text)
    }

    pub fn finish(&self) -> String {
        self.buffer.iter().collect()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whatever is written, a record is always exactly 80 columns
        #[test]
        fn line_is_always_full_width(
            value in "[ -~]{0,100}",
            start in 0usize..100,
            width in 0usize..100,
        ) {
            let line = CifLine::new("ZZ").text(start, width, Some(&value)).finish();
            prop_assert_eq!(line.chars().count(), CIF_LINE_LENGTH);
        }

        /// Slicing never panics, whatever the range
        #[test]
        fn field_never_panics(line in "[ -~]{0,90}", start in 0usize..100, end in 0usize..100) {
            let _ = field(&line, start, end);
        }
    }
}
