use crate::cif_fields::CifErrorType;

use std::fmt;
use std::str::FromStr;

/// Short term planning status of an association or schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StpIndicator {
    Permanent,
    New,
    Overlay,
    Cancellation,
    /// What an unrecognised character reads as.
    #[default]
    Blank,
}

const STP_CODES: [(StpIndicator, char, &str); 4] = [
    (StpIndicator::Permanent, 'P', "permanent"),
    (StpIndicator::New, 'N', "stp_new"),
    (StpIndicator::Overlay, 'O', "stp_overlay"),
    (StpIndicator::Cancellation, 'C', "stp_cancellation"),
];

impl StpIndicator {
    /// Never fails. Anything that is not `P`, `N`, `O` or `C` is `Blank`.
    pub fn from_cif(value: &str) -> Self {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(x), None) => STP_CODES
                .iter()
                .find(|(_, code, _)| *code == x)
                .map(|(stp, _, _)| *stp)
                .unwrap_or(StpIndicator::Blank),
            _ => StpIndicator::Blank,
        }
    }

    pub fn to_cif(&self) -> char {
        STP_CODES
            .iter()
            .find(|(stp, _, _)| stp == self)
            .map(|(_, code, _)| *code)
            .unwrap_or(' ')
    }

    pub fn symbol(&self) -> Option<&'static str> {
        STP_CODES
            .iter()
            .find(|(stp, _, _)| stp == self)
            .map(|(_, _, symbol)| *symbol)
    }

    pub fn is_cancellation(&self) -> bool {
        *self == StpIndicator::Cancellation
    }
}

/// Strict: accepts a code letter or its symbolic name, rejects everything
/// else including blank.
impl FromStr for StpIndicator {
    type Err = CifErrorType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        STP_CODES
            .iter()
            .find(|(_, code, symbol)| {
                *symbol == value || (value.len() == 1 && value.starts_with(*code))
            })
            .map(|(stp, _, _)| *stp)
            .ok_or_else(|| CifErrorType::InvalidStpIndicator(value.to_string()))
    }
}

impl fmt::Display for StpIndicator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.symbol() {
            Some(x) => write!(f, "{}", x),
            None => write!(f, "blank"),
        }
    }
}
