use crate::cif_fields::CifError;
use crate::nr_json::NrJsonError;
use crate::schedule_data::ScheduleDataError;
use config_file::ConfigFileError;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConfigFileError(ConfigFileError),
    IoError(std::io::Error),
    CifError(CifError),
    NrJsonError(NrJsonError),
    SerdeJsonError(serde_json::Error),
    ScheduleDataError(ScheduleDataError),
    IncompleteFile { lines: u64 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ConfigFileError(x) => write!(f, "Config file error: {}", x),
            Error::IoError(x) => write!(f, "I/O error: {}", x),
            Error::CifError(x) => write!(f, "{}", x),
            Error::NrJsonError(x) => write!(f, "{}", x),
            Error::SerdeJsonError(x) => write!(f, "Malformed JSON record: {}", x),
            Error::ScheduleDataError(x) => write!(f, "{}", x),
            Error::IncompleteFile { lines } => write!(
                f,
                "File is incomplete, no trailer record after {} lines",
                lines
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigFileError> for Error {
    fn from(error: ConfigFileError) -> Self {
        Error::ConfigFileError(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IoError(error)
    }
}

impl From<CifError> for Error {
    fn from(error: CifError) -> Self {
        Error::CifError(error)
    }
}

impl From<NrJsonError> for Error {
    fn from(error: NrJsonError) -> Self {
        Error::NrJsonError(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerdeJsonError(error)
    }
}

impl From<ScheduleDataError> for Error {
    fn from(error: ScheduleDataError) -> Self {
        Error::ScheduleDataError(error)
    }
}
