use std::fmt::{self, Debug, Display};
use std::io;

use crate::compartment::Compartment;
use crate::params::AgeCohort;

/// Provides `EpirunError` and maps other errors to
/// convert to an `EpirunError`
#[derive(Debug)]
pub enum EpirunError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// Invalid or internally inconsistent `ModelParameters`. Surfaced
    /// before any trajectory computation begins; never retried.
    Configuration(String),
    /// An internal transition would break population conservation or
    /// produce an out-of-range count even after the clamp policy has
    /// been applied. Fatal for the affected trajectory only.
    InvariantViolation {
        time: f64,
        cohort: AgeCohort,
        compartment: Compartment,
        detail: String,
    },
}

impl From<io::Error> for EpirunError {
    fn from(error: io::Error) -> Self {
        EpirunError::IoError(error)
    }
}

impl From<serde_json::Error> for EpirunError {
    fn from(error: serde_json::Error) -> Self {
        EpirunError::JsonError(error)
    }
}

impl From<csv::Error> for EpirunError {
    fn from(error: csv::Error) -> Self {
        EpirunError::CSVError(error)
    }
}

impl From<String> for EpirunError {
    fn from(error: String) -> Self {
        EpirunError::Configuration(error)
    }
}

impl From<&str> for EpirunError {
    fn from(error: &str) -> Self {
        EpirunError::Configuration(error.to_string())
    }
}

impl std::error::Error for EpirunError {}

impl Display for EpirunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpirunError::IoError(e) => write!(f, "IO error: {e}"),
            EpirunError::JsonError(e) => write!(f, "JSON error: {e}"),
            EpirunError::CSVError(e) => write!(f, "CSV error: {e}"),
            EpirunError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            EpirunError::InvariantViolation {
                time,
                cohort,
                compartment,
                detail,
            } => write!(
                f,
                "invariant violation at t={time} (cohort {cohort}, {compartment}): {detail}"
            ),
        }
    }
}
