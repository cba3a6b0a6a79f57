//! Report error types.

use chrono::NaiveDate;
use domain::ErrorKind;
use thiserror::Error;

/// Errors that can occur while generating a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// The range ends before it starts.
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A date could not be parsed.
    #[error("invalid date {value:?}: expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// A date range is required for this report kind.
    #[error("{0} report requires a start and end date")]
    MissingRange(&'static str),

    /// Report totals left the representable range.
    #[error("report totals are too large: {0}")]
    AmountOverflow(#[from] domain::AmountOverflow),

    /// Unknown report kind.
    #[error("unknown report type: {0}")]
    UnknownKind(String),
}

impl ReportError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Store(_) => ErrorKind::Database,
            ReportError::InvalidRange { .. }
            | ReportError::InvalidDate { .. }
            | ReportError::MissingRange(_)
            | ReportError::UnknownKind(_)
            | ReportError::AmountOverflow(_) => ErrorKind::Validation,
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
