//! Error types for calendar-index operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid date/time: {0}")]
    InvalidDateTime(String),

    /// A CSV decoding failure, with the 1-based line where the record starts.
    #[error("CSV error at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// The tree no longer satisfies its ordering or `max_end` invariants.
    #[error("Index corrupted: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
