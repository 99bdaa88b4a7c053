//! The `Event` value type.
//!
//! An event is immutable once built: fields are private and the optional
//! attributes are set through consuming `with_*` builders.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};

/// A single calendar occurrence.
///
/// The store identifies events by `(subject, start, end)`; see [`Event::matches`].
/// `PartialEq` compares every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    subject: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default = "default_public")]
    is_public: bool,
}

fn default_public() -> bool {
    true
}

impl Event {
    /// Create a public, timed event with no description or location.
    pub fn new(subject: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            start,
            end,
            description: None,
            location: None,
            is_all_day: false,
            is_public: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_all_day(&self) -> bool {
        self.is_all_day
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether this event carries the store identity `(subject, start, end)`.
    pub fn matches(&self, subject: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start == start && self.end == end && self.subject == subject
    }

    /// Check the event is acceptable for storage.
    ///
    /// Rejects a blank subject and an end before the start. Zero-length
    /// events are allowed.
    ///
    /// # Errors
    /// Returns `CalendarError::InvalidEvent` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(CalendarError::InvalidEvent(
                "subject must not be empty".to_string(),
            ));
        }
        if self.end < self.start {
            return Err(CalendarError::InvalidEvent(format!(
                "'{}' ends ({}) before it starts ({})",
                self.subject,
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        Ok(())
    }
}
