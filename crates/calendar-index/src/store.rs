//! Repository-style facade over a single [`TemporalIndex`].
//!
//! The store owns validation: events that fail [`Event::validate`] are
//! rejected before they reach the index. Everything else is delegated.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::Result;
use crate::event::Event;
use crate::index::TemporalIndex;

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    index: TemporalIndex,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated event. Returns `false` (and stores nothing) when the
    /// event is rejected.
    pub fn insert(&mut self, event: Event) -> bool {
        match self.try_insert(event) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "rejected event");
                false
            }
        }
    }

    /// Insert an event, reporting why it was rejected.
    ///
    /// # Errors
    /// Returns `CalendarError::InvalidEvent` if the event fails validation.
    pub fn try_insert(&mut self, event: Event) -> Result<()> {
        event.validate()?;
        self.index.insert(event);
        Ok(())
    }

    pub fn delete(&mut self, subject: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.index.delete_exact(subject, start, end)
    }

    pub fn get(&self, subject: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<&Event> {
        self.index.find_exact(subject, start, end)
    }

    /// All events in ascending start order.
    pub fn get_all(&self) -> Vec<&Event> {
        self.index.all_events()
    }

    pub fn get_by_name(&self, subject: &str) -> Vec<&Event> {
        self.index.find_by_name(subject)
    }

    /// Events in progress at `instant`, boundaries included.
    pub fn get_at(&self, instant: DateTime<Utc>) -> Vec<&Event> {
        self.index.overlapping_at(instant)
    }

    /// Events overlapping the half-open window `[start, end)`.
    pub fn get_overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Event> {
        self.index.overlapping(start, end)
    }

    /// Replace the stored event that has the same `(subject, start, end)` as
    /// `event`. Returns `false` if no such event exists.
    pub fn update(&mut self, event: Event) -> bool {
        let subject = event.subject().to_string();
        let (start, end) = (event.start(), event.end());
        self.replace(&subject, start, end, event)
    }

    /// Replace the event identified by `(subject, start, end)` with
    /// `replacement`, which may carry a different identity.
    ///
    /// Nothing changes if the original is missing or the replacement is
    /// invalid.
    pub fn replace(
        &mut self,
        subject: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        replacement: Event,
    ) -> bool {
        if let Err(err) = replacement.validate() {
            warn!(error = %err, "rejected replacement event");
            return false;
        }
        if !self.index.delete_exact(subject, start, end) {
            return false;
        }
        self.index.insert(replacement);
        true
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Read-only access to the underlying index.
    pub fn index(&self) -> &TemporalIndex {
        &self.index
    }
}

impl Extend<Event> for EventStore {
    /// Inserts every valid event; invalid ones are logged and dropped.
    fn extend<I: IntoIterator<Item = Event>>(&mut self, events: I) {
        for event in events {
            self.insert(event);
        }
    }
}

impl FromIterator<Event> for EventStore {
    fn from_iter<I: IntoIterator<Item = Event>>(events: I) -> Self {
        let mut store = Self::new();
        store.extend(events);
        store
    }
}
