//! # calendar-index
//!
//! In-memory temporal interval index for calendar events.
//!
//! Events are stored in an augmented binary search tree keyed by start time.
//! Every node caches the latest end time found anywhere in its subtree, which
//! lets point-in-time and range-overlap queries skip whole branches that cannot
//! contain a match.
//!
//! ## Quick start
//!
//! ```rust
//! use calendar_index::{Event, EventStore};
//! use chrono::{TimeZone, Utc};
//!
//! let mut store = EventStore::new();
//! let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
//! assert!(store.insert(Event::new("standup", start, end)));
//!
//! let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 30, 0).unwrap();
//! assert_eq!(store.get_at(at).len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`event`] — immutable `Event` value type
//! - [`index`] — `TemporalIndex`, the augmented BST
//! - [`store`] — `EventStore`, repository facade over one index
//! - [`csv`] — Google Calendar style CSV import/export
//! - [`time`] — wall-clock ↔ UTC helpers for IANA timezones
//! - [`error`] — Error types

pub mod csv;
pub mod error;
pub mod event;
pub mod index;
pub mod store;
pub mod time;

pub use csv::ImportReport;
pub use error::CalendarError;
pub use event::Event;
pub use index::TemporalIndex;
pub use store::EventStore;
