//! Journal records.
//!
//! The game appends one JSON object per line to `Journal.<timestamp>.<part>.log`.
//! Every object has an `event` discriminant plus event-specific fields.

pub mod comms;
pub mod event;

pub use comms::ChatMessage;
pub use event::{EventClass, JournalEvent, JournalParseError, CHAT_EVENT, WATCHED_EVENTS};
