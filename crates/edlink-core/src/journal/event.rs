//! Parsing and classification of a single journal line.

use serde_json::Value;
use thiserror::Error;

/// Events published to the bus as-is.
///
/// `ReceiveText` is part of the watch filter but is routed to the chat
/// formatter instead of the generic publish path.
pub const WATCHED_EVENTS: [&str; 18] = [
    "Fileheader",
    "LoadGame",
    "Shutdown",
    "Location",
    "StartJump",
    "FSDJump",
    "SupercruiseEntry",
    "SupercruiseExit",
    "Docked",
    "Undocked",
    "ApproachBody",
    "Touchdown",
    "Liftoff",
    "HullDamage",
    "HeatWarning",
    "ShieldState",
    "FuelScoop",
    CHAT_EVENT,
];

/// Incoming chat / text event.
pub const CHAT_EVENT: &str = "ReceiveText";

/// Error type for journal line parsing.
#[derive(Debug, Error)]
pub enum JournalParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("journal record is not a JSON object")]
    NotAnObject,
}

/// How the tailer treats a parsed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// In the watched set: publish the raw record.
    Watched,
    /// `ReceiveText`: handled by the chat formatter.
    Chat,
    /// Anything else: diagnostics only.
    Unclassified,
}

/// One parsed journal record.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEvent {
    record: Value,
}

impl JournalEvent {
    /// Parses one line of the journal.
    ///
    /// # Errors
    ///
    /// Returns [`JournalParseError::Json`] for invalid JSON and
    /// [`JournalParseError::NotAnObject`] for valid JSON that is not an object.
    pub fn parse(line: &str) -> Result<Self, JournalParseError> {
        let record: Value = serde_json::from_str(line)?;
        if !record.is_object() {
            return Err(JournalParseError::NotAnObject);
        }
        Ok(Self { record })
    }

    /// The `event` discriminant, if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.record.get("event").and_then(Value::as_str)
    }

    /// The full record.
    pub fn record(&self) -> &Value {
        &self.record
    }

    pub fn classify(&self) -> EventClass {
        match self.kind() {
            Some(CHAT_EVENT) => EventClass::Chat,
            Some(kind) if WATCHED_EVENTS.contains(&kind) => EventClass::Watched,
            _ => EventClass::Unclassified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_kind() {
        let event = JournalEvent::parse(
            r#"{ "timestamp":"2024-05-01T18:00:00Z", "event":"FSDJump", "StarSystem":"Sol" }"#,
        )
        .unwrap();

        assert_eq!(event.kind(), Some("FSDJump"));
        assert_eq!(event.record()["StarSystem"], "Sol");
    }

    #[test]
    fn test_watched_event_classification() {
        for kind in ["Fileheader", "Docked", "FuelScoop", "FSDJump"] {
            let event = JournalEvent::parse(&format!(r#"{{"event":"{kind}"}}"#)).unwrap();
            assert_eq!(event.classify(), EventClass::Watched, "{kind}");
        }
    }

    #[test]
    fn test_receive_text_is_chat() {
        let event = JournalEvent::parse(r#"{"event":"ReceiveText","Message":"o7"}"#).unwrap();
        assert_eq!(event.classify(), EventClass::Chat);
    }

    #[test]
    fn test_unknown_and_missing_kind_are_unclassified() {
        let music = JournalEvent::parse(r#"{"event":"Music","MusicTrack":"Exploration"}"#).unwrap();
        let bare = JournalEvent::parse(r#"{"timestamp":"x"}"#).unwrap();

        assert_eq!(music.classify(), EventClass::Unclassified);
        assert_eq!(bare.kind(), None);
        assert_eq!(bare.classify(), EventClass::Unclassified);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            JournalEvent::parse(r#"{"event":"FSDJu"#),
            Err(JournalParseError::Json(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(
            JournalEvent::parse("[1,2,3]"),
            Err(JournalParseError::NotAnObject)
        ));
    }
}
