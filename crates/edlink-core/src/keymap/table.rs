//! Topic → key lookup table.

use std::collections::HashMap;

use thiserror::Error;

use super::key::KeyCode;

/// A keymap entry that could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeymapError {
    #[error("keymap entry for topic '{topic}' names unknown key '{key}'")]
    UnknownKey { topic: String, key: String },
}

/// Immutable mapping from inbound command topic to key.
///
/// Built once from configuration; a reload builds a new table and swaps it
/// in wholesale, so lookups never observe a half-updated map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keymap {
    entries: HashMap<String, KeyCode>,
}

impl Keymap {
    /// Builds a keymap from `(topic, key name)` pairs.
    ///
    /// Entries with a blank topic or a blank key name are ignored.  Entries
    /// naming an unknown key are skipped and returned alongside the table so
    /// the caller can log them; the affected topic then behaves as unmapped.
    /// When a topic appears twice the later entry wins.
    pub fn from_entries<I, T, K>(entries: I) -> (Self, Vec<KeymapError>)
    where
        I: IntoIterator<Item = (T, K)>,
        T: AsRef<str>,
        K: AsRef<str>,
    {
        let mut map = HashMap::new();
        let mut rejected = Vec::new();

        for (topic, key) in entries {
            let (topic, key) = (topic.as_ref().trim(), key.as_ref().trim());
            if topic.is_empty() || key.is_empty() {
                continue;
            }
            match key.parse::<KeyCode>() {
                Ok(code) => {
                    map.insert(topic.to_string(), code);
                }
                Err(_) => rejected.push(KeymapError::UnknownKey {
                    topic: topic.to_string(),
                    key: key.to_string(),
                }),
            }
        }

        (Self { entries: map }, rejected)
    }

    /// Key bound to an exact topic string.
    pub fn resolve(&self, topic: &str) -> Option<KeyCode> {
        self.entries.get(topic).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mapped topics in sorted order.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }
}
