//! Formatting of `ReceiveText` (incoming chat) records.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A chat line extracted from a `ReceiveText` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatMessage {
    pub channel: String,
    pub from: String,
    pub message: String,
}

impl ChatMessage {
    /// Builds the message from a raw record, preferring localised text.
    pub fn from_record(record: &Value) -> Self {
        let text = |keys: &[&str], fallback: &str| {
            keys.iter()
                .find_map(|k| record.get(*k).and_then(Value::as_str))
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            channel: text(&["Channel"], "Unknown"),
            from: text(&["From_Localised", "From"], "Unknown"),
            message: text(&["Message_Localised", "Message"], "???"),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]|[{}] : {}", self.channel, self.from, self.message)
    }
}
