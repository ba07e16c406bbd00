//! The canonical packet envelope published to the bus.
//!
//! Every payload leaving edlink, whatever its origin, is wrapped in the same
//! five-field JSON object:
//!
//! ```json
//! {"source":"status","type":"StatusDelta","timestamp":"2024-05-01T18:22:03.127Z","seq":42,"data":{...}}
//! ```
//!
//! The shape is a stable contract with external dashboards.  `data` is the
//! type-specific payload: the raw journal record, the full status flag map,
//! the module list, or the loadout summary.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::sequence::SequenceCounter;

/// Error type for packet construction and encoding.
#[derive(Debug, Error)]
pub enum PacketError {
    /// The payload could not be represented as JSON.
    #[error("failed to serialize packet payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The component that produced a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketSource {
    /// A record from the rotating journal log.
    Journal,
    /// A change of `Status.json` flags.
    Status,
    /// A change of `ModulesInfo.json`.
    Modules,
    /// A change of the ship loadout (from a `Loadout` journal record).
    Loadout,
    /// Messages produced by edlink itself.
    App,
}

impl PacketSource {
    /// Returns the wire name of the source.
    pub fn as_str(self) -> &'static str {
        match self {
            PacketSource::Journal => "journal",
            PacketSource::Status => "status",
            PacketSource::Modules => "modules",
            PacketSource::Loadout => "loadout",
            PacketSource::App => "app",
        }
    }
}

/// A sequenced, timestamped message ready for publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub source: PacketSource,
    /// Type tag, e.g. `FSDJump`, `StatusDelta`, `ModulesSnapshot`, `Loadout`.
    #[serde(rename = "type")]
    pub kind: String,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
    pub seq: u64,
    pub data: serde_json::Value,
}

impl Packet {
    /// Returns the outbound topic for this packet: `<base>/events/<type>`.
    pub fn topic(&self, base_topic: &str) -> String {
        format!("{}/events/{}", base_topic.trim_end_matches('/'), self.kind)
    }

    /// Encodes the packet as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Serialize`] if the payload cannot be encoded.
    pub fn to_json(&self) -> Result<String, PacketError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds packets with a shared, process-wide sequence counter.
///
/// Wrap one builder in an `Arc` and hand a clone to every producer.
#[derive(Debug, Default)]
pub struct PacketBuilder {
    sequence: SequenceCounter,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `data` into a packet stamped with the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Serialize`] if `data` cannot be converted to
    /// JSON.  No sequence number is consumed in that case.
    pub fn build<T>(
        &self,
        source: PacketSource,
        kind: &str,
        data: &T,
    ) -> Result<Packet, PacketError>
    where
        T: Serialize + ?Sized,
    {
        self.build_at(source, kind, data, Utc::now())
    }

    /// Like [`build`](Self::build) but with an explicit timestamp.
    pub fn build_at<T>(
        &self,
        source: PacketSource,
        kind: &str,
        data: &T,
        at: DateTime<Utc>,
    ) -> Result<Packet, PacketError>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_value(data)?;
        Ok(Packet {
            source,
            kind: kind.to_string(),
            timestamp: format_timestamp(at),
            seq: self.sequence.next(),
            data,
        })
    }

    /// Returns the sequence number of the last packet built (0 if none).
    pub fn last_seq(&self) -> u64 {
        self.sequence.current()
    }
}

/// Formats `at` as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
