//! # edlink-core
//!
//! Shared library for edlink containing the packet envelope, the snapshot
//! value objects distilled from the game's telemetry files, the generic delta
//! tracker, the journal event model, and the key name tables used by the
//! inbound command path.
//!
//! It has zero dependencies on OS APIs, file watching, or network sockets.
//!
//! # Architecture overview
//!
//! edlink watches the directory where Elite Dangerous writes its telemetry:
//! rotating `Journal.*.log` files (one JSON record per line) and two
//! fixed-name snapshot files (`Status.json`, `ModulesInfo.json`).  Every
//! interesting record or state change is wrapped in a [`Packet`] and published
//! to an MQTT broker.  In the other direction, MQTT command topics are mapped
//! to key presses that are injected into the game.
//!
//! This crate is the pure foundation:
//!
//! - **`packet`** – The canonical envelope (`source`, `type`, `timestamp`,
//!   `seq`, `data`) and the process-wide sequence counter.
//!
//! - **`snapshot`** – Comparable state objects (`StatusFlags`,
//!   `LoadoutSnapshot`, `ModulesSnapshot`) and the [`DeltaTracker`] that
//!   decides whether a freshly computed snapshot must be republished.
//!
//! - **`journal`** – Parsing of one journal line into a [`JournalEvent`] and
//!   classification against the watched event set.
//!
//! - **`keymap`** – Key names accepted in the keymap and their platform codes.

pub mod journal;
pub mod keymap;
pub mod packet;
pub mod snapshot;

pub use journal::{ChatMessage, EventClass, JournalEvent, JournalParseError};
pub use keymap::{KeyCode, Keymap, KeymapError};
pub use packet::{Packet, PacketBuilder, PacketError, PacketSource, SequenceCounter};
pub use snapshot::delta::{DeltaTracker, Observation};
pub use snapshot::SnapshotParseError;
pub use snapshot::loadout::LoadoutSnapshot;
pub use snapshot::modules::ModulesSnapshot;
pub use snapshot::status::{StatusFlag, StatusFlags};
