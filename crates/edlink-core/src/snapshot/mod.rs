//! Snapshot value objects and change detection.
//!
//! A *snapshot* is a complete-state value recomputed from a file or a journal
//! record.  Each snapshot source keeps the last value it published in a
//! [`delta::DeltaTracker`] and republishes only when the new value differs.
//!
//! - **`status`** – the 31 named booleans packed into `Status.json`'s `Flags`.
//! - **`modules`** – slot/power/priority list from `ModulesInfo.json`.
//! - **`loadout`** – ship summary distilled from a `Loadout` journal record.

pub mod delta;
pub mod loadout;
pub mod modules;
pub mod status;

use thiserror::Error;

/// Error type for turning raw JSON into a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotParseError {
    /// The document is not valid JSON or does not have the expected shape.
    #[error("malformed snapshot document: {0}")]
    Json(#[from] serde_json::Error),
}
