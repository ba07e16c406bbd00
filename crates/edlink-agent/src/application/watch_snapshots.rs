//! Snapshot file watchers for `Status.json` and `ModulesInfo.json`.
//!
//! The game rewrites these fixed-name files in place whenever the underlying
//! state changes (and sometimes when it does not).  Each watcher re-reads its
//! file on a change notification, decodes it into a snapshot value and lets a
//! [`DeltaTracker`] decide whether the value is new.
//!
//! The per-file differences (name, decoder, packet type, change logging) are
//! captured by the [`SnapshotSource`] trait so one generic
//! [`SnapshotWatcher`] serves both files.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use edlink_core::{
    DeltaTracker, ModulesSnapshot, Observation, PacketError, PacketSource, SnapshotParseError,
    StatusFlags,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::publish_queue::Publisher;

/// Error type for refreshing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: SnapshotParseError,
    },
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Describes one snapshot file.
pub trait SnapshotSource {
    type Snapshot: PartialEq + Serialize;

    /// File name inside the journal directory.
    const FILE_NAME: &'static str;
    const SOURCE: PacketSource;
    /// Packet `type` tag.
    const KIND: &'static str;

    fn parse(document: &str) -> Result<Self::Snapshot, SnapshotParseError>;

    /// Called before a changed snapshot is published.
    fn log_change(previous: Option<&Self::Snapshot>, next: &Self::Snapshot);
}

/// `Status.json`: the 31 ship/SRV state flags.
pub struct StatusSource;

impl SnapshotSource for StatusSource {
    type Snapshot = StatusFlags;

    const FILE_NAME: &'static str = "Status.json";
    const SOURCE: PacketSource = PacketSource::Status;
    const KIND: &'static str = "StatusDelta";

    fn parse(document: &str) -> Result<StatusFlags, SnapshotParseError> {
        StatusFlags::from_status_json(document)
    }

    fn log_change(previous: Option<&StatusFlags>, next: &StatusFlags) {
        match previous {
            None => info!(flags = next.bits(), "status baseline"),
            Some(previous) => {
                for (flag, value) in next.transitions_from(*previous) {
                    info!("status {} -> {}", flag.name(), value);
                }
            }
        }
    }
}

/// `ModulesInfo.json`: power draw and priority per slot.
pub struct ModulesSource;

impl SnapshotSource for ModulesSource {
    type Snapshot = ModulesSnapshot;

    const FILE_NAME: &'static str = "ModulesInfo.json";
    const SOURCE: PacketSource = PacketSource::Modules;
    const KIND: &'static str = "ModulesSnapshot";

    fn parse(document: &str) -> Result<ModulesSnapshot, SnapshotParseError> {
        ModulesSnapshot::from_modules_json(document)
    }

    fn log_change(_previous: Option<&ModulesSnapshot>, next: &ModulesSnapshot) {
        info!(modules = next.len(), "modules info changed");
    }
}

/// Re-reads one snapshot file and publishes it when it changed.
pub struct SnapshotWatcher<S: SnapshotSource> {
    path: PathBuf,
    tracker: DeltaTracker<S::Snapshot>,
    publisher: Publisher,
    _source: PhantomData<S>,
}

impl<S: SnapshotSource> SnapshotWatcher<S> {
    pub fn new(dir: &Path, publisher: Publisher) -> Self {
        Self {
            path: dir.join(S::FILE_NAME),
            tracker: DeltaTracker::new(),
            publisher,
            _source: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a notification for `path` concerns this watcher's file.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name() == self.path.file_name()
    }

    /// Reads, decodes and (if changed) publishes the file.
    ///
    /// Returns `true` when a packet was enqueued.  A blank file (the game
    /// caught mid-rewrite) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] on I/O or decode failure; the stored
    /// snapshot is unchanged in that case.
    pub fn refresh(&mut self) -> Result<bool, SnapshotError> {
        let document = fs::read_to_string(&self.path).map_err(|source| SnapshotError::Read {
            path: self.path.clone(),
            source,
        })?;
        let document = document.trim_start_matches('\u{feff}');
        if document.trim().is_empty() {
            debug!(file = S::FILE_NAME, "snapshot file empty; waiting for rewrite");
            return Ok(false);
        }

        let snapshot = S::parse(document).map_err(|source| SnapshotError::Parse {
            path: self.path.clone(),
            source,
        })?;

        match self.tracker.observe(snapshot) {
            Observation::Unchanged => {
                debug!(file = S::FILE_NAME, "snapshot unchanged");
                return Ok(false);
            }
            Observation::Baseline => {
                if let Some(current) = self.tracker.current() {
                    S::log_change(None, current);
                }
            }
            Observation::Changed { previous } => {
                if let Some(current) = self.tracker.current() {
                    S::log_change(Some(&previous), current);
                }
            }
        }

        if let Some(current) = self.tracker.current() {
            self.publisher.publish(S::SOURCE, S::KIND, current)?;
        }
        Ok(true)
    }

    pub fn current(&self) -> Option<&S::Snapshot> {
        self.tracker.current()
    }
}

/// The two snapshot watchers driven by one filesystem-notification thread.
pub struct SnapshotWatchers {
    pub status: SnapshotWatcher<StatusSource>,
    pub modules: SnapshotWatcher<ModulesSource>,
}

impl SnapshotWatchers {
    pub fn new(dir: &Path, publisher: Publisher) -> Self {
        Self {
            status: SnapshotWatcher::new(dir, publisher.clone()),
            modules: SnapshotWatcher::new(dir, publisher),
        }
    }

    /// Routes a change notification to the watcher owning `path`.
    ///
    /// Returns `Ok(None)` when `path` is not a snapshot file.
    ///
    /// # Errors
    ///
    /// Propagates the owning watcher's [`SnapshotError`].
    pub fn on_path_changed(&mut self, path: &Path) -> Result<Option<bool>, SnapshotError> {
        if self.status.matches(path) {
            self.status.refresh().map(Some)
        } else if self.modules.matches(path) {
            self.modules.refresh().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads both files once, publishing their baselines.  Missing files are
    /// skipped silently; the game creates them on first launch.
    pub fn refresh_all(&mut self) -> Vec<SnapshotError> {
        [self.status.refresh(), self.modules.refresh()]
            .into_iter()
            .filter_map(Result::err)
            .filter(|e| {
                !matches!(e, SnapshotError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::publish_queue::{OutboundMessage, PublishQueue};
    use edlink_core::PacketBuilder;
    use std::sync::Arc;

    fn make_watchers(dir: &Path) -> (SnapshotWatchers, Arc<PublishQueue>) {
        let queue = Arc::new(PublishQueue::new(100));
        let publisher = Publisher::new(Arc::new(PacketBuilder::new()), Arc::clone(&queue), "elite");
        (SnapshotWatchers::new(dir, publisher), queue)
    }

    fn write_status(dir: &Path, flags: u32) -> PathBuf {
        let path = dir.join("Status.json");
        fs::write(
            &path,
            format!(r#"{{ "timestamp":"2024-05-01T18:22:03Z", "event":"Status", "Flags":{flags} }}"#),
        )
        .unwrap();
        path
    }

    fn drain(queue: &PublishQueue) -> Vec<OutboundMessage> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_status_publishes_once_per_distinct_value() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (mut watchers, queue) = make_watchers(dir.path());

        // Act: docked with gear down, identical rewrite, then landed too
        let path = write_status(dir.path(), 0b101);
        let first = watchers.on_path_changed(&path).unwrap();
        write_status(dir.path(), 0b101);
        let repeated = watchers.on_path_changed(&path).unwrap();
        write_status(dir.path(), 0b111);
        let landed = watchers.on_path_changed(&path).unwrap();

        // Assert
        assert_eq!(
            (first, repeated, landed),
            (Some(true), Some(false), Some(true))
        );
        let messages = drain(&queue);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.topic == "elite/events/StatusDelta"));

        let first: serde_json::Value = serde_json::from_str(&messages[0].payload).unwrap();
        assert_eq!(first["source"], "status");
        assert_eq!(first["data"]["Docked"], true);
        assert_eq!(first["data"]["Landed"], false);
        assert_eq!(first["data"]["LandingGearDown"], true);
        assert_eq!(first["data"].as_object().unwrap().len(), 31);

        let landed: serde_json::Value = serde_json::from_str(&messages[1].payload).unwrap();
        assert_eq!(landed["data"]["Docked"], true);
        assert_eq!(landed["data"]["Landed"], true);
        assert_eq!(landed["data"]["LandingGearDown"], true);
        let set: Vec<&String> = landed["data"]
            .as_object()
            .unwrap()
            .iter()
            .filter(|(_, v)| **v == serde_json::Value::Bool(true))
            .map(|(k, _)| k)
            .collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_modules_file_is_routed_to_modules_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watchers, queue) = make_watchers(dir.path());
        let path = dir.path().join("ModulesInfo.json");
        fs::write(
            &path,
            r#"{"event":"ModuleInfo","Modules":[{"Slot":"MainEngines","Power":6.12,"Priority":0},{"Power":0.5}]}"#,
        )
        .unwrap();

        assert_eq!(watchers.on_path_changed(&path).unwrap(), Some(true));

        let messages = drain(&queue);
        assert_eq!(messages[0].topic, "elite/events/ModulesSnapshot");
        let body: serde_json::Value = serde_json::from_str(&messages[0].payload).unwrap();
        assert_eq!(body["data"][0]["Slot"], "MainEngines");
        assert_eq!(body["data"][1]["Slot"], "Unknown");
    }

    #[test]
    fn test_unrelated_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watchers, queue) = make_watchers(dir.path());

        let result = watchers
            .on_path_changed(&dir.path().join("Cargo.json"))
            .unwrap();

        assert_eq!(result, None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_blank_file_is_skipped_and_malformed_file_keeps_state() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (mut watchers, queue) = make_watchers(dir.path());
        let path = write_status(dir.path(), 0b1);
        watchers.on_path_changed(&path).unwrap();

        // Act
        fs::write(&path, "").unwrap();
        let blank = watchers.on_path_changed(&path).unwrap();
        fs::write(&path, "{ \"Flags\": ").unwrap();
        let malformed = watchers.on_path_changed(&path);

        // Assert
        assert_eq!(blank, Some(false));
        assert!(matches!(malformed, Err(SnapshotError::Parse { .. })));
        assert_eq!(watchers.status.current(), Some(&StatusFlags::from_bits(0b1)));
        assert_eq!(drain(&queue).len(), 1);
    }

    #[test]
    fn test_refresh_all_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watchers, queue) = make_watchers(dir.path());
        write_status(dir.path(), 0);

        let errors = watchers.refresh_all();

        assert!(errors.is_empty());
        assert_eq!(drain(&queue).len(), 1);
    }
}
