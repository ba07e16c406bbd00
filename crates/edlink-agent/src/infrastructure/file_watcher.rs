//! Directory change notifications.
//!
//! Wraps `notify::RecommendedWatcher` (ReadDirectoryChangesW on Windows,
//! inotify on Linux) behind a blocking, channel-based interface suited to a
//! dedicated thread:
//!
//! ```text
//!   notify callback ──mpsc──► DirectoryWatcher::wait(timeout) ──► Vec<FileEvent>
//! ```
//!
//! Watches are always non-recursive; the game keeps its telemetry files
//! flat in one folder.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{info, warn};

/// Error type for watcher setup.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create file watcher: {0}")]
    Init(#[source] notify::Error),
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Classification of a file system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Create,
    /// Content or metadata change (not a rename).
    Modify,
    Rename,
    Delete,
    /// Access and watcher-internal events.
    Other,
}

impl FileEventKind {
    /// Whether the file's content may differ afterwards.
    pub fn is_mutation(self) -> bool {
        !matches!(self, FileEventKind::Other | FileEventKind::Delete)
    }
}

/// One affected path with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

/// Blocking directory watcher.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    rx: mpsc::Receiver<notify::Result<Event>>,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher").finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Creates a watcher with no active watches.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the OS watcher cannot be created.
    pub fn new() -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(WatchError::Init)?;
        Ok(Self { watcher, rx })
    }

    /// Starts watching `dir` (non-recursive).
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Watch`] if the path does not exist or the
    /// watch cannot be registered.
    pub fn watch(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: dir.to_path_buf(),
                source,
            })?;
        info!(dir = %dir.display(), "watching for file changes");
        Ok(())
    }

    /// Blocks up to `timeout` for the first event, then drains everything
    /// already buffered.  Returns an empty list on timeout or when the
    /// notification channel has closed.
    pub fn wait(&self, timeout: Duration) -> Vec<FileEvent> {
        let mut events = Vec::new();
        match self.rx.recv_timeout(timeout) {
            Ok(first) => Self::collect(first, &mut events),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return events,
        }
        while let Ok(next) = self.rx.try_recv() {
            Self::collect(next, &mut events);
        }
        events
    }

    fn collect(result: notify::Result<Event>, events: &mut Vec<FileEvent>) {
        match result {
            Ok(event) => {
                let kind = classify(&event.kind);
                events.extend(event.paths.into_iter().map(|path| FileEvent { path, kind }));
            }
            Err(e) => warn!("file watcher error: {e}"),
        }
    }
}

/// Maps `notify::EventKind` to [`FileEventKind`].
fn classify(kind: &notify::EventKind) -> FileEventKind {
    match kind {
        notify::EventKind::Create(_) => FileEventKind::Create,
        notify::EventKind::Modify(notify::event::ModifyKind::Name(_)) => FileEventKind::Rename,
        notify::EventKind::Modify(_) => FileEventKind::Modify,
        notify::EventKind::Remove(_) => FileEventKind::Delete,
        _ => FileEventKind::Other,
    }
}

/// Collapses a burst of events to the distinct mutated paths, in first-seen
/// order.  The game often writes a snapshot file several times in a row.
pub fn changed_paths(events: &[FileEvent]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for event in events.iter().filter(|e| e.kind.is_mutation()) {
        if !paths.contains(&event.path) {
            paths.push(event.path.clone());
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_nonexistent_path_fails() {
        let mut watcher = DirectoryWatcher::new().expect("should create watcher");
        let result = watcher.watch(Path::new("/nonexistent/path/abc123"));
        assert!(matches!(result, Err(WatchError::Watch { .. })));
    }

    #[test]
    fn test_wait_times_out_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirectoryWatcher::new().unwrap();
        watcher.watch(dir.path()).unwrap();

        assert!(watcher.wait(Duration::from_millis(50)).is_empty());
    }

    #[test]
    fn test_write_in_watched_directory_is_reported() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirectoryWatcher::new().unwrap();
        watcher.watch(dir.path()).unwrap();
        let target = dir.path().join("Status.json");

        // Act
        std::fs::write(&target, "{}").unwrap();
        let mut seen = Vec::new();
        for _ in 0..20 {
            seen.extend(changed_paths(&watcher.wait(Duration::from_millis(100))));
            if seen.iter().any(|p: &PathBuf| p.file_name() == target.file_name()) {
                break;
            }
        }

        // Assert
        assert!(seen.iter().any(|p| p.file_name() == target.file_name()));
    }

    #[test]
    fn test_classify_kinds() {
        use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
        use notify::EventKind;

        assert_eq!(classify(&EventKind::Create(CreateKind::File)), FileEventKind::Create);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            FileEventKind::Modify
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            FileEventKind::Rename
        );
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), FileEventKind::Delete);
        assert_eq!(classify(&EventKind::Access(AccessKind::Read)), FileEventKind::Other);
    }

    #[test]
    fn test_changed_paths_dedups_and_skips_non_mutations() {
        let a = PathBuf::from("/j/Status.json");
        let b = PathBuf::from("/j/ModulesInfo.json");
        let events = vec![
            FileEvent { path: a.clone(), kind: FileEventKind::Modify },
            FileEvent { path: b.clone(), kind: FileEventKind::Other },
            FileEvent { path: a.clone(), kind: FileEventKind::Modify },
            FileEvent { path: b.clone(), kind: FileEventKind::Create },
        ];

        assert_eq!(changed_paths(&events), vec![a, b]);
    }
}
