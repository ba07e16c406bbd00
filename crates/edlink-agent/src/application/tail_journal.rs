//! JournalTailer: incremental reader for the game's rotating journal files.
//!
//! The game writes `Journal.<date>.<part>.log` and starts a new file on every
//! session (and every few hours).  The tailer follows the newest file and
//! remembers how far it has read in a [`TailCursor`].
//!
//! # One poll
//!
//! ```text
//!   list dir ─► newest Journal*.log ─► changed? reset offset to 0
//!            ─► file shorter than offset? reset offset to 0
//!            ─► read offset..EOF, keep up to the last '\n'
//!            ─► per line: parse ─► loadout tracker ─► watched? publish
//!            ─► commit cursor
//! ```
//!
//! Only complete lines are consumed: a half-written line at the end of the
//! file stays there until the game finishes it, so the offset always sits on
//! a record boundary.  The cursor is committed only after the read
//! succeeded; a failed poll leaves it untouched for the next attempt.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edlink_core::journal::{ChatMessage, EventClass, JournalEvent};
use edlink_core::{DeltaTracker, LoadoutSnapshot, PacketSource};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::publish_queue::Publisher;

pub const JOURNAL_PREFIX: &str = "Journal";
pub const JOURNAL_SUFFIX: &str = ".log";

/// Packet type used for loadout changes.
pub const LOADOUT_KIND: &str = "Loadout";

/// Error type for one tailer poll.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("cannot list journal directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read journal file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read position in the active journal file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailCursor {
    pub path: Option<PathBuf>,
    pub offset: u64,
}

/// Counters for one successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    /// The active file changed since the previous poll.
    pub rotated: bool,
    /// Complete non-blank lines consumed.
    pub lines: usize,
    /// Packets enqueued.
    pub published: usize,
    /// Lines that failed to parse.
    pub malformed: usize,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The directory holds no journal file yet.
    NoJournal,
    Polled(PollStats),
}

/// Returns the lexicographically greatest `Journal*.log` file in `dir`.
///
/// Journal names embed a sortable timestamp, so the greatest name is the
/// newest file.
///
/// # Errors
///
/// Returns [`TailError::ListDir`] if the directory cannot be read.
pub fn newest_journal(dir: &Path) -> Result<Option<PathBuf>, TailError> {
    let list_err = |source| TailError::ListDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut newest: Option<(String, PathBuf)> = None;
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !(name.starts_with(JOURNAL_PREFIX) && name.ends_with(JOURNAL_SUFFIX)) {
            continue;
        }
        if newest.as_ref().map_or(true, |(best, _)| name > *best) {
            newest = Some((name, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Reads the complete lines of `path` starting at `offset`.
///
/// Returns the lines (without `\n` or `\r`) and the offset just past the
/// last consumed newline.  If the file is shorter than `offset` it is read
/// from the start.
fn read_complete_lines(path: &Path, offset: u64) -> io::Result<(Vec<String>, u64, bool)> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let (start, truncated) = if len < offset { (0, true) } else { (offset, false) };

    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
        return Ok((Vec::new(), start, truncated));
    };
    let complete = &buf[..=last_newline];
    let lines = complete
        .split(|&b| b == b'\n')
        .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\r').to_string())
        .filter(|line| !line.trim().is_empty())
        .collect();
    Ok((lines, start + complete.len() as u64, truncated))
}

/// Follows the newest journal file and publishes its records.
///
/// Owns the cursor and the loadout tracker; drive it from a single loop.
pub struct JournalTailer {
    dir: PathBuf,
    cursor: TailCursor,
    loadout: DeltaTracker<LoadoutSnapshot>,
    publisher: Publisher,
    publish_chat: bool,
}

impl JournalTailer {
    pub fn new(dir: impl Into<PathBuf>, publisher: Publisher, publish_chat: bool) -> Self {
        Self {
            dir: dir.into(),
            cursor: TailCursor::default(),
            loadout: DeltaTracker::new(),
            publisher,
            publish_chat,
        }
    }

    pub fn cursor(&self) -> &TailCursor {
        &self.cursor
    }

    /// Captures what is needed to rebuild this tailer at its committed cursor.
    pub fn checkpoint(&self) -> TailerCheckpoint {
        TailerCheckpoint {
            dir: self.dir.clone(),
            cursor: self.cursor.clone(),
            publisher: self.publisher.clone(),
            publish_chat: self.publish_chat,
        }
    }

    /// Runs one poll cycle.
    ///
    /// # Errors
    ///
    /// Returns [`TailError`] when the directory cannot be listed or the
    /// selected file cannot be read.  The cursor is unchanged in both cases.
    pub fn poll(&mut self) -> Result<PollOutcome, TailError> {
        let Some(path) = newest_journal(&self.dir)? else {
            return Ok(PollOutcome::NoJournal);
        };

        let rotated = self.cursor.path.as_deref() != Some(path.as_path());
        let offset = if rotated { 0 } else { self.cursor.offset };

        let (lines, new_offset, truncated) =
            read_complete_lines(&path, offset).map_err(|source| TailError::Read {
                path: path.clone(),
                source,
            })?;

        if rotated {
            info!(file = %path.display(), "following journal");
        } else if truncated {
            warn!(file = %path.display(), offset, "journal shrank; reading from the start");
        }
        self.cursor = TailCursor {
            path: Some(path),
            offset: new_offset,
        };

        let mut stats = PollStats {
            rotated,
            lines: lines.len(),
            ..PollStats::default()
        };
        for line in &lines {
            self.handle_line(line, &mut stats);
        }
        Ok(PollOutcome::Polled(stats))
    }

    fn handle_line(&mut self, line: &str, stats: &mut PollStats) {
        let event = match JournalEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                stats.malformed += 1;
                warn!("skipping malformed journal line: {e}");
                return;
            }
        };

        self.track_loadout(&event, stats);

        match event.classify() {
            EventClass::Watched => {
                let kind = event.kind().unwrap_or_default();
                match self.publisher.publish(PacketSource::Journal, kind, event.record()) {
                    Ok(seq) => {
                        stats.published += 1;
                        debug!(event = kind, seq, "journal event queued");
                    }
                    Err(e) => error!(event = kind, "failed to build journal packet: {e}"),
                }
            }
            EventClass::Chat => {
                let chat = ChatMessage::from_record(event.record());
                info!("{chat}");
                if self.publish_chat {
                    match self.publisher.publish(PacketSource::Journal, "ReceiveText", &chat) {
                        Ok(_) => stats.published += 1,
                        Err(e) => error!("failed to build chat packet: {e}"),
                    }
                }
            }
            EventClass::Unclassified => {
                debug!(event = event.kind().unwrap_or("<none>"), "unclassified journal event");
            }
        }
    }

    fn track_loadout(&mut self, event: &JournalEvent, stats: &mut PollStats) {
        let snapshot = match LoadoutSnapshot::from_record(event.record()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                warn!("unreadable Loadout record: {e}");
                return;
            }
        };

        let summary = snapshot.summary_line();
        let observation = self.loadout.observe(snapshot);
        if !observation.should_publish() {
            debug!("loadout unchanged");
            return;
        }
        let Some(current) = self.loadout.current() else {
            return;
        };
        info!("loadout: {summary}");
        match self.publisher.publish(PacketSource::Loadout, LOADOUT_KIND, current) {
            Ok(_) => stats.published += 1,
            Err(e) => error!("failed to build loadout packet: {e}"),
        }
    }
}

/// A tailer's position and wiring, without its loadout history.
#[derive(Debug, Clone)]
pub struct TailerCheckpoint {
    dir: PathBuf,
    cursor: TailCursor,
    publisher: Publisher,
    publish_chat: bool,
}

impl TailerCheckpoint {
    /// Rebuilds a tailer that continues from the captured cursor.  The next
    /// `Loadout` record is published again.
    pub fn restore(self) -> JournalTailer {
        let mut tailer = JournalTailer::new(self.dir, self.publisher, self.publish_chat);
        tailer.cursor = self.cursor;
        tailer
    }
}

/// Polls `tailer` every `interval` until `running` is cleared.
///
/// File reads run on the blocking pool; the tailer is moved there and back
/// each cycle.  If a poll panics, the tailer is rebuilt from the cursor it
/// had before that poll and tailing continues.
pub async fn run_tail_loop(mut tailer: JournalTailer, interval: Duration, running: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut reported_missing = false;

    while running.load(Ordering::Relaxed) {
        ticker.tick().await;

        let checkpoint = tailer.checkpoint();
        let joined = tokio::task::spawn_blocking(move || {
            let result = tailer.poll();
            (tailer, result)
        })
        .await;
        let result = match joined {
            Ok((returned, result)) => {
                tailer = returned;
                result
            }
            Err(e) => {
                error!("journal tailer task failed, resuming from last cursor: {e}");
                tailer = checkpoint.restore();
                continue;
            }
        };

        match result {
            Ok(PollOutcome::NoJournal) => {
                if !reported_missing {
                    info!("no journal file yet; waiting for the game");
                    reported_missing = true;
                }
            }
            Ok(PollOutcome::Polled(stats)) => {
                reported_missing = false;
                if stats.lines > 0 {
                    debug!(
                        lines = stats.lines,
                        published = stats.published,
                        malformed = stats.malformed,
                        "journal poll"
                    );
                }
            }
            Err(e) => warn!("journal poll skipped: {e}"),
        }
    }
    debug!("journal tailer stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
