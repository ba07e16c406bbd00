//! Thread-safe sequence counter for packet numbering.
//!
//! # What is the sequence number for?
//!
//! Every packet published to the bus carries a monotonically increasing
//! integer in its `seq` field.  Consumers use it to:
//!
//! - **Detect gaps** – if a dashboard sees 41, 42 and 44, packet 43 was lost
//!   (for example evicted from the outbound queue while the broker was down).
//! - **Order packets** – MQTT does not guarantee ordering across topics, so
//!   `seq` is the only process-wide ordering of events.
//!
//! The counter is not persisted.  Every process start begins again at 1, so
//! consumers must tolerate a reset.
//!
//! # Thread safety
//!
//! The journal tailer, the snapshot watchers and the app itself all build
//! packets from different threads.  The counter uses an `AtomicU64`
//! `fetch_add`, so two threads can never observe the same value.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing counter for packet sequence numbers.
///
/// The first call to [`next`](Self::next) returns 1.
///
/// # Examples
///
/// ```rust
/// use edlink_core::packet::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    /// Number of values handed out so far.
    issued: AtomicU64,
}

impl SequenceCounter {
    /// Creates a new counter whose first value is 1.
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
        }
    }

    /// Returns the next sequence number.
    ///
    /// `Ordering::Relaxed` is enough: the value orders packets, it does not
    /// publish any other memory to the thread that reads it.
    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Returns the last value handed out (0 if none yet).
    pub fn current(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
