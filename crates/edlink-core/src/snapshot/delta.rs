//! Generic "compare to last emitted state, emit only on change" tracker.
//!
//! ```text
//!   observe(v)   stored == None      → Baseline   (store v, publish)
//!                stored == Some(v)   → Unchanged  (nothing)
//!                stored == Some(p≠v) → Changed    (store v, publish)
//! ```
//!
//! Consumers always receive the complete new value, never a field diff.  The
//! previous value is handed back with [`Observation::Changed`] so callers can
//! log per-field transitions before publishing.

/// Result of feeding a freshly computed snapshot to a [`DeltaTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// First value ever observed for this source.
    Baseline,
    /// The value differs from the stored one; `previous` is the replaced value.
    Changed { previous: T },
    /// The value equals the stored one.
    Unchanged,
}

impl<T> Observation<T> {
    /// Returns `true` when the observed value must be published.
    pub fn should_publish(&self) -> bool {
        !matches!(self, Observation::Unchanged)
    }
}

/// Holds the last emitted value of one snapshot source.
///
/// The tracker is owned by the loop that drives its source, so it needs no
/// synchronisation.
#[derive(Debug, Clone)]
pub struct DeltaTracker<T> {
    last: Option<T>,
}

impl<T> Default for DeltaTracker<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: PartialEq> DeltaTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `next` with the stored value and stores it if it differs.
    pub fn observe(&mut self, next: T) -> Observation<T> {
        match self.last.take() {
            None => {
                self.last = Some(next);
                Observation::Baseline
            }
            Some(previous) if previous == next => {
                self.last = Some(previous);
                Observation::Unchanged
            }
            Some(previous) => {
                self.last = Some(next);
                Observation::Changed { previous }
            }
        }
    }

    /// Returns the last emitted value, if any.
    pub fn current(&self) -> Option<&T> {
        self.last.as_ref()
    }
}
