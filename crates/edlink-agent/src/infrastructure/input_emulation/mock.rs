//! Mock platform input for tests.
//!
//! Records every key press instead of touching the OS.  The foreground
//! answer is switchable at runtime so tests can exercise the safety gate.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every `press_key` return
//! `EmulationError::Platform`, which exercises the `DispatchFailed` path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use edlink_core::KeyCode;

use crate::application::route_command::{EmulationError, PlatformInput};

/// A recording [`PlatformInput`].
#[derive(Debug, Default)]
pub struct MockPlatformInput {
    /// Every `(key, hold)` passed to `press_key`, in order.
    pub presses: Mutex<Vec<(KeyCode, Duration)>>,
    /// Number of foreground queries.
    pub foreground_queries: Mutex<usize>,
    foreground: AtomicBool,
    pub should_fail: bool,
}

impl MockPlatformInput {
    /// Creates a mock whose game window is in the foreground.
    pub fn focused() -> Self {
        let mock = Self::default();
        mock.set_foreground(true);
        mock
    }

    /// Creates a mock whose game window is in the background.
    pub fn unfocused() -> Self {
        Self::default()
    }

    pub fn set_foreground(&self, focused: bool) {
        self.foreground.store(focused, Ordering::SeqCst);
    }

    pub fn pressed_keys(&self) -> Vec<KeyCode> {
        self.presses
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| *key)
            .collect()
    }
}

impl PlatformInput for MockPlatformInput {
    fn press_key(&self, key: KeyCode, hold: Duration) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.presses.lock().unwrap().push((key, hold));
        Ok(())
    }

    fn is_foreground(&self, _process_name: &str) -> bool {
        *self.foreground_queries.lock().unwrap() += 1;
        self.foreground.load(Ordering::SeqCst)
    }
}
