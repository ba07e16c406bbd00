//! Input adapter for platforms without key injection.
//!
//! The game only runs on Windows.  Elsewhere the agent can still bridge
//! telemetry (e.g. reading a shared journal folder), but it must never
//! claim the game is focused, so the safety gate rejects every command.

use std::time::Duration;

use edlink_core::KeyCode;

use crate::application::route_command::{EmulationError, PlatformInput};

#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessInput;

impl PlatformInput for HeadlessInput {
    fn press_key(&self, _key: KeyCode, _hold: Duration) -> Result<(), EmulationError> {
        Err(EmulationError::Unsupported)
    }

    fn is_foreground(&self, _process_name: &str) -> bool {
        false
    }
}
