//! Platform-specific `PlatformInput` implementations.
//!
//! The correct implementation is selected at compile time via
//! `#[cfg(target_os = ...)]`; [`platform_input`] returns it.

use std::sync::Arc;

use crate::application::route_command::PlatformInput;

pub mod headless;
pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Returns the input adapter for the compile target.
pub fn platform_input() -> Arc<dyn PlatformInput> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::WindowsInput::new())
    }

    #[cfg(not(target_os = "windows"))]
    {
        tracing::warn!("key injection is only supported on Windows; inbound commands will be rejected");
        Arc::new(headless::HeadlessInput)
    }
}
