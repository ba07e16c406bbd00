//! Inbound command keymap.
//!
//! Commands arrive on MQTT topics such as `elite/cmd/lights`.  The keymap
//! maps each full topic string to the key that should be pressed in the game:
//!
//! ```toml
//! [keymap]
//! "elite/cmd/lights" = "l"
//! "elite/cmd/gear"   = "g"
//! ```
//!
//! Key names are validated when the keymap is built, so the command router
//! only ever sees keys the platform layer knows how to inject.

pub mod key;
pub mod table;

pub use key::KeyCode;
pub use table::{Keymap, KeymapError};
