//! Configuration and keymap persistence.
//!
//! - **`config`** – `config.toml`: typed schema with serde defaults and
//!   environment overrides.
//! - **`keymap`** – `keymap.toml`: topic → key entries, reloaded on change.

pub mod config;
pub mod keymap;
