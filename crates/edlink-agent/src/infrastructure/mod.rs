//! Infrastructure layer for the agent.
//!
//! Contains OS-facing adapters.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `edlink_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`input_emulation`** – `PlatformInput` implementations.  Windows uses
//!   `SendInput` and the foreground window's process name; every other
//!   platform gets a headless implementation that rejects all commands.
//!
//! - **`file_watcher`** – Non-recursive directory notifications via `notify`.
//!
//! - **`bus`** – MQTT transport (`rumqttc`): outbound `BusTransport` and the
//!   inbound event loop feeding the command router.
//!
//! - **`storage`** – `config.toml` and `keymap.toml` loading.

pub mod bus;
pub mod file_watcher;
pub mod input_emulation;
pub mod storage;
