//! edlink-agent library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the agent do?
//!
//! Elite Dangerous keeps a set of telemetry files in the player's
//! `Saved Games` folder.  The agent:
//!
//! 1. Tails the newest `Journal.*.log` file and publishes interesting events.
//! 2. Watches `Status.json` and `ModulesInfo.json` and publishes them when
//!    their content actually changes.
//! 3. Pushes every packet through a bounded queue to an MQTT broker.
//! 4. Subscribes to `<base>/cmd/#` and turns mapped command topics into key
//!    presses, but only while the game window has focus.

/// Application layer: use cases for the agent.
pub mod application;

/// Infrastructure layer: OS input, filesystem notifications, MQTT, storage.
pub mod infrastructure;
