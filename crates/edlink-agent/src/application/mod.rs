//! Application layer use cases for the agent.
//!
//! - **`tail_journal`** – Follows the newest journal file with a byte cursor,
//!   publishes watched events and tracks the ship loadout.
//!
//! - **`watch_snapshots`** – Re-reads `Status.json` / `ModulesInfo.json` on
//!   change and publishes only genuine changes.
//!
//! - **`publish_queue`** – Bounded drop-oldest queue shared by all producers,
//!   plus the dispatch loop that drains it into a `BusTransport`.
//!
//! - **`route_command`** – Safety-gated, rate-limited mapping of inbound
//!   command topics to key presses through a `PlatformInput`.
//!
//! Use cases depend only on traits and `edlink_core` types; the concrete
//! adapters are injected from `main`.

pub mod publish_queue;
pub mod route_command;
pub mod tail_journal;
pub mod watch_snapshots;
