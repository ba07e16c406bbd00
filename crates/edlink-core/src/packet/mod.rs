//! Packet envelope and sequence numbering.

pub mod envelope;
pub mod sequence;

pub use envelope::{Packet, PacketBuilder, PacketError, PacketSource};
pub use sequence::SequenceCounter;
