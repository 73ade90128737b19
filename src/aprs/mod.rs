//! # APRS Packet Layer
//!
//! Packet classification and the TNC2 text model.

pub mod classify;
pub mod packet;

pub use classify::{classify, PacketKind};
pub use packet::{parse_internet_line, PathEntry, Tnc2Packet};
