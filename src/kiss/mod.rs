//! # KISS / AX.25 Module
//!
//! Byte-level link to KISS TNCs and modems.
//!
//! This module handles:
//! - KISS framing with FEND/FESC byte stuffing
//! - A streaming decoder that survives split reads and line noise
//! - AX.25 UI frame encoding and decoding
//! - Conversion between AX.25 frames and TNC2 text packets

pub mod ax25;
pub mod decoder;
pub mod encoder;
pub mod protocol;

pub use ax25::{Ax25Address, Ax25Frame};
pub use decoder::KissDecoder;
pub use encoder::encode_data_frame;
pub use protocol::KissFrame;
