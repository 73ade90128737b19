//! # KISS Protocol Constants and Types

use crate::error::{GatewayError, Result};

/// Frame end
pub const FEND: u8 = 0xC0;

/// Frame escape
pub const FESC: u8 = 0xDB;

/// Transposed frame end (follows FESC)
pub const TFEND: u8 = 0xDC;

/// Transposed frame escape (follows FESC)
pub const TFESC: u8 = 0xDD;

/// Data frame command (low nibble of the type byte)
pub const CMD_DATA: u8 = 0x00;

/// Return from KISS mode; sent as a bare type byte
pub const CMD_RETURN: u8 = 0xFF;

/// Highest KISS port number (high nibble of the type byte)
pub const MAX_PORT: u8 = 0x0F;

/// Largest unescaped frame accepted from a TNC
///
/// AX.25 UI frames with eight repeaters and a 256 byte info field stay well
/// below this.
pub const MAX_FRAME_SIZE: usize = 1024;

/// One KISS frame after unescaping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    /// TNC port (0-15)
    pub port: u8,

    /// Command nibble
    pub command: u8,

    /// Frame contents, usually an AX.25 frame
    pub data: Vec<u8>,
}

impl KissFrame {
    /// Create a new KISS frame
    ///
    /// # Errors
    ///
    /// Returns error if `port` is above 15, `command` does not fit a nibble,
    /// or `data` exceeds [`MAX_FRAME_SIZE`]
    pub fn new(port: u8, command: u8, data: Vec<u8>) -> Result<Self> {
        if port > MAX_PORT || command > 0x0F {
            return Err(GatewayError::Kiss(format!(
                "Invalid type byte: port {} command {}",
                port, command
            )));
        }
        if data.len() > MAX_FRAME_SIZE {
            return Err(GatewayError::Kiss(format!(
                "Frame size {} exceeds maximum {}",
                data.len(),
                MAX_FRAME_SIZE
            )));
        }
        Ok(Self { port, command, data })
    }

    /// Data frame on port 0
    pub fn data(data: Vec<u8>) -> Result<Self> {
        Self::new(0, CMD_DATA, data)
    }

    /// Type byte: port in the high nibble, command in the low nibble
    pub fn type_byte(&self) -> u8 {
        (self.port << 4) | (self.command & 0x0F)
    }

    pub fn is_data(&self) -> bool {
        self.command == CMD_DATA
    }
}
