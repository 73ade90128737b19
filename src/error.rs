//! # Error Types
//!
//! Custom error types for the APRS gateway using `thiserror`.

use thiserror::Error;

/// Main error type for the APRS gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Packet text or bytes that do not form a usable APRS/AX.25 frame
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Every transmit queue slot is active
    #[error("Transmit queue full")]
    QueueFull,

    /// KISS framing errors
    #[error("KISS framing error: {0}")]
    Kiss(String),

    /// A delivery channel cannot take a frame right now
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(&'static str),

    /// Mic-E encoder precondition violated
    #[error("Mic-E encoding error: {0}")]
    MicE(String),
}

/// Result type alias for the APRS gateway
pub type Result<T> = std::result::Result<T, GatewayError>;
