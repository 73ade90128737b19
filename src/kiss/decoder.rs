//! # KISS Decoder
//!
//! Streaming decoder for bytes read from a KISS TNC. Reads may split frames
//! anywhere; bytes outside a frame and frames with bad escapes are discarded.

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use super::protocol::*;
use crate::error::{GatewayError, Result};

/// Undo KISS byte stuffing on a complete frame body
///
/// # Errors
///
/// Returns error on FESC followed by anything other than TFEND/TFESC, or a
/// trailing FESC
pub fn unescape(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter();
    while let Some(&b) = bytes.next() {
        if b != FESC {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(&TFEND) => out.push(FEND),
            Some(&TFESC) => out.push(FESC),
            Some(&other) => {
                return Err(GatewayError::Kiss(format!("Invalid escape sequence: 0xDB 0x{:02X}", other)));
            }
            None => return Err(GatewayError::Kiss("Trailing escape byte".to_string())),
        }
    }
    Ok(out)
}

/// Incremental KISS frame decoder
#[derive(Debug)]
pub struct KissDecoder {
    buf: BytesMut,
    in_frame: bool,
    escaped: bool,
    discarded: u64,
}

impl Default for KissDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KissDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            in_frame: false,
            escaped: false,
            discarded: 0,
        }
    }

    /// Frames dropped for bad escapes or excessive length
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Feed bytes from the TNC, returning every frame they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<KissFrame> {
        let mut frames = Vec::new();

        for &b in bytes {
            if b == FEND {
                if self.in_frame && !self.buf.is_empty() {
                    frames.push(self.finish());
                }
                self.buf.clear();
                self.in_frame = true;
                self.escaped = false;
                continue;
            }

            if !self.in_frame {
                continue;
            }

            if self.escaped {
                self.escaped = false;
                match b {
                    TFEND => self.buf.put_u8(FEND),
                    TFESC => self.buf.put_u8(FESC),
                    other => {
                        debug!("KISS: invalid escape 0x{:02X}, frame dropped", other);
                        self.abandon();
                        continue;
                    }
                }
            } else if b == FESC {
                self.escaped = true;
            } else {
                self.buf.put_u8(b);
            }

            // type byte + contents
            if self.buf.len() > MAX_FRAME_SIZE + 1 {
                debug!("KISS: frame exceeds {} bytes, dropped", MAX_FRAME_SIZE);
                self.abandon();
            }
        }

        frames
    }

    /// Caller guarantees at least the type byte is buffered
    fn finish(&mut self) -> KissFrame {
        let mut raw = self.buf.split();
        let type_byte = raw.get_u8();
        KissFrame {
            port: type_byte >> 4,
            command: type_byte & 0x0F,
            data: raw.to_vec(),
        }
    }

    /// Drop the partial frame and wait for the next FEND
    fn abandon(&mut self) {
        self.buf.clear();
        self.in_frame = false;
        self.escaped = false;
        self.discarded += 1;
    }
}
