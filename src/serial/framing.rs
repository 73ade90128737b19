//! Wire formats spoken on serial links.

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::aprs::Tnc2Packet;
use crate::config::TncMode;
use crate::error::{GatewayError, Result};
use crate::kiss::{encode_data_frame, Ax25Frame, KissDecoder};

/// Longest TNC2 text line accepted
pub const MAX_LINE_LEN: usize = 512;

/// Serial link wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// KISS data frames carrying AX.25 UI frames
    Kiss,
    /// CRLF terminated TNC2 text
    Tnc2,
}

impl Framing {
    /// Framing for the local TNC, `None` when it is switched off
    pub fn for_tnc(mode: TncMode) -> Option<Self> {
        match mode {
            TncMode::Off => None,
            TncMode::Kiss => Some(Self::Kiss),
            TncMode::Tnc2 => Some(Self::Tnc2),
        }
    }

    /// Bytes to write for one TNC2 packet
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a packet, or cannot be carried in AX.25
    pub fn encode(&self, frame: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Kiss => {
                let packet = Tnc2Packet::parse(frame)
                    .ok_or_else(|| GatewayError::MalformedPacket(String::from_utf8_lossy(frame).into_owned()))?;
                Ok(encode_data_frame(&Ax25Frame::from_tnc2(&packet)?.encode()))
            }
            Self::Tnc2 => {
                let mut out = Vec::with_capacity(frame.len() + 2);
                out.extend_from_slice(frame);
                out.extend_from_slice(b"\r\n");
                Ok(out)
            }
        }
    }
}

/// Splits a byte stream into text lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: BytesMut,
    overflow: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning each completed non-empty line without CR/LF
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &b in bytes {
            match b {
                b'\n' => {
                    let line = self.buf.split();
                    if !self.overflow && !line.is_empty() {
                        lines.push(line.to_vec());
                    }
                    self.overflow = false;
                }
                b'\r' => {}
                _ if self.overflow => {}
                _ => {
                    self.buf.put_u8(b);
                    if self.buf.len() > MAX_LINE_LEN {
                        debug!("TNC2 line exceeds {} bytes, dropped", MAX_LINE_LEN);
                        self.buf.clear();
                        self.overflow = true;
                    }
                }
            }
        }
        lines
    }
}

/// Inbound decoder for either framing
#[derive(Debug)]
pub enum FrameDecoder {
    Kiss(KissDecoder),
    Tnc2(LineDecoder),
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        match framing {
            Framing::Kiss => Self::Kiss(KissDecoder::new()),
            Framing::Tnc2 => Self::Tnc2(LineDecoder::new()),
        }
    }

    /// Feed bytes, returning the packets they complete
    ///
    /// Non-data KISS frames and anything that does not decode are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Tnc2Packet> {
        match self {
            Self::Kiss(decoder) => decoder
                .push(bytes)
                .into_iter()
                .filter(|frame| frame.is_data())
                .filter_map(|frame| match Ax25Frame::decode(&frame.data) {
                    Ok(ax25) => Some(ax25.to_tnc2()),
                    Err(e) => {
                        debug!("Skipping undecodable frame: {}", e);
                        None
                    }
                })
                .collect(),
            Self::Tnc2(decoder) => decoder
                .push(bytes)
                .into_iter()
                .filter_map(|line| {
                    let packet = Tnc2Packet::parse(&line);
                    if packet.is_none() {
                        debug!("Skipping TNC2 line: {}", String::from_utf8_lossy(&line));
                    }
                    packet
                })
                .collect(),
        }
    }
}
