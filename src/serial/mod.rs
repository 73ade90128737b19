//! # Serial Communication Module
//!
//! Serial links to the KISS modem carrying RF and to the local TNC.
//!
//! This module handles:
//! - Opening a serial port at the configured baud rate (8N1)
//! - KISS or TNC2 text framing in both directions
//! - Forwarding received packets to the router without blocking
//! - Reconnecting after the device goes away

pub mod framing;
pub mod port_trait;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

pub use framing::{FrameDecoder, Framing, LineDecoder};
use port_trait::{SerialPortIO, TokioSerialPort};

use crate::aprs::Tnc2Packet;
use crate::error::{GatewayError, Result};

/// Bytes requested per read
const READ_CHUNK: usize = 512;

/// Where and how to open a link
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Name used in log lines ("modem", "tnc")
    pub name: &'static str,
    pub port: String,
    pub baud_rate: u32,
    pub framing: Framing,
    pub reconnect_interval: Duration,
}

/// An open serial link with its framing
pub struct SerialLink<P: SerialPortIO = TokioSerialPort> {
    port: P,
    device_path: String,
    framing: Framing,
    decoder: FrameDecoder,
}

impl<P: SerialPortIO> std::fmt::Debug for SerialLink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .field("framing", &self.framing)
            .finish_non_exhaustive()
    }
}

impl SerialLink<TokioSerialPort> {
    /// Open the first device in `paths` that opens
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aprs_gateway::serial::{Framing, SerialLink};
    ///
    /// let link = SerialLink::open_with_paths(&["/dev/ttyUSB0"], 9600, Framing::Kiss)?;
    /// println!("Connected to: {}", link.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, framing: Framing) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened {} at {} baud ({:?})", path, baud_rate, framing);
                    return Ok(Self::new(TokioSerialPort::new(port), path, framing));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(GatewayError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| GatewayError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: SerialPortIO> SerialLink<P> {
    /// Wrap an already open port
    pub fn new(port: P, device_path: &str, framing: Framing) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
            framing,
            decoder: FrameDecoder::new(framing),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Send one TNC2 packet in the link's framing
    ///
    /// # Errors
    ///
    /// Returns `MalformedPacket` for frames that cannot be encoded, and
    /// `Serial` if the write fails
    pub async fn send_packet(&mut self, frame: &[u8]) -> Result<()> {
        let bytes = self.framing.encode(frame)?;

        self.port
            .write_all(&bytes)
            .await
            .map_err(|e| GatewayError::Serial(format!("Failed to write packet: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| GatewayError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent {} bytes to {}", bytes.len(), self.device_path);
        Ok(())
    }

    /// Wait for bytes and return the packets they complete (possibly none)
    ///
    /// # Errors
    ///
    /// Returns `Serial` on read failure or when the device closes
    pub async fn receive(&mut self) -> Result<Vec<Tnc2Packet>> {
        let mut buf = [0u8; READ_CHUNK];
        let n = self
            .port
            .read(&mut buf)
            .await
            .map_err(|e| GatewayError::Serial(format!("Failed to read {}: {}", self.device_path, e)))?;
        if n == 0 {
            return Err(GatewayError::Serial(format!("{} closed", self.device_path)));
        }
        Ok(self.decoder.push(&buf[..n]))
    }
}

/// Pump packets between an open link and the router
///
/// Returns `Ok(())` when the router side hangs up, or the link error that
/// ended the session.
pub async fn serve<P: SerialPortIO>(
    link: &mut SerialLink<P>,
    name: &str,
    inbound: &mpsc::Sender<Tnc2Packet>,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
) -> Result<()> {
    loop {
        tokio::select! {
            received = link.receive() => {
                for packet in received? {
                    debug!("{} RX: {}", name, packet);
                    if inbound.try_send(packet).is_err() {
                        if inbound.is_closed() {
                            return Ok(());
                        }
                        debug!("{} inbound channel full, packet dropped", name);
                    }
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return Ok(());
                };
                match link.send_packet(&frame).await {
                    Ok(()) => {}
                    Err(GatewayError::MalformedPacket(e)) => warn!("{} cannot send {}", name, e),
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

/// Link task: open, serve, and reopen after errors until the router exits
pub async fn run(settings: LinkSettings, inbound: mpsc::Sender<Tnc2Packet>, mut outbound: mpsc::Receiver<Vec<u8>>) {
    info!("{} link on {} ({:?})", settings.name, settings.port, settings.framing);

    loop {
        match SerialLink::open_with_paths(&[settings.port.as_str()], settings.baud_rate, settings.framing) {
            Ok(mut link) => match serve(&mut link, settings.name, &inbound, &mut outbound).await {
                Ok(()) => {
                    info!("{} link stopped", settings.name);
                    return;
                }
                Err(e) => warn!("{} link lost: {}", settings.name, e),
            },
            Err(e) => debug!("{} unavailable: {}", settings.name, e),
        }

        tokio::time::sleep(settings.reconnect_interval).await;

        let mut discarded = 0;
        while outbound.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("{} discarded {} frames while disconnected", settings.name, discarded);
        }
        if inbound.is_closed() {
            return;
        }
    }
}
