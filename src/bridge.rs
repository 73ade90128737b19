//! Dispatcher endpoints backed by the link tasks' channels.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::aprsis::ConnectionFlag;
use crate::error::{GatewayError, Result};
use crate::queue::ChannelSink;

/// Hands dispatched frames to the APRS-IS, modem and TNC tasks.
///
/// A missing or full channel is reported as
/// [`GatewayError::ChannelUnavailable`]; the frame is not retried.
#[derive(Debug, Default)]
pub struct ChannelBridge {
    pub internet: Option<mpsc::Sender<Vec<u8>>>,
    pub rf: Option<mpsc::Sender<Vec<u8>>>,
    pub tnc: Option<mpsc::Sender<Vec<u8>>>,
    pub connected: ConnectionFlag,
}

impl ChannelBridge {
    pub fn new(connected: ConnectionFlag) -> Self {
        Self {
            connected,
            ..Self::default()
        }
    }
}

fn forward(channel: &Option<mpsc::Sender<Vec<u8>>>, name: &'static str, payload: &[u8]) -> Result<()> {
    let Some(tx) = channel else {
        return Err(GatewayError::ChannelUnavailable(name));
    };
    match tx.try_send(payload.to_vec()) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            debug!("{} channel full", name);
            Err(GatewayError::ChannelUnavailable(name))
        }
        Err(TrySendError::Closed(_)) => Err(GatewayError::ChannelUnavailable(name)),
    }
}

impl ChannelSink for ChannelBridge {
    fn internet_connected(&self) -> bool {
        self.internet.is_some() && self.connected.is_connected()
    }

    fn send_internet(&mut self, payload: &[u8]) -> Result<()> {
        forward(&self.internet, "aprs-is", payload)
    }

    fn send_rf(&mut self, payload: &[u8]) -> Result<()> {
        forward(&self.rf, "rf modem", payload)
    }

    fn send_tnc(&mut self, payload: &[u8]) -> Result<()> {
        forward(&self.tnc, "local tnc", payload)
    }
}
