//! # APRS-IS Client
//!
//! TCP uplink to an APRS-IS server: login, line exchange and reconnects.
//! Received lines go to the router over a bounded channel; lines queued by the
//! dispatcher are written CRLF terminated. The shared [`ConnectionFlag`] tells
//! the dispatcher whether Internet delivery is possible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GatewayError, Result};

/// Software name sent in the login line
pub const PRODUCT: &str = env!("CARGO_PKG_NAME");

/// Software version sent in the login line
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lines longer than this are cut before routing
const MAX_LINE_LEN: usize = 512;

/// Compute the APRS-IS passcode for a callsign.
///
/// The SSID is ignored and the callsign uppercased.
///
/// # Examples
///
/// ```
/// use aprs_gateway::aprsis::compute_passcode;
///
/// assert_eq!(compute_passcode("N0CALL-10"), 13023);
/// ```
#[must_use]
pub fn compute_passcode(callsign: &str) -> u16 {
    let base = callsign.split('-').next().unwrap_or(callsign);
    let upper: Vec<u8> = base.bytes().take(10).map(|b| b.to_ascii_uppercase()).collect();

    let mut hash: u16 = 0x73e2;
    for pair in upper.chunks(2) {
        hash ^= u16::from(pair[0]) << 8;
        if let Some(&low) = pair.get(1) {
            hash ^= u16::from(low);
        }
    }
    hash & 0x7fff
}

/// `user CALL pass CODE vers PRODUCT VERSION[ filter SPEC]\r\n`
#[must_use]
pub fn login_line(callsign: &str, passcode: u16, filter: &str) -> String {
    let mut line = format!("user {} pass {} vers {} {}", callsign, passcode, PRODUCT, VERSION);
    if !filter.is_empty() {
        line.push_str(" filter ");
        line.push_str(filter);
    }
    line.push_str("\r\n");
    line
}

/// Connected state shared between the client task and the dispatcher
#[derive(Debug, Clone, Default)]
pub struct ConnectionFlag(Arc<AtomicBool>);

impl ConnectionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }
}

/// Server and login details
#[derive(Debug, Clone)]
pub struct AprsIsSettings {
    pub host: String,
    pub port: u16,
    pub callsign: String,
    pub passcode: u16,
    pub filter: String,
    pub reconnect_interval: Duration,
}

impl AprsIsSettings {
    /// Log in as the IGate callsign
    pub fn from_config(config: &Config) -> Self {
        let callsign = config.call_for(config.igate.ssid);
        let aprsis = &config.aprsis;
        Self {
            host: aprsis.host.clone(),
            port: aprsis.port,
            passcode: aprsis.passcode.unwrap_or_else(|| compute_passcode(&callsign)),
            callsign,
            filter: aprsis.filter.clone(),
            reconnect_interval: Duration::from_secs(aprsis.reconnect_interval_s),
        }
    }
}

/// Run one logged-in session over `stream` until it fails or the router exits
///
/// Returns `Ok(())` when either router channel closes.
pub async fn session<S>(
    stream: S,
    settings: &AprsIsSettings,
    inbound: &mpsc::Sender<String>,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
    connected: &ConnectionFlag,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(login_line(&settings.callsign, settings.passcode, &settings.filter).as_bytes())
        .await?;
    connected.set(true);
    info!("APRS-IS connected to {}:{} as {}", settings.host, settings.port, settings.callsign);

    let result = exchange(&mut reader, &mut write_half, inbound, outbound).await;
    connected.set(false);
    result
}

async fn exchange<R, W>(
    reader: &mut R,
    writer: &mut W,
    inbound: &mpsc::Sender<String>,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
) -> Result<()>
where
    R: AsyncBufReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_LINE_LEN);

    loop {
        tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => {
                if read? == 0 {
                    return Err(GatewayError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "APRS-IS server closed the connection",
                    )));
                }
                buf.truncate(MAX_LINE_LEN);
                let line = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
                buf.clear();
                if line.is_empty() {
                    continue;
                }
                if line.starts_with("# logresp") {
                    info!("APRS-IS: {}", line);
                }
                if let Err(e) = inbound.try_send(line) {
                    if inbound.is_closed() {
                        return Ok(());
                    }
                    debug!("APRS-IS inbound channel full, dropped: {}", e.into_inner());
                }
            }
            frame = outbound.recv() => {
                let Some(mut frame) = frame else {
                    return Ok(());
                };
                frame.extend_from_slice(b"\r\n");
                writer.write_all(&frame).await?;
                writer.flush().await?;
            }
        }
    }
}

/// Client task: connect, log in, exchange lines, reconnect after failures
pub async fn run(
    settings: AprsIsSettings,
    inbound: mpsc::Sender<String>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    connected: ConnectionFlag,
) {
    loop {
        match TcpStream::connect((settings.host.as_str(), settings.port)).await {
            Ok(stream) => match session(stream, &settings, &inbound, &mut outbound, &connected).await {
                Ok(()) => {
                    info!("APRS-IS client stopped");
                    return;
                }
                Err(e) => warn!("APRS-IS connection lost: {}", e),
            },
            Err(e) => warn!(
                "APRS-IS connection to {}:{} failed: {}, retrying in {}s",
                settings.host,
                settings.port,
                e,
                settings.reconnect_interval.as_secs()
            ),
        }

        tokio::time::sleep(settings.reconnect_interval).await;
        while outbound.try_recv().is_ok() {}
        if inbound.is_closed() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn settings(port: u16) -> AprsIsSettings {
        AprsIsSettings {
            host: "127.0.0.1".to_string(),
            port,
            callsign: "MYCALL-10".to_string(),
            passcode: compute_passcode("MYCALL-10"),
            filter: "m/10".to_string(),
            reconnect_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_compute_passcode() {
        assert_eq!(compute_passcode("N0CALL"), 13023);
        assert_eq!(compute_passcode("MYCALL-10"), 12726);
        assert_eq!(compute_passcode("mycall"), 12726, "case insensitive");
    }

    #[test]
    fn test_login_line() {
        let line = login_line("MYCALL-10", 12726, "m/10");
        assert_eq!(line, format!("user MYCALL-10 pass 12726 vers aprs-gateway {} filter m/10\r\n", VERSION));

        let line = login_line("MYCALL-10", 12726, "");
        assert!(line.ends_with(&format!("vers aprs-gateway {}\r\n", VERSION)));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.station.callsign = "MYCALL".to_string();
        let settings = AprsIsSettings::from_config(&config);
        assert_eq!(settings.callsign, "MYCALL-10");
        assert_eq!(settings.passcode, 12726);
        assert_eq!(settings.port, 14580);

        config.aprsis.passcode = Some(22222);
        assert_eq!(AprsIsSettings::from_config(&config).passcode, 22222);
    }

    #[test]
    fn test_connection_flag() {
        let flag = ConnectionFlag::new();
        let shared = flag.clone();
        assert!(!flag.is_connected());
        shared.set(true);
        assert!(flag.is_connected());
    }

    #[tokio::test]
    async fn test_session_login_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = tokio::io::BufReader::new(read_half).lines();

            let login = lines.next_line().await.unwrap().unwrap();
            write_half
                .write_all(b"# logresp MYCALL-10 verified, server T2TEST\r\nN0CALL-9>APRS,TCPIP*,qAC,T2TEST:>hi\r\n")
                .await
                .unwrap();
            let uplinked = lines.next_line().await.unwrap().unwrap();
            (login, uplinked)
        });

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (in_tx, mut in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        out_tx.send(b"N0CALL-7>APRS,qAR,MYCALL-10:>from rf".to_vec()).await.unwrap();
        let connected = ConnectionFlag::new();

        let result = session(stream, &settings(port), &in_tx, &mut out_rx, &connected).await;
        assert!(result.is_err(), "server hangs up");
        assert!(!connected.is_connected());

        let (login, uplinked) = server.await.unwrap();
        assert_eq!(login, format!("user MYCALL-10 pass 12726 vers aprs-gateway {} filter m/10", VERSION));
        assert_eq!(uplinked, "N0CALL-7>APRS,qAR,MYCALL-10:>from rf");

        assert_eq!(in_rx.try_recv().unwrap(), "# logresp MYCALL-10 verified, server T2TEST");
        assert_eq!(in_rx.try_recv().unwrap(), "N0CALL-9>APRS,TCPIP*,qAC,T2TEST:>hi");
    }

    #[tokio::test]
    async fn test_session_ends_when_router_exits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // hold the socket open until the client leaves
            let mut lines = tokio::io::BufReader::new(socket).lines();
            while let Ok(Some(_)) = lines.next_line().await {}
        });

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (in_tx, _in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(8);
        drop(out_tx);

        let connected = ConnectionFlag::new();
        let result = session(stream, &settings(port), &in_tx, &mut out_rx, &connected).await;
        assert!(result.is_ok());
        assert!(!connected.is_connected());
        server.abort();
    }
}
