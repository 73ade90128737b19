//! # APRS Gateway
//!
//! IGate, digipeater, tracker and weather station on top of a KISS modem,
//! an APRS-IS connection and an optional local TNC.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use aprs_gateway::aprs::Tnc2Packet;
use aprs_gateway::aprsis::{self, AprsIsSettings, ConnectionFlag};
use aprs_gateway::bridge::ChannelBridge;
use aprs_gateway::clock::Clock;
use aprs_gateway::config::{Config, LogConfig};
use aprs_gateway::router::Router;
use aprs_gateway::serial::{self, Framing, LinkSettings};
use aprs_gateway::station::SignalReport;

/// Dispatcher granularity
const TICK_MS: u64 = 10;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the APRS gateway
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load and validate the configuration
///    - Set up logging (console, plus daily files when `[log] dir` is set)
///    - Spawn the APRS-IS client, modem link and local TNC link
///
/// 2. **Main Loop**
///    - Run the dispatcher and beacon timers every 10 ms
///    - Route RF frames, APRS-IS lines and local TNC frames as they arrive
///    - Log a JSON status report every `[log] status_interval_s`
///
/// 3. **Graceful Shutdown** on Ctrl+C
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;
    let _log_guard = init_logging(&config.log);

    info!("APRS Gateway v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Station {} ({})", config.station.callsign, config_path);

    let started = Instant::now();
    let depth = config.tables.channel_depth;
    let connected = ConnectionFlag::new();
    let mut bridge = ChannelBridge::new(connected.clone());

    // Inbound senders stay alive here so disabled sources simply never yield
    let (rf_tx, mut rf_rx) = mpsc::channel::<Tnc2Packet>(depth);
    let (inet_tx, mut inet_rx) = mpsc::channel::<String>(depth);
    let (tnc_tx, mut tnc_rx) = mpsc::channel::<Tnc2Packet>(depth);

    if config.aprsis.enabled {
        let (out_tx, out_rx) = mpsc::channel(depth);
        bridge.internet = Some(out_tx);
        let settings = AprsIsSettings::from_config(&config);
        info!("APRS-IS uplink to {}:{} as {}", settings.host, settings.port, settings.callsign);
        tokio::spawn(aprsis::run(settings, inet_tx.clone(), out_rx, connected.clone()));
    }

    if config.modem.enabled {
        let (out_tx, out_rx) = mpsc::channel(depth);
        bridge.rf = Some(out_tx);
        let settings = LinkSettings {
            name: "modem",
            port: config.modem.port.clone(),
            baud_rate: config.modem.baud_rate,
            framing: Framing::Kiss,
            reconnect_interval: Duration::from_millis(config.modem.reconnect_interval_ms),
        };
        tokio::spawn(serial::run(settings, rf_tx.clone(), out_rx));
    } else {
        warn!("RF modem disabled, RF frames will be dropped");
    }

    if let Some(framing) = Framing::for_tnc(config.tnc.mode) {
        let (out_tx, out_rx) = mpsc::channel(depth);
        bridge.tnc = Some(out_tx);
        let settings = LinkSettings {
            name: "tnc",
            port: config.tnc.port.clone(),
            baud_rate: config.tnc.baud_rate,
            framing,
            reconnect_interval: Duration::from_millis(config.tnc.reconnect_interval_ms),
        };
        tokio::spawn(serial::run(settings, tnc_tx.clone(), out_rx));
    }

    let mut router = Router::new(config.clone());

    let mut tick = interval(Duration::from_millis(TICK_MS));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut arrival_tick = interval(Duration::from_secs(1));
    let mut status_tick = interval(Duration::from_secs(config.log.status_interval_s));

    info!("Routing started, press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let report = router.tick(Clock::now(started), &mut bridge);
                if report.errors > 0 {
                    debug!("Dispatch: {} delivery errors", report.errors);
                }
            }

            Some(packet) = rf_rx.recv() => {
                router.handle_rf(&packet, SignalReport::default(), Clock::now(started));
            }

            Some(line) = inet_rx.recv() => {
                router.handle_internet_line(&line, Clock::now(started));
            }

            Some(packet) = tnc_rx.recv() => {
                router.handle_tnc_frame(&packet, Clock::now(started));
            }

            _ = arrival_tick.tick() => {
                if router.poll_new_arrival() == Some(true) {
                    debug!("New station heard, {} in table", router.stations().with(|table| table.len()));
                }
            }

            _ = status_tick.tick() => {
                let report = router.status_report(Clock::now(started), connected.is_connected());
                info!(target: "aprs_gateway::status", "{}", report.to_json());
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let stats = router.stats();
    info!(
        "Totals: rx rf={} inet={}, tx rf={} inet={} tnc={}, digi={}, dropped={}",
        stats.rf_rx, stats.inet_rx, stats.tx_rf, stats.tx_inet, stats.tx_tnc, stats.digi, stats.dropped
    );

    // hang up the link tasks before the runtime shuts down
    drop((rf_tx, inet_tx, tnc_tx, bridge));
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::load(path).with_context(|| format!("Failed to load {}", path))
    } else {
        eprintln!("{} not found, using built-in defaults", path);
        Ok(Config::default())
    }
}

/// Console logging, plus a daily rotated file when configured
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_tick_constant() {
        assert_eq!(TICK_MS, 10, "Dispatcher runs every 10ms");
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config("/nonexistent/aprs-gateway.toml").unwrap();
        assert_eq!(config.station.callsign, "N0CALL");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[station]\ncallsign = \"TOOLONGCALL\"").unwrap();
        assert!(load_config(file.path().to_str().unwrap()).is_err());
    }
}
