//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file yields the factory settings.
//! Filter fields are bit sets of the `FILTER_*` constants in
//! [`crate::aprs::classify`]; `path` fields index the fixed path table in
//! [`crate::router::path_for_index`].

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::aprs::classify::{
    FILTER_ALL, FILTER_ITEM, FILTER_MESSAGE, FILTER_MIC_E, FILTER_OBJECT, FILTER_POSITION, FILTER_STATUS,
    FILTER_TELEMETRY, FILTER_WEATHER,
};
use crate::aprs::packet::with_ssid;
use crate::error::{GatewayError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub igate: IgateConfig,

    #[serde(default)]
    pub digi: DigiConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub aprsis: AprsIsConfig,

    #[serde(default)]
    pub modem: ModemConfig,

    #[serde(default)]
    pub tnc: TncConfig,

    #[serde(default)]
    pub tables: TableConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Station identity and fixed position
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    /// Base callsign without SSID
    #[serde(default = "default_callsign")]
    pub callsign: String,

    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,

    /// Altitude in meters
    #[serde(default)]
    pub altitude_m: f64,

    /// Destination address of locally generated packets
    #[serde(default = "default_tocall")]
    pub tocall: String,
}

/// How position beacons are encoded
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PositionFormat {
    Uncompressed,
    Compressed,
    MicE,
}

/// Beacon settings shared by every role
#[derive(Debug, Deserialize, Clone)]
pub struct BeaconConfig {
    /// Position beacon interval, 0 disables
    #[serde(default = "default_position_interval_s")]
    pub position_interval_s: u64,

    /// Status beacon interval, 0 disables
    #[serde(default)]
    pub status_interval_s: u64,

    #[serde(default = "default_true")]
    pub rf: bool,

    #[serde(default = "default_true")]
    pub inet: bool,

    #[serde(default = "default_beacon_path")]
    pub path: usize,

    #[serde(default = "default_symbol_table")]
    pub symbol_table: char,

    #[serde(default = "default_symbol")]
    pub symbol: char,

    #[serde(default = "default_position_format")]
    pub format: PositionFormat,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub status: String,
}

/// Internet gateway role
#[derive(Debug, Deserialize, Clone)]
pub struct IgateConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_igate_ssid")]
    pub ssid: u8,

    #[serde(default = "default_true")]
    pub rf2inet: bool,

    #[serde(default)]
    pub inet2rf: bool,

    #[serde(default = "default_rf2inet_filter")]
    pub rf2inet_filter: u16,

    #[serde(default = "default_inet2rf_filter")]
    pub inet2rf_filter: u16,

    /// Path index for third-party frames sent to RF
    #[serde(default = "default_inet2rf_path")]
    pub inet2rf_path: usize,

    /// Statistics telemetry interval, 0 disables
    #[serde(default)]
    pub telemetry_interval_s: u64,

    /// Append Base-91 statistics to the position comment
    #[serde(default)]
    pub telemetry_in_comment: bool,

    #[serde(default = "default_igate_beacon")]
    pub beacon: BeaconConfig,
}

/// Digipeater role
#[derive(Debug, Deserialize, Clone)]
pub struct DigiConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub ssid: u8,

    #[serde(default = "default_digi_filter")]
    pub filter: u16,

    /// Upper bound of the random repeat delay
    #[serde(default = "default_digi_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_digi_beacon")]
    pub beacon: BeaconConfig,
}

/// SmartBeaconing thresholds
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SmartBeaconConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_high_speed_kmh")]
    pub high_speed_kmh: f64,

    #[serde(default = "default_low_speed_kmh")]
    pub low_speed_kmh: f64,

    /// Interval at or above the high speed threshold
    #[serde(default = "default_max_interval_s")]
    pub max_interval_s: u64,

    /// Shortest interval allowed after a turn
    #[serde(default = "default_min_interval_s")]
    pub min_interval_s: u64,

    /// Interval at or below the low speed threshold
    #[serde(default = "default_slow_interval_s")]
    pub slow_interval_s: u64,

    /// Heading change that counts as a turn
    #[serde(default = "default_min_angle_deg")]
    pub min_angle_deg: f64,
}

/// Tracker role
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_tracker_ssid")]
    pub ssid: u8,

    /// Mic-E message bits (7 = off duty, 0 = emergency)
    #[serde(default = "default_mic_e_message")]
    pub mic_e_message: u8,

    #[serde(default = "default_tracker_beacon")]
    pub beacon: BeaconConfig,

    #[serde(default)]
    pub smartbeacon: SmartBeaconConfig,
}

/// Weather station role
#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_weather_ssid")]
    pub ssid: u8,

    #[serde(default = "default_weather_beacon")]
    pub beacon: BeaconConfig,
}

/// APRS-IS uplink
#[derive(Debug, Deserialize, Clone)]
pub struct AprsIsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_aprsis_host")]
    pub host: String,

    #[serde(default = "default_aprsis_port")]
    pub port: u16,

    /// Computed from the login callsign when unset
    #[serde(default)]
    pub passcode: Option<u16>,

    #[serde(default = "default_aprsis_filter")]
    pub filter: String,

    #[serde(default = "default_aprsis_reconnect_s")]
    pub reconnect_interval_s: u64,
}

/// KISS modem carrying the RF channel
#[derive(Debug, Deserialize, Clone)]
pub struct ModemConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_modem_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Wire format of the local serial TNC
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TncMode {
    Off,
    Kiss,
    Tnc2,
}

/// Local serial TNC
#[derive(Debug, Deserialize, Clone)]
pub struct TncConfig {
    #[serde(default = "default_tnc_mode")]
    pub mode: TncMode,

    #[serde(default = "default_tnc_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Table and channel capacities
#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    #[serde(default = "default_station_capacity")]
    pub stations: usize,

    #[serde(default = "default_telemetry_capacity")]
    pub telemetry: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue: usize,

    /// Depth of the inbound frame channels
    #[serde(default = "default_channel_depth")]
    pub channel_depth: usize,
}

/// Logging and status reporting
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rotated log files are written here when set
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_status_interval_s")]
    pub status_interval_s: u64,
}

// Default value functions
fn default_true() -> bool { true }

fn default_callsign() -> String { "N0CALL".to_string() }
fn default_tocall() -> String { "APE32A".to_string() }

fn default_position_interval_s() -> u64 { 1800 }
fn default_beacon_path() -> usize { 1 }
fn default_symbol_table() -> char { '/' }
fn default_symbol() -> char { '&' }
fn default_position_format() -> PositionFormat { PositionFormat::Uncompressed }

fn default_igate_ssid() -> u8 { 10 }
fn default_rf2inet_filter() -> u16 { FILTER_ALL }
fn default_inet2rf_filter() -> u16 { FILTER_MESSAGE }
fn default_inet2rf_path() -> usize { 0 }

fn default_digi_filter() -> u16 {
    FILTER_POSITION | FILTER_MESSAGE | FILTER_STATUS | FILTER_OBJECT | FILTER_ITEM | FILTER_MIC_E | FILTER_WEATHER
        | FILTER_TELEMETRY
}
fn default_digi_max_delay_ms() -> u64 { 1500 }

fn default_high_speed_kmh() -> f64 { 100.0 }
fn default_low_speed_kmh() -> f64 { 5.0 }
fn default_max_interval_s() -> u64 { 60 }
fn default_min_interval_s() -> u64 { 10 }
fn default_slow_interval_s() -> u64 { 600 }
fn default_min_angle_deg() -> f64 { 25.0 }

fn default_tracker_ssid() -> u8 { 9 }
fn default_mic_e_message() -> u8 { 7 }
fn default_weather_ssid() -> u8 { 13 }

fn default_aprsis_host() -> String { "rotate.aprs2.net".to_string() }
fn default_aprsis_port() -> u16 { 14580 }
fn default_aprsis_filter() -> String { "m/10".to_string() }
fn default_aprsis_reconnect_s() -> u64 { 30 }

fn default_modem_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_tnc_mode() -> TncMode { TncMode::Off }
fn default_tnc_port() -> String { "/dev/ttyUSB1".to_string() }

fn default_station_capacity() -> usize { crate::station::heard::DEFAULT_STATION_CAPACITY }
fn default_telemetry_capacity() -> usize { crate::station::telemetry::DEFAULT_TELEMETRY_CAPACITY }
fn default_queue_capacity() -> usize { crate::queue::DEFAULT_QUEUE_CAPACITY }
fn default_channel_depth() -> usize { 32 }

fn default_log_level() -> String { "info".to_string() }
fn default_log_file_prefix() -> String { "aprs-gateway.log".to_string() }
fn default_status_interval_s() -> u64 { 60 }

fn beacon_with(symbol_table: char, symbol: char, comment: &str) -> BeaconConfig {
    BeaconConfig {
        symbol_table,
        symbol,
        comment: comment.to_string(),
        ..BeaconConfig::default()
    }
}

fn default_igate_beacon() -> BeaconConfig { beacon_with('L', '&', "APRS IGate") }
fn default_digi_beacon() -> BeaconConfig { beacon_with('/', '#', "APRS Digipeater") }
fn default_weather_beacon() -> BeaconConfig { beacon_with('/', '_', "") }

fn default_tracker_beacon() -> BeaconConfig {
    BeaconConfig {
        position_interval_s: 120,
        inet: false,
        path: 2,
        format: PositionFormat::Compressed,
        ..beacon_with('/', '>', "APRS Tracker")
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            callsign: default_callsign(),
            latitude: 0.0,
            longitude: 0.0,
            altitude_m: 0.0,
            tocall: default_tocall(),
        }
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            position_interval_s: default_position_interval_s(),
            status_interval_s: 0,
            rf: true,
            inet: true,
            path: default_beacon_path(),
            symbol_table: default_symbol_table(),
            symbol: default_symbol(),
            format: default_position_format(),
            comment: String::new(),
            status: String::new(),
        }
    }
}

impl Default for IgateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssid: default_igate_ssid(),
            rf2inet: true,
            inet2rf: false,
            rf2inet_filter: default_rf2inet_filter(),
            inet2rf_filter: default_inet2rf_filter(),
            inet2rf_path: default_inet2rf_path(),
            telemetry_interval_s: 0,
            telemetry_in_comment: false,
            beacon: default_igate_beacon(),
        }
    }
}

impl Default for DigiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssid: 0,
            filter: default_digi_filter(),
            max_delay_ms: default_digi_max_delay_ms(),
            beacon: default_digi_beacon(),
        }
    }
}

impl Default for SmartBeaconConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            high_speed_kmh: default_high_speed_kmh(),
            low_speed_kmh: default_low_speed_kmh(),
            max_interval_s: default_max_interval_s(),
            min_interval_s: default_min_interval_s(),
            slow_interval_s: default_slow_interval_s(),
            min_angle_deg: default_min_angle_deg(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssid: default_tracker_ssid(),
            mic_e_message: default_mic_e_message(),
            beacon: default_tracker_beacon(),
            smartbeacon: SmartBeaconConfig::default(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssid: default_weather_ssid(),
            beacon: default_weather_beacon(),
        }
    }
}

impl Default for AprsIsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_aprsis_host(),
            port: default_aprsis_port(),
            passcode: None,
            filter: default_aprsis_filter(),
            reconnect_interval_s: default_aprsis_reconnect_s(),
        }
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_modem_port(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for TncConfig {
    fn default() -> Self {
        Self {
            mode: default_tnc_mode(),
            port: default_tnc_port(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            stations: default_station_capacity(),
            telemetry: default_telemetry_capacity(),
            queue: default_queue_capacity(),
            channel_depth: default_channel_depth(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            file_prefix: default_log_file_prefix(),
            status_interval_s: default_status_interval_s(),
        }
    }
}

const VALID_BAUD_RATES: [u32; 7] = [1200, 4800, 9600, 19200, 38400, 57600, 115200];

fn invalid(message: &str) -> GatewayError {
    GatewayError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aprs_gateway::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// `CALL-SSID` for a role
    #[must_use]
    pub fn call_for(&self, ssid: u8) -> String {
        with_ssid(&self.station.callsign, ssid)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Station identity
        let call = &self.station.callsign;
        if call.is_empty() || call.len() > 6 || !call.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("station callsign must be 1-6 alphanumeric characters without SSID"));
        }

        if self.station.tocall.is_empty() || self.station.tocall.len() > 6 {
            return Err(invalid("station tocall must be 1-6 characters"));
        }

        if !(-90.0..=90.0).contains(&self.station.latitude) {
            return Err(invalid("station latitude must be between -90 and 90"));
        }

        if !(-180.0..=180.0).contains(&self.station.longitude) {
            return Err(invalid("station longitude must be between -180 and 180"));
        }

        // Role SSIDs
        for (role, ssid) in [
            ("igate", self.igate.ssid),
            ("digi", self.digi.ssid),
            ("tracker", self.tracker.ssid),
            ("weather", self.weather.ssid),
        ] {
            if ssid > 15 {
                return Err(invalid(&format!("{} ssid must be between 0 and 15", role)));
            }
        }

        // Filters
        for (name, filter) in [
            ("rf2inet_filter", self.igate.rf2inet_filter),
            ("inet2rf_filter", self.igate.inet2rf_filter),
            ("digi filter", self.digi.filter),
        ] {
            if filter & !FILTER_ALL != 0 {
                return Err(invalid(&format!("{} has unknown bits set", name)));
            }
        }

        if self.digi.max_delay_ms > 10000 {
            return Err(invalid("digi max_delay_ms must be at most 10000"));
        }

        if self.tracker.mic_e_message > 7 {
            return Err(invalid("tracker mic_e_message must be between 0 and 7"));
        }

        // SmartBeacon
        let sb = &self.tracker.smartbeacon;
        if sb.low_speed_kmh < 0.0 || sb.high_speed_kmh <= sb.low_speed_kmh {
            return Err(invalid("smartbeacon high_speed_kmh must be greater than low_speed_kmh"));
        }

        if sb.max_interval_s == 0 || sb.min_interval_s == 0 {
            return Err(invalid("smartbeacon intervals must be greater than 0"));
        }

        if sb.slow_interval_s < sb.max_interval_s {
            return Err(invalid("smartbeacon slow_interval_s must not be shorter than max_interval_s"));
        }

        if !(0.0..=180.0).contains(&sb.min_angle_deg) {
            return Err(invalid("smartbeacon min_angle_deg must be between 0 and 180"));
        }

        // Uplinks
        if self.aprsis.enabled && self.aprsis.host.is_empty() {
            return Err(invalid("aprsis host cannot be empty when enabled"));
        }

        if self.aprsis.reconnect_interval_s == 0 || self.aprsis.reconnect_interval_s > 3600 {
            return Err(invalid("aprsis reconnect_interval_s must be between 1 and 3600"));
        }

        if self.modem.enabled && self.modem.port.is_empty() {
            return Err(invalid("modem port cannot be empty when enabled"));
        }

        if self.modem.reconnect_interval_ms == 0 || self.modem.reconnect_interval_ms > 60000 {
            return Err(invalid("modem reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.tnc.mode != TncMode::Off && self.tnc.port.is_empty() {
            return Err(invalid("tnc port cannot be empty when enabled"));
        }

        if self.tnc.reconnect_interval_ms == 0 || self.tnc.reconnect_interval_ms > 60000 {
            return Err(invalid("tnc reconnect_interval_ms must be between 1 and 60000"));
        }

        for baud in [self.modem.baud_rate, self.tnc.baud_rate] {
            if !VALID_BAUD_RATES.contains(&baud) {
                return Err(invalid(&format!("baud_rate {} is not supported", baud)));
            }
        }

        // Capacities
        if self.tables.stations == 0 || self.tables.stations > 500 {
            return Err(invalid("tables stations must be between 1 and 500"));
        }

        if self.tables.telemetry == 0 || self.tables.telemetry > self.tables.stations {
            return Err(invalid("tables telemetry must be between 1 and the station capacity"));
        }

        if self.tables.queue == 0 || self.tables.queue > 100 {
            return Err(invalid("tables queue must be between 1 and 100"));
        }

        if self.tables.channel_depth == 0 {
            return Err(invalid("tables channel_depth must be greater than 0"));
        }

        if self.log.status_interval_s == 0 {
            return Err(invalid("log status_interval_s must be greater than 0"));
        }

        Ok(())
    }
}
