//! # Routing Engine
//!
//! Owns the transmit queue and drives every role:
//! - RF frames: station table, IGate RF→Internet, digipeater
//! - APRS-IS lines: station table, IGate Internet→RF (third-party)
//! - local TNC frames: straight to RF
//! - once per second: role beacons, SmartBeacon and IGate telemetry
//!
//! Nothing in here fails hard. Malformed input, full queues and unavailable
//! channels are logged, counted and dropped.

pub mod digi;
pub mod igate;
pub mod stats;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::aprs::packet::{is_server_comment, parse_internet_line, Tnc2Packet};
use crate::aprs::PacketKind;
use crate::beacon::builder::{self, PositionReport};
use crate::beacon::{GpsFix, IntervalTimer, SmartBeacon, WeatherReport};
use crate::clock::Clock;
use crate::codec::telemetry as packed;
use crate::config::{BeaconConfig, Config, TncMode};
use crate::queue::{ChannelMask, ChannelSink, DispatchReport, TxQueue};
use crate::station::telemetry::parse_report;
use crate::station::{Origin, Shared, Sighting, SignalReport, StationTable, TelemetryTable};

pub use stats::{StationSummary, Stats, StatusReport};

/// Fixed digipeater paths selectable by index
pub const PATH_TABLE: [&str; 7] = ["", "WIDE1-1", "WIDE1-1,WIDE2-1", "WIDE2-1", "WIDE2-2", "RFONLY", "NOGATE"];

/// Telemetry definitions go out with every Nth sequence number
const TELEMETRY_DEFINITION_EVERY: u16 = 10;

/// Telemetry sequence numbers wrap at three digits
const TELEMETRY_SEQ_WRAP: u16 = 1000;

const TELEMETRY_NAMES: [&str; 5] = ["RxRF", "RxInet", "RF2Inet", "Inet2RF", "Digi"];
const TELEMETRY_UNITS: [&str; 5] = ["Pkts"; 5];
const TELEMETRY_EQNS: [[f64; 3]; 5] = [[0.0, 1.0, 0.0]; 5];

/// Path string for a configured index; out-of-range indices mean no path.
#[must_use]
pub fn path_for_index(index: usize) -> &'static str {
    PATH_TABLE.get(index).copied().unwrap_or("")
}

/// Station roles that originate beacons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Igate,
    Digi,
    Tracker,
    Weather,
}

#[derive(Debug, Clone)]
struct RoleBeacon {
    role: Role,
    call: String,
    config: BeaconConfig,
    position: IntervalTimer,
    status: IntervalTimer,
}

impl RoleBeacon {
    fn new(role: Role, call: String, config: &BeaconConfig) -> Self {
        Self {
            role,
            call,
            position: IntervalTimer::from_secs(config.position_interval_s),
            status: IntervalTimer::from_secs(config.status_interval_s),
            config: config.clone(),
        }
    }

    fn mask(&self) -> ChannelMask {
        let mut mask = ChannelMask::NONE;
        if self.config.rf {
            mask |= ChannelMask::RF;
        }
        if self.config.inet {
            mask |= ChannelMask::INTERNET;
        }
        mask
    }
}

/// The routing and beaconing core.
#[derive(Debug)]
pub struct Router {
    config: Config,
    igate_call: String,
    digi_call: String,
    own_calls: Vec<String>,
    stations: Shared<StationTable>,
    telemetry: Shared<TelemetryTable>,
    queue: TxQueue,
    repeats: digi::RecentRepeats,
    stats: Stats,
    rng: StdRng,
    beacons: Vec<RoleBeacon>,
    smart: Option<SmartBeacon>,
    gps: Option<GpsFix>,
    weather: Option<WeatherReport>,
    telemetry_timer: IntervalTimer,
    telemetry_seq: u16,
    telemetry_baseline: Stats,
    last_second: Option<u64>,
}

impl Router {
    /// Build the router with entropy-seeded digipeat delays.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Build the router with a fixed random seed.
    #[must_use]
    pub fn with_seed(config: Config, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: Config, rng: StdRng) -> Self {
        let igate_call = config.call_for(config.igate.ssid);
        let digi_call = config.call_for(config.digi.ssid);
        let tracker_call = config.call_for(config.tracker.ssid);
        let weather_call = config.call_for(config.weather.ssid);

        let mut beacons = Vec::new();
        if config.igate.enabled {
            beacons.push(RoleBeacon::new(Role::Igate, igate_call.clone(), &config.igate.beacon));
        }
        if config.digi.enabled {
            beacons.push(RoleBeacon::new(Role::Digi, digi_call.clone(), &config.digi.beacon));
        }
        if config.tracker.enabled {
            beacons.push(RoleBeacon::new(Role::Tracker, tracker_call.clone(), &config.tracker.beacon));
        }
        if config.weather.enabled {
            beacons.push(RoleBeacon::new(Role::Weather, weather_call.clone(), &config.weather.beacon));
        }

        let smart = (config.tracker.enabled && config.tracker.smartbeacon.enabled)
            .then(|| SmartBeacon::new(config.tracker.smartbeacon.clone()));

        let telemetry_timer = if config.igate.enabled {
            IntervalTimer::from_secs(config.igate.telemetry_interval_s)
        } else {
            IntervalTimer::from_secs(0)
        };

        let mut own_calls = vec![igate_call.clone(), digi_call.clone(), tracker_call, weather_call];
        own_calls.sort();
        own_calls.dedup();

        info!(
            "Router ready: igate={} digi={} tracker={} weather={}",
            config.igate.enabled, config.digi.enabled, config.tracker.enabled, config.weather.enabled
        );

        Self {
            stations: Shared::new(StationTable::new(config.tables.stations)),
            telemetry: Shared::new(TelemetryTable::new(config.tables.telemetry)),
            queue: TxQueue::new(config.tables.queue),
            repeats: digi::RecentRepeats::new(),
            igate_call,
            digi_call,
            own_calls,
            stats: Stats::default(),
            rng,
            beacons,
            smart,
            gps: None,
            weather: None,
            telemetry_timer,
            telemetry_seq: 0,
            telemetry_baseline: Stats::default(),
            last_second: None,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the heard-station table
    #[must_use]
    pub fn stations(&self) -> Shared<StationTable> {
        self.stations.clone()
    }

    /// Handle to the remote telemetry table
    #[must_use]
    pub fn telemetry(&self) -> Shared<TelemetryTable> {
        self.telemetry.clone()
    }

    #[must_use]
    pub fn queue(&self) -> &TxQueue {
        &self.queue
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Consume the station table's new-arrival flag without waiting.
    ///
    /// `None` while another task holds the table; poll again next tick.
    #[must_use]
    pub fn poll_new_arrival(&self) -> Option<bool> {
        self.stations.try_with(StationTable::take_new_arrival)
    }

    /// Callsigns this station transmits as
    #[must_use]
    pub fn own_calls(&self) -> &[String] {
        &self.own_calls
    }

    fn is_own(&self, call: &str) -> bool {
        self.own_calls.iter().any(|own| own.eq_ignore_ascii_case(call))
    }

    /// Latest GPS reading for the tracker.
    pub fn update_gps(&mut self, fix: GpsFix) {
        self.gps = Some(fix);
    }

    /// Latest weather reading for the weather role.
    pub fn set_weather(&mut self, report: WeatherReport) {
        self.weather = Some(report);
    }

    /// Route a frame decoded from the RF modem.
    pub fn handle_rf(&mut self, packet: &Tnc2Packet, signal: SignalReport, clock: Clock) {
        self.stats.all += 1;
        self.stats.rf_rx += 1;

        let kind = packet.kind();
        let raw = packet.to_bytes();
        debug!("RF [{}]: {}", kind, packet);
        self.record_station(packet, &raw, kind, Origin::Rf(signal), clock);

        if self.config.tnc.mode != TncMode::Off {
            self.enqueue(&raw, 0, ChannelMask::TNC, clock);
        }

        if self.is_own(&packet.source) {
            debug!("Own packet heard on RF: {}", packet);
            return;
        }

        let igate = &self.config.igate;
        if igate.enabled && igate.rf2inet {
            let gated = kind
                .matches_filter(igate.rf2inet_filter)
                .then(|| igate::gate_to_internet(packet, &self.igate_call))
                .flatten();
            match gated {
                Some(line) => {
                    if self.enqueue(&line, 0, ChannelMask::INTERNET, clock) {
                        self.stats.rf2inet += 1;
                    }
                }
                None => {
                    debug!("Not gated to APRS-IS: {}", packet);
                    self.stats.dropped += 1;
                }
            }
        }

        if self.config.digi.enabled && kind.matches_filter(self.config.digi.filter) {
            if self.queue.duplicate_check(&raw) {
                debug!("Duplicate heard, pending repeat cancelled: {}", packet);
                self.stats.duplicates += 1;
            } else if self.repeats.contains(packet, clock.uptime_ms) {
                debug!("Already repeated: {}", packet);
                self.stats.duplicates += 1;
            } else if let Some(out) = digi::digipeat(packet, &self.digi_call) {
                let delay = if out.addressed || packet.has_used_hop() {
                    0
                } else {
                    self.rng.gen_range(0..=self.config.digi.max_delay_ms)
                };
                if self.enqueue(&out.packet.to_bytes(), delay, ChannelMask::RF, clock) {
                    self.repeats.insert(packet, clock.uptime_ms);
                    self.stats.digi += 1;
                }
            }
        }
    }

    /// Route a line read from APRS-IS.
    pub fn handle_internet_line(&mut self, line: &str, clock: Clock) {
        self.stats.all += 1;
        self.stats.inet_rx += 1;

        if is_server_comment(line) {
            debug!("APRS-IS: {}", line.trim_end());
            return;
        }

        let Some(packet) = parse_internet_line(line) else {
            debug!("Discarding malformed APRS-IS line: {}", line.trim_end());
            return;
        };

        let kind = packet.kind();
        let raw = packet.to_bytes();
        self.record_station(&packet, &raw, kind, Origin::Internet, clock);

        let igate = &self.config.igate;
        if !(igate.enabled && igate.inet2rf) || !kind.matches_filter(igate.inet2rf_filter) {
            return;
        }

        let frame = igate::gate_to_rf(
            &packet,
            line,
            &self.igate_call,
            &self.config.station.tocall,
            path_for_index(igate.inet2rf_path),
            &self.own_calls,
        );
        if let Some(frame) = frame {
            if self.enqueue(frame.as_bytes(), 0, ChannelMask::RF | ChannelMask::THIRD_PARTY, clock) {
                self.stats.inet2rf += 1;
            }
        }
    }

    /// Send a frame received from the local TNC out on RF.
    pub fn handle_tnc_frame(&mut self, packet: &Tnc2Packet, clock: Clock) {
        self.stats.all += 1;
        debug!("TNC: {}", packet);
        self.enqueue(&packet.to_bytes(), 0, ChannelMask::RF, clock);
    }

    /// Run the dispatcher, then once per second the beacon timers.
    pub fn tick(&mut self, clock: Clock, sink: &mut dyn ChannelSink) -> DispatchReport {
        let report = self.queue.dispatch(clock.uptime_ms, self.config.aprsis.enabled, sink);
        self.stats.record_dispatch(&report);

        let second = clock.uptime_ms / 1000;
        if self.last_second != Some(second) {
            self.last_second = Some(second);
            self.run_beacons(clock);
        }
        report
    }

    /// Snapshot for the status reporter.
    #[must_use]
    pub fn status_report(&self, clock: Clock, aprsis_connected: bool) -> StatusReport {
        let (latitude, longitude) = self.own_position();
        let stations = self
            .stations
            .with(|table| table.snapshot())
            .into_iter()
            .map(|record| StationSummary::new(record, latitude, longitude))
            .collect();

        StatusReport {
            timestamp: i64::try_from(clock.unix_s)
                .ok()
                .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            uptime_s: clock.uptime_ms / 1000,
            aprsis_connected,
            queue_pending: self.queue.pending(),
            stats: self.stats,
            stations,
            telemetry: self.telemetry.with(|table| table.snapshot()),
        }
    }

    fn own_position(&self) -> (f64, f64) {
        match self.gps {
            Some(fix) if fix.valid => (fix.latitude, fix.longitude),
            _ => (self.config.station.latitude, self.config.station.longitude),
        }
    }

    fn record_station(&mut self, packet: &Tnc2Packet, raw: &[u8], kind: PacketKind, origin: Origin, clock: Clock) {
        let object = packet.object_name();
        let sighting = Sighting {
            callsign: &packet.source,
            object: object.as_deref(),
            raw,
            kind,
            origin,
            position: packet.position(),
        };
        self.stations.with(|table| table.update(sighting, clock.unix_s));

        if let Some((call, report)) = parse_report(&packet.source, &packet.info) {
            self.telemetry.with(|table| table.apply(&call, report, clock.unix_s));
        }
    }

    fn enqueue(&mut self, payload: &[u8], delay_ms: u64, mask: ChannelMask, clock: Clock) -> bool {
        match self.queue.enqueue(payload, delay_ms, mask, clock.uptime_ms) {
            Ok(_) => true,
            Err(e) => {
                warn!("Dropping [{}] {}: {}", mask, String::from_utf8_lossy(payload), e);
                self.stats.dropped += 1;
                false
            }
        }
    }

    fn run_beacons(&mut self, clock: Clock) {
        for index in 0..self.beacons.len() {
            let due = match (self.beacons[index].role, self.smart.as_mut(), self.gps) {
                (Role::Tracker, Some(smart), Some(fix)) if fix.valid => {
                    smart.tick(fix.speed_kmh(), f64::from(fix.course))
                }
                _ => self.beacons[index].position.poll(clock.uptime_ms),
            };

            if due && self.send_position(index, clock) && self.beacons[index].role == Role::Tracker {
                if let Some(smart) = self.smart.as_mut() {
                    smart.mark_sent();
                }
            }

            if self.beacons[index].status.poll(clock.uptime_ms) {
                self.send_status(index, clock);
            }
        }

        if self.telemetry_timer.poll(clock.uptime_ms) {
            self.send_telemetry(clock);
        }
    }

    fn send_position(&mut self, index: usize, clock: Clock) -> bool {
        let beacon = self.beacons[index].clone();
        let mask = beacon.mask();
        if mask == ChannelMask::NONE {
            return false;
        }

        let station = &self.config.station;
        let fixed_altitude = (station.altitude_m != 0.0).then_some(station.altitude_m);
        let fix = self.gps.filter(|f| f.valid && beacon.role == Role::Tracker);
        let (latitude, longitude, altitude_m, course, speed_knots) = match fix {
            Some(f) => (f.latitude, f.longitude, Some(f.altitude_m), f.course, f.speed_knots),
            None => (station.latitude, station.longitude, fixed_altitude, 0, 0.0),
        };

        let mut comment = beacon.config.comment.clone();
        if beacon.role == Role::Igate && self.config.igate.telemetry_in_comment {
            let values = self.stats.telemetry_delta(&Stats::default());
            let fields: Vec<String> = std::iter::once(u32::from(self.telemetry_seq))
                .chain(values)
                .map(|v| v.to_string())
                .collect();
            comment.push_str(&packed::pack(&fields.join(",")));
        }

        let (destination, info) = if beacon.role == Role::Weather {
            let Some(report) = self.weather else {
                debug!("No weather reading yet, skipping beacon");
                return false;
            };
            (None, builder::weather(latitude, longitude, &report, &comment))
        } else {
            let report = PositionReport {
                latitude,
                longitude,
                altitude_m,
                course,
                speed_knots,
                table: beacon.config.symbol_table,
                symbol: beacon.config.symbol,
                comment: &comment,
                format: beacon.config.format,
                has_fix: fix.is_some(),
                mic_e_message: self.config.tracker.mic_e_message,
            };
            match builder::position(&report) {
                Ok(payload) => (payload.destination, payload.info),
                Err(e) => {
                    warn!("{:?} position beacon not built: {}", beacon.role, e);
                    self.stats.errors += 1;
                    return false;
                }
            }
        };

        let destination = destination.unwrap_or_else(|| self.config.station.tocall.clone());
        let frame = builder::frame(&beacon.call, &destination, path_for_index(beacon.config.path), &info);
        info!("{:?} beacon: {}", beacon.role, frame);
        self.enqueue(frame.as_bytes(), 0, mask, clock)
    }

    fn send_status(&mut self, index: usize, clock: Clock) {
        let beacon = &self.beacons[index];
        let mask = beacon.mask();
        if beacon.config.status.is_empty() || mask == ChannelMask::NONE {
            return;
        }
        let frame = builder::frame(
            &beacon.call,
            &self.config.station.tocall,
            path_for_index(beacon.config.path),
            &builder::status(&beacon.config.status),
        );
        self.enqueue(frame.as_bytes(), 0, mask, clock);
    }

    fn send_telemetry(&mut self, clock: Clock) {
        let values = self.stats.telemetry_delta(&self.telemetry_baseline);
        self.telemetry_baseline = self.stats;
        let seq = self.telemetry_seq;
        self.telemetry_seq = (seq + 1) % TELEMETRY_SEQ_WRAP;

        let beacon = RoleBeacon::new(Role::Igate, self.igate_call.clone(), &self.config.igate.beacon);
        let mask = beacon.mask();
        if mask == ChannelMask::NONE {
            return;
        }
        let path = path_for_index(beacon.config.path);
        let tocall = self.config.station.tocall.clone();

        let mut lines = Vec::new();
        if seq % TELEMETRY_DEFINITION_EVERY == 0 {
            lines.extend(builder::telemetry_definitions(
                &self.igate_call,
                &TELEMETRY_NAMES,
                &TELEMETRY_UNITS,
                &TELEMETRY_EQNS,
            ));
        }
        lines.push(builder::telemetry_values(seq, &values, 0));

        for line in lines {
            let frame = builder::frame(&self.igate_call, &tocall, path, &line);
            self.enqueue(frame.as_bytes(), 0, mask, clock);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aprs::classify::{FILTER_MESSAGE, FILTER_POSITION, FILTER_STATUS};
    use crate::config::PositionFormat;
    use crate::queue::MockChannelSink;

    const T0: Clock = Clock::new(5_000, 1_700_000_000);

    fn base_config() -> Config {
        let mut config = Config::default();
        config.station.callsign = "MYCALL".to_string();
        config.station.latitude = 13.75;
        config.station.longitude = 100.5;
        config
    }

    fn igate_config() -> Config {
        let mut config = base_config();
        config.igate.enabled = true;
        config.igate.ssid = 1;
        config.igate.inet2rf = true;
        config.igate.inet2rf_filter = FILTER_POSITION | FILTER_STATUS;
        config.igate.inet2rf_path = 1;
        config.aprsis.enabled = true;
        config
    }

    fn digi_config() -> Config {
        let mut config = base_config();
        config.digi.enabled = true;
        config.digi.max_delay_ms = 2_000;
        config
    }

    fn rf(line: &str) -> Tnc2Packet {
        Tnc2Packet::parse(line.as_bytes()).unwrap()
    }

    fn payloads(router: &Router) -> Vec<String> {
        router
            .queue()
            .active()
            .map(|e| String::from_utf8_lossy(&e.payload).into_owned())
            .collect()
    }

    fn quiet_sink() -> MockChannelSink {
        let mut sink = MockChannelSink::new();
        sink.expect_internet_connected().return_const(true);
        sink.expect_send_internet().returning(|_| Ok(()));
        sink.expect_key_transmitter().return_const(());
        sink.expect_unkey_transmitter().return_const(());
        sink.expect_send_rf().returning(|_| Ok(()));
        sink.expect_send_tnc().returning(|_| Ok(()));
        sink
    }

    #[test]
    fn test_path_table() {
        assert_eq!(path_for_index(0), "");
        assert_eq!(path_for_index(1), "WIDE1-1");
        assert_eq!(path_for_index(2), "WIDE1-1,WIDE2-1");
        assert_eq!(path_for_index(6), "NOGATE");
        assert_eq!(path_for_index(7), "");
    }

    #[test]
    fn test_internet_to_rf_end_to_end() {
        let mut router = Router::with_seed(igate_config(), 1);
        router.handle_internet_line("N0CALL-9>APRS,TCPIP*:!1234.56N/09876.54W>Test status\r\n", T0);

        let entries: Vec<_> = router.queue().active().cloned().collect();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert!(entry.mask.contains(ChannelMask::RF));
        assert!(!entry.mask.intersects(ChannelMask::INTERNET | ChannelMask::TNC));
        assert_eq!(entry.delay_ms, 0);
        assert!(String::from_utf8_lossy(&entry.payload)
            .starts_with("MYCALL-1>APE32A,WIDE1-1:}N0CALL-9>APRS,TCPIP*:!1234.56N/09876.54W>Test status"));

        let stats = router.stats();
        assert_eq!(stats.inet_rx, 1);
        assert_eq!(stats.inet2rf, 1);

        let station = router.stations().with(|t| t.find("N0CALL-9", None, PacketKind::POSITION));
        assert!(station.is_some());
    }

    #[test]
    fn test_internet_filter_and_ssid_rules() {
        let mut router = Router::with_seed(igate_config(), 1);
        router.handle_internet_line("N0CALL-9>APRS,TCPIP*::N0CALL-5 :hello", T0);
        router.handle_internet_line("N0CALL>APRS,TCPIP*:>no ssid", T0);
        router.handle_internet_line("MYCALL-1>APE32A,TCPIP*:>own", T0);
        router.handle_internet_line("# aprsc 2.1.10-gd72a17c", T0);
        router.handle_internet_line("garbage without delimiters", T0);

        assert_eq!(router.queue().pending(), 0);
        let stats = router.stats();
        assert_eq!(stats.inet_rx, 5);
        assert_eq!(stats.all, 5);
        assert_eq!(stats.inet2rf, 0);
        assert_eq!(router.stations().with(|t| t.len()), 3);
    }

    #[test]
    fn test_rf_to_internet() {
        let mut router = Router::with_seed(igate_config(), 1);
        router.handle_rf(&rf("N0CALL-9>APRS,WIDE1-1:>on the air"), SignalReport::default(), T0);
        router.handle_rf(&rf("N0CALL-7>APRS,NOGATE:>stay local"), SignalReport::default(), T0);

        assert_eq!(payloads(&router), vec!["N0CALL-9>APRS,WIDE1-1,qAR,MYCALL-1:>on the air"]);
        assert_eq!(router.queue().active().next().unwrap().mask, ChannelMask::INTERNET);
        let stats = router.stats();
        assert_eq!(stats.rf_rx, 2);
        assert_eq!(stats.rf2inet, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_rf_filter_mismatch_counts_dropped() {
        let mut config = igate_config();
        config.igate.rf2inet_filter = FILTER_MESSAGE;
        let mut router = Router::with_seed(config, 1);
        router.handle_rf(&rf("N0CALL-9>APRS:>status"), SignalReport::default(), T0);
        router.handle_rf(&rf("N0CALL-9>APRS:not classified"), SignalReport::default(), T0);
        assert_eq!(router.queue().pending(), 0);
        assert_eq!(router.stats().dropped, 2);
    }

    #[test]
    fn test_rf_station_metrics_recorded() {
        let mut router = Router::with_seed(base_config(), 1);
        let signal = SignalReport {
            audio_level: 30,
            rssi: -101.0,
            snr: 6.0,
            freq_error: -3.0,
        };
        router.handle_rf(&rf("N0CALL-9>APRS:!1434.56N/10030.00E>"), signal, T0);

        let record = router.stations().with(|t| t.get(0)).unwrap();
        assert_eq!(record.origin, Origin::Rf(signal));
        assert!(record.position.is_some());
        let report = router.status_report(T0, false);
        assert_eq!(report.stations.len(), 1);
        assert!(report.stations[0].distance_km.unwrap() > 90.0);
        assert!(report.timestamp.starts_with("2023-11-14"));
    }

    #[test]
    fn test_telemetry_packets_fill_table() {
        let mut router = Router::with_seed(base_config(), 1);
        router.handle_internet_line("N0CALL-9>APRS,TCPIP*:T#001,1,2,3,4,5,00000000", T0);
        router.handle_internet_line("N0CALL-9>APRS,TCPIP*::N0CALL-9 :PARM.A,B,C,D,E", T0);

        let records = router.telemetry().with(|t| t.snapshot());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq, 1);
        assert_eq!(records[0].channels[4].name, "E");
        assert_eq!(records[0].channels[4].value, 5.0);
    }

    #[test]
    fn test_digipeat_with_random_delay() {
        let mut router = Router::with_seed(digi_config(), 7);
        router.handle_rf(&rf("N0CALL-9>APRS,WIDE1-1,WIDE2-1:>hi"), SignalReport::default(), T0);

        let entry = router.queue().active().next().cloned().unwrap();
        assert_eq!(
            String::from_utf8_lossy(&entry.payload),
            "N0CALL-9>APRS,MYCALL*,WIDE1*,WIDE2-1:>hi"
        );
        assert_eq!(entry.mask, ChannelMask::RF);
        assert!(entry.delay_ms <= 2_000);
        assert_eq!(router.stats().digi, 1);
    }

    #[test]
    fn test_digipeat_direct_and_used_paths_have_no_delay() {
        let mut router = Router::with_seed(digi_config(), 7);
        router.handle_rf(&rf("N0CALL-9>APRS,MYCALL,WIDE2-1:>direct"), SignalReport::default(), T0);
        router.handle_rf(&rf("N0CALL-8>APRS,DIGI1*,WIDE2-1:>used"), SignalReport::default(), T0);

        let delays: Vec<u64> = router.queue().active().map(|e| e.delay_ms).collect();
        assert_eq!(delays, vec![0, 0]);
    }

    #[test]
    fn test_duplicate_cancels_pending_repeat() {
        let mut config = digi_config();
        config.digi.max_delay_ms = 5_000;
        let mut router = Router::with_seed(config, 3);
        let first = rf("N0CALL-9>APRS,WIDE1-1:>hi");
        router.handle_rf(&first, SignalReport::default(), T0);
        assert_eq!(router.queue().pending(), 1);

        let heard_again = rf("N0CALL-9>APRS,OTHER*,WIDE1*:>hi");
        router.handle_rf(&heard_again, SignalReport::default(), T0.advance_ms(100));

        assert_eq!(router.queue().pending(), 0);
        assert_eq!(router.stats().duplicates, 1);
        assert_eq!(router.stats().digi, 1);
    }

    #[test]
    fn test_digipeat_suppressed_after_dispatch() {
        let mut config = digi_config();
        config.digi.max_delay_ms = 0;
        config.digi.beacon.position_interval_s = 0;
        let mut router = Router::with_seed(config, 5);

        router.handle_rf(&rf("N0CALL-9>APRS,WIDE1-1,WIDE2-1:>hi"), SignalReport::default(), T0);
        router.tick(T0.advance_ms(10), &mut quiet_sink());
        assert_eq!(router.queue().pending(), 0, "repeat went out");

        let relayed = rf("N0CALL-9>APRS,OTHER*,WIDE1*,WIDE2-1:>hi");
        router.handle_rf(&relayed, SignalReport::default(), T0.advance_ms(1_500));
        assert_eq!(router.queue().pending(), 0);
        assert_eq!(router.stats().digi, 1);
        assert_eq!(router.stats().duplicates, 1);

        router.handle_rf(&relayed, SignalReport::default(), T0.advance_ms(digi::REPEAT_MEMORY_MS + 10));
        assert_eq!(router.stats().digi, 2, "forgotten after the memory window");
    }

    #[test]
    fn test_poll_new_arrival() {
        let mut router = Router::with_seed(base_config(), 1);
        assert_eq!(router.poll_new_arrival(), Some(false));

        router.handle_rf(&rf("N0CALL-9>APRS:>hi"), SignalReport::default(), T0);
        let stations = router.stations();
        assert_eq!(stations.with(|_| router.poll_new_arrival()), None, "busy table is skipped");
        assert_eq!(router.poll_new_arrival(), Some(true));
        assert_eq!(router.poll_new_arrival(), Some(false));
    }

    #[test]
    fn test_own_packets_not_routed() {
        let mut config = digi_config();
        config.igate.enabled = true;
        let mut router = Router::with_seed(config, 3);
        router.handle_rf(&rf("MYCALL-10>APE32A,WIDE1-1:>me"), SignalReport::default(), T0);
        assert_eq!(router.queue().pending(), 0);
    }

    #[test]
    fn test_tnc_copy_and_tnc_input() {
        let mut config = base_config();
        config.tnc.mode = TncMode::Kiss;
        let mut router = Router::with_seed(config, 1);

        router.handle_rf(&rf("N0CALL-9>APRS:>heard"), SignalReport::default(), T0);
        router.handle_tnc_frame(&rf("MYCALL-5>APRS:>from tnc"), T0);

        let masks: Vec<ChannelMask> = router.queue().active().map(|e| e.mask).collect();
        assert_eq!(masks, vec![ChannelMask::TNC, ChannelMask::RF]);
    }

    #[test]
    fn test_queue_full_is_counted() {
        let mut config = base_config();
        config.tables.queue = 1;
        let mut router = Router::with_seed(config, 1);
        router.handle_tnc_frame(&rf("A>B:>1"), T0);
        router.handle_tnc_frame(&rf("A>B:>2"), T0);
        assert_eq!(router.queue().pending(), 1);
        assert_eq!(router.stats().dropped, 1);
    }

    #[test]
    fn test_igate_beacons_on_first_tick() {
        let mut config = igate_config();
        config.igate.beacon.status = "Gateway online".to_string();
        config.igate.beacon.status_interval_s = 600;
        config.igate.beacon.inet = false;
        let mut router = Router::with_seed(config, 1);

        let mut sink = MockChannelSink::new();
        router.tick(T0, &mut sink);

        assert_eq!(
            payloads(&router),
            vec![
                "MYCALL-1>APE32A,WIDE1-1:!1345.00NL10030.00E&APRS IGate".to_string(),
                "MYCALL-1>APE32A,WIDE1-1:>Gateway online".to_string(),
            ]
        );
        assert!(router.queue().active().all(|e| e.mask == ChannelMask::RF));

        // same second: no second beacon
        router.tick(T0.advance_ms(10), &mut quiet_sink());
        assert_eq!(router.queue().pending(), 0, "dispatched");
        router.tick(T0.advance_ms(1_000), &mut quiet_sink());
        assert_eq!(router.queue().pending(), 0, "interval not elapsed");
    }

    #[test]
    fn test_igate_telemetry_sequence() {
        let mut config = igate_config();
        config.igate.telemetry_interval_s = 600;
        config.igate.beacon.position_interval_s = 0;
        config.igate.beacon.rf = false;
        let mut router = Router::with_seed(config, 1);
        router.handle_internet_line("N0CALL-9>APRS,TCPIP*::N0CALL-5 :hello", T0);

        router.tick(T0, &mut MockChannelSink::new());
        let lines = payloads(&router);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "MYCALL-1>APE32A,WIDE1-1::MYCALL-1 :PARM.RxRF,RxInet,RF2Inet,Inet2RF,Digi");
        assert!(lines[1].contains(":UNIT.Pkts,Pkts,Pkts,Pkts,Pkts"));
        assert!(lines[2].contains(":EQNS.0,1,0,0,1,0"));
        assert_eq!(lines[3], "MYCALL-1>APE32A,WIDE1-1:T#000,0,1,0,0,0,00000000");

        router.tick(T0.advance_ms(10), &mut quiet_sink());
        router.tick(T0.advance_ms(600_000), &mut quiet_sink());
        assert_eq!(payloads(&router), vec!["MYCALL-1>APE32A,WIDE1-1:T#001,0,0,0,0,0,00000000"]);
    }

    #[test]
    fn test_igate_comment_telemetry() {
        let mut config = igate_config();
        config.igate.telemetry_in_comment = true;
        config.igate.beacon.inet = false;
        let mut router = Router::with_seed(config, 1);
        router.tick(T0, &mut MockChannelSink::new());

        let line = payloads(&router).remove(0);
        let comment = line.split_once(':').unwrap().1;
        assert_eq!(packed::find_in_comment(comment), Some(vec![0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn test_tracker_smartbeacon_uses_fix() {
        let mut config = base_config();
        config.tracker.enabled = true;
        config.tracker.beacon.format = PositionFormat::Uncompressed;
        config.tracker.smartbeacon.enabled = true;
        let mut router = Router::with_seed(config, 1);
        router.update_gps(GpsFix {
            latitude: 12.576,
            longitude: -98.909,
            altitude_m: 0.0,
            speed_knots: 54.0,
            course: 90,
            valid: true,
        });

        router.tick(T0, &mut MockChannelSink::new());
        let lines = payloads(&router);
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].starts_with("MYCALL-9>APE32A,WIDE1-1,WIDE2-1:!1234.56N/09854.54W>090/054"),
            "got {}",
            lines[0]
        );

        router.tick(T0.advance_ms(1_000), &mut quiet_sink());
        assert_eq!(router.queue().pending(), 0, "interval restarts after a beacon");
    }

    #[test]
    fn test_tracker_mic_e_uses_encoded_destination() {
        let mut config = base_config();
        config.tracker.enabled = true;
        config.tracker.beacon.format = PositionFormat::MicE;
        let mut router = Router::with_seed(config, 1);
        router.tick(T0, &mut MockChannelSink::new());

        let line = payloads(&router).remove(0);
        let packet = rf(&line);
        assert_eq!(packet.source, "MYCALL-9");
        assert_eq!(packet.destination.len(), 6);
        assert!(packet.kind().contains(PacketKind::MIC_E));
        let (lat, lon) = packet.position().unwrap();
        assert!((lat - 13.75).abs() < 0.001);
        assert!((lon - 100.5).abs() < 0.001);
    }

    #[test]
    fn test_weather_beacon_waits_for_reading() {
        let mut config = base_config();
        config.weather.enabled = true;
        config.weather.beacon.position_interval_s = 1;
        config.weather.beacon.inet = false;
        let mut router = Router::with_seed(config, 1);

        router.tick(T0, &mut MockChannelSink::new());
        assert_eq!(router.queue().pending(), 0);

        router.set_weather(WeatherReport {
            temperature_f: Some(86.0),
            ..WeatherReport::default()
        });
        router.tick(T0.advance_ms(1_000), &mut MockChannelSink::new());
        let line = payloads(&router).remove(0);
        assert!(line.starts_with("MYCALL-13>APE32A,WIDE1-1:!1345.00N/10030.00E_"));
        assert!(line.contains("t086"));
    }

    #[test]
    fn test_dispatch_updates_stats() {
        let mut config = base_config();
        config.aprsis.enabled = true;
        let mut router = Router::with_seed(config, 1);
        router.handle_tnc_frame(&rf("A>B:>1"), T0);

        let mut sink = MockChannelSink::new();
        sink.expect_key_transmitter().times(1).return_const(());
        sink.expect_unkey_transmitter().times(1).return_const(());
        sink.expect_send_rf().times(1).returning(|_| Ok(()));
        let report = router.tick(T0, &mut sink);
        assert_eq!(report.tx_rf, 1);
        assert_eq!(router.stats().tx_rf, 1);
    }
}
