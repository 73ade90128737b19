//! Traffic counters and the periodic status report.

use serde::Serialize;

use crate::queue::DispatchReport;
use crate::station::{StationRecord, TelemetryRecord};

/// Cumulative traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Every received packet or line, routable or not
    pub all: u64,
    pub rf_rx: u64,
    pub inet_rx: u64,
    pub rf2inet: u64,
    pub inet2rf: u64,
    pub digi: u64,
    pub dropped: u64,
    pub duplicates: u64,
    pub tx_rf: u64,
    pub tx_inet: u64,
    pub tx_tnc: u64,
    pub errors: u64,
}

impl Stats {
    /// Fold one dispatcher pass into the counters.
    pub fn record_dispatch(&mut self, report: &DispatchReport) {
        self.tx_rf += u64::from(report.tx_rf);
        self.tx_inet += u64::from(report.tx_internet);
        self.tx_tnc += u64::from(report.tx_tnc);
        self.dropped += u64::from(report.dropped);
        self.errors += u64::from(report.errors);
    }

    /// Telemetry channel values since `earlier`:
    /// rf_rx, inet_rx, rf2inet, inet2rf, digi.
    #[must_use]
    pub fn telemetry_delta(&self, earlier: &Stats) -> [u32; 5] {
        let delta = |now: u64, then: u64| u32::try_from(now.saturating_sub(then)).unwrap_or(u32::MAX);
        [
            delta(self.rf_rx, earlier.rf_rx),
            delta(self.inet_rx, earlier.inet_rx),
            delta(self.rf2inet, earlier.rf2inet),
            delta(self.inet2rf, earlier.inet2rf),
            delta(self.digi, earlier.digi),
        ]
    }
}

/// One heard station in the status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    #[serde(flatten)]
    pub record: StationRecord,
    pub kind_name: String,
    pub distance_km: Option<f64>,
    pub bearing: Option<f64>,
}

impl StationSummary {
    /// Summarise `record` as seen from `(latitude, longitude)`.
    #[must_use]
    pub fn new(record: StationRecord, latitude: f64, longitude: f64) -> Self {
        let range = record.range_from(latitude, longitude);
        Self {
            kind_name: record.kind.to_string(),
            distance_km: range.map(|(km, _)| km),
            bearing: range.map(|(_, bearing)| bearing),
            record,
        }
    }
}

/// Snapshot logged by the binary as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub uptime_s: u64,
    pub aprsis_connected: bool,
    pub queue_pending: usize,
    pub stats: Stats,
    pub stations: Vec<StationSummary>,
    pub telemetry: Vec<TelemetryRecord>,
}

impl StatusReport {
    /// Render as a single JSON line.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}
