//! # Beacons
//!
//! Locally originated traffic: position, status, telemetry and weather
//! reports, plus the timers that pace them.

pub mod builder;
pub mod smart;

pub use smart::SmartBeacon;

/// Knots to km/h
pub const KMH_PER_KNOT: f64 = 1.852;

/// Metres to feet
pub const FEET_PER_METRE: f64 = 3.280_84;

/// Latest GPS reading handed to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub speed_knots: f64,
    pub course: u16,
    pub valid: bool,
}

impl GpsFix {
    #[must_use]
    pub fn speed_kmh(&self) -> f64 {
        self.speed_knots * KMH_PER_KNOT
    }
}

/// Latest weather sensor reading. Missing values are sent as dots.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherReport {
    pub wind_dir: Option<u16>,
    pub wind_speed_mph: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub temperature_f: Option<f64>,
    /// Rain in hundredths of an inch
    pub rain_1h: Option<u16>,
    pub rain_24h: Option<u16>,
    pub rain_midnight: Option<u16>,
    pub humidity: Option<u8>,
    pub pressure_hpa: Option<f64>,
}

/// Fixed-interval beacon timer on the uptime clock.
///
/// Fires on the first poll, then every `interval`. An interval of zero
/// never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl IntervalTimer {
    #[must_use]
    pub fn from_secs(interval_s: u64) -> Self {
        Self {
            interval_ms: interval_s.saturating_mul(1000),
            last_ms: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.interval_ms > 0
    }

    /// True (and restarts the interval) when the timer has expired.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let due = self
            .last_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.interval_ms);
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}
