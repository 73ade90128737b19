//! # SmartBeacon Controller
//!
//! Adapts the tracker beacon interval to speed and heading changes. Evaluated
//! once per second; it only ever moves the target interval and raises an
//! immediate-send flag on sharp turns. Sending is up to the caller, which
//! reports back with [`SmartBeacon::mark_sent`].

use crate::config::SmartBeaconConfig;

/// Floor of the speed-proportional interval, in seconds
const MIN_PROPORTIONAL_INTERVAL_S: u64 = 5;

/// Speed below which heading is too noisy to detect turns (km/h)
const TURN_MIN_SPEED_KMH: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SmartBeacon {
    config: SmartBeaconConfig,
    speed_kmh: f64,
    last_speed_kmh: f64,
    heading: f64,
    /// Heading when the last beacon went out
    sent_heading: f64,
    interval_s: u64,
    elapsed_s: u64,
}

impl SmartBeacon {
    #[must_use]
    pub fn new(config: SmartBeaconConfig) -> Self {
        let interval_s = config.slow_interval_s;
        Self {
            config,
            speed_kmh: 0.0,
            last_speed_kmh: 0.0,
            heading: 0.0,
            sent_heading: 0.0,
            interval_s,
            // first tick after start-up beacons
            elapsed_s: interval_s,
        }
    }

    /// Current target interval in seconds
    #[must_use]
    pub fn interval_s(&self) -> u64 {
        self.interval_s
    }

    /// Seconds since the last beacon
    #[must_use]
    pub fn elapsed_s(&self) -> u64 {
        self.elapsed_s
    }

    #[must_use]
    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    #[must_use]
    pub fn last_speed_kmh(&self) -> f64 {
        self.last_speed_kmh
    }

    /// Advance one second with the current speed and heading.
    ///
    /// Returns true when a position beacon is due.
    pub fn tick(&mut self, speed_kmh: f64, heading: f64) -> bool {
        self.elapsed_s = self.elapsed_s.saturating_add(1);
        self.last_speed_kmh = self.speed_kmh;
        self.speed_kmh = speed_kmh.max(0.0);
        self.heading = heading.rem_euclid(360.0);

        let cfg = &self.config;
        let mut immediate = false;

        if self.speed_kmh >= cfg.high_speed_kmh {
            self.interval_s = cfg.max_interval_s;
        } else if self.speed_kmh <= cfg.low_speed_kmh {
            self.interval_s = cfg.slow_interval_s;
        } else {
            let proportional = (cfg.max_interval_s as f64 * cfg.high_speed_kmh / self.speed_kmh.max(1.0)) as u64;
            self.interval_s = proportional.clamp(MIN_PROPORTIONAL_INTERVAL_S, cfg.slow_interval_s.max(MIN_PROPORTIONAL_INTERVAL_S));
        }

        if self.speed_kmh > cfg.low_speed_kmh {
            let turned = heading_change(self.sent_heading, self.heading);
            if turned > cfg.min_angle_deg {
                if self.elapsed_s > cfg.min_interval_s && self.speed_kmh > TURN_MIN_SPEED_KMH {
                    immediate = true;
                } else {
                    self.interval_s = self.interval_s.min(cfg.min_interval_s);
                }
            }
        }

        immediate || self.elapsed_s >= self.interval_s
    }

    /// Record that a beacon was sent on this tick.
    pub fn mark_sent(&mut self) {
        self.elapsed_s = 0;
        self.sent_heading = self.heading;
    }
}

/// Smallest angle between two headings, in `[0, 180]`.
#[must_use]
pub fn heading_change(from: f64, to: f64) -> f64 {
    let diff = (from - to).abs() % 360.0;
    diff.min(360.0 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmartBeaconConfig {
        SmartBeaconConfig {
            enabled: true,
            high_speed_kmh: 100.0,
            low_speed_kmh: 5.0,
            max_interval_s: 60,
            min_interval_s: 10,
            slow_interval_s: 600,
            min_angle_deg: 25.0,
        }
    }

    fn settled() -> SmartBeacon {
        let mut sb = SmartBeacon::new(config());
        assert!(sb.tick(0.0, 0.0), "first tick beacons");
        sb.mark_sent();
        sb
    }

    #[test]
    fn test_high_speed_uses_max_interval() {
        let mut sb = settled();
        sb.tick(99.9, 0.0);
        let below = sb.interval_s();
        sb.tick(100.1, 0.0);
        assert_eq!(sb.interval_s(), 60);
        assert!(below >= 60);
    }

    #[test]
    fn test_low_speed_uses_slow_interval() {
        let mut sb = settled();
        sb.tick(50.0, 0.0);
        assert_eq!(sb.interval_s(), 120);
        sb.tick(4.0, 0.0);
        assert_eq!(sb.interval_s(), 600);
        assert_eq!(sb.last_speed_kmh(), 50.0);
    }

    #[test]
    fn test_middle_band_is_speed_proportional() {
        let mut sb = settled();
        sb.tick(20.0, 0.0);
        assert_eq!(sb.interval_s(), 300);
        sb.tick(80.0, 0.0);
        assert_eq!(sb.interval_s(), 75);
    }

    #[test]
    fn test_beacon_due_when_interval_elapses() {
        let mut sb = settled();
        for _ in 0..59 {
            assert!(!sb.tick(120.0, 0.0));
        }
        assert!(sb.tick(120.0, 0.0));
        sb.mark_sent();
        assert_eq!(sb.elapsed_s(), 0);
    }

    #[test]
    fn test_corner_peg_triggers_immediate() {
        let mut sb = settled();
        for _ in 0..15 {
            assert!(!sb.tick(50.0, 0.0));
        }
        assert!(sb.tick(50.0, 40.0), "sharp turn after min interval");
    }

    #[test]
    fn test_early_turn_shortens_interval() {
        let mut sb = settled();
        for _ in 0..3 {
            sb.tick(50.0, 0.0);
        }
        assert!(!sb.tick(50.0, 90.0));
        assert_eq!(sb.interval_s(), 10);

        let mut due = false;
        for _ in 0..7 {
            due = sb.tick(50.0, 90.0);
        }
        assert!(due, "beacons once the turn interval elapses");
    }

    #[test]
    fn test_small_heading_change_ignored() {
        let mut sb = settled();
        for _ in 0..15 {
            sb.tick(50.0, 0.0);
        }
        assert!(!sb.tick(50.0, 20.0));
        assert_eq!(sb.interval_s(), 120);
    }

    #[test]
    fn test_turns_ignored_when_stopped() {
        let mut sb = settled();
        for _ in 0..15 {
            sb.tick(2.0, 0.0);
        }
        assert!(!sb.tick(2.0, 180.0));
        assert_eq!(sb.interval_s(), 600);
    }

    #[test]
    fn test_heading_change_wraps() {
        assert_eq!(heading_change(350.0, 10.0), 20.0);
        assert_eq!(heading_change(10.0, 350.0), 20.0);
        assert_eq!(heading_change(0.0, 180.0), 180.0);
        assert_eq!(heading_change(90.0, 90.0), 0.0);
    }
}
