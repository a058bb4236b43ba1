//! Run configuration for both roles.

use std::{path::PathBuf, time::Duration};

use crate::{errors::UdpPerfError, utils::pacing::MAX_DURATION};

/// UDP port the tracker listens on and the pacer sends to.
pub const DEFAULT_PORT: u16 = 43197;
/// Time between two statistic reports.
pub const NOTIFY_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_LOG_PATH: &str = "udperf.log";
pub const DEFAULT_INTERFACE: &str = "wlan0";

#[derive(Debug, Clone, PartialEq)]
pub struct PacerConfig {
    /// Target rate in bytes per second.
    pub rate_bytes_per_sec: f64,
    /// How long to keep sending.
    pub duration: Duration,
    pub notify_interval: Duration,
}

impl PacerConfig {
    pub fn new(rate_bytes_per_sec: f64, duration: Duration) -> Self {
        Self {
            rate_bytes_per_sec,
            duration,
            notify_interval: NOTIFY_INTERVAL,
        }
    }

    /// Rate given the way the command line takes it, in kilobytes per second.
    pub fn from_kbytes(rate_kbytes_per_sec: f64, duration: Duration) -> Self {
        Self::new(rate_kbytes_per_sec * 1000.0, duration)
    }

    pub fn with_notify_interval(mut self, notify_interval: Duration) -> Self {
        self.notify_interval = notify_interval;
        self
    }

    pub fn validate(&self) -> Result<(), UdpPerfError> {
        if !(self.rate_bytes_per_sec.is_finite() && self.rate_bytes_per_sec > 0.0) {
            return Err(UdpPerfError::InvalidConfig("rate must be a positive number"));
        }
        if self.duration.is_zero() {
            return Err(UdpPerfError::InvalidConfig("duration must be positive"));
        }
        if self.duration > MAX_DURATION {
            return Err(UdpPerfError::InvalidConfig("duration must not exceed one year"));
        }
        if self.notify_interval.is_zero() {
            return Err(UdpPerfError::InvalidConfig("notify interval must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub port: u16,
    pub notify_interval: Duration,
    /// Trace file, recreated for every session.
    pub log_path: PathBuf,
    /// Interface whose link quality is sampled.
    pub interface: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            notify_interval: NOTIFY_INTERVAL,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            interface: DEFAULT_INTERFACE.to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), UdpPerfError> {
        if self.notify_interval.is_zero() {
            return Err(UdpPerfError::InvalidConfig("notify interval must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kbytes() {
        let config = PacerConfig::from_kbytes(100.0, Duration::from_secs(2));
        assert_eq!(config.rate_bytes_per_sec, 100_000.0);
        assert_eq!(config.notify_interval, NOTIFY_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pacer_config() {
        let zero_rate = PacerConfig::new(0.0, Duration::from_secs(1));
        assert!(zero_rate.validate().is_err());

        let nan_rate = PacerConfig::new(f64::NAN, Duration::from_secs(1));
        assert!(nan_rate.validate().is_err());

        let zero_duration = PacerConfig::new(1000.0, Duration::ZERO);
        assert!(zero_duration.validate().is_err());

        let endless = PacerConfig::new(1000.0, Duration::from_secs_f64(1e19));
        assert!(matches!(
            endless.validate(),
            Err(UdpPerfError::InvalidConfig(_))
        ));

        let year = PacerConfig::new(1000.0, MAX_DURATION);
        assert!(year.validate().is_ok());

        let tiny_rate = PacerConfig::new(1e-20, Duration::from_secs(1));
        assert!(tiny_rate.validate().is_ok());

        let zero_interval =
            PacerConfig::new(1000.0, Duration::from_secs(1)).with_notify_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_tracker_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.port, 43197);
        assert_eq!(config.log_path, PathBuf::from("udperf.log"));
        assert_eq!(config.interface, "wlan0");
        assert!(config.validate().is_ok());
    }
}
