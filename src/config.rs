use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MonitorError, Result};
use crate::models::Metric;

/// Sampling window and thresholds for a monitoring session.
///
/// Throttling starts when any averaged metric exceeds its threshold:
/// utilization against `gpu_use_avg`, temperature against `gpu_temp_avg`
/// and memory usage against `mem_use_avg`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Seconds between check cycles
    pub check_interval: f64,
    /// Samples kept per metric
    pub graph_length: usize,
    /// Average GPU utilization, percent
    pub gpu_use_avg: f64,
    /// Average GPU temperature, °C
    pub gpu_temp_avg: f64,
    /// Average memory used, percent
    pub mem_use_avg: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: 3.0,
            graph_length: 10,
            gpu_use_avg: 40.0,
            gpu_temp_avg: 53.0,
            mem_use_avg: 30.0,
        }
    }
}

impl MonitorConfig {
    /// Loads a TOML config file; absent fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.check_interval.is_finite() || self.check_interval <= 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "check_interval must be a positive number of seconds, got {}",
                self.check_interval
            )));
        }
        // Must convert to a non-zero Duration; the scheduler rejects a zero period
        match Duration::try_from_secs_f64(self.check_interval) {
            Ok(period) if !period.is_zero() => {}
            _ => {
                return Err(MonitorError::InvalidConfig(format!(
                    "check_interval is out of range: {}",
                    self.check_interval
                )))
            }
        }
        if self.graph_length == 0 {
            return Err(MonitorError::InvalidConfig(
                "graph_length must be at least 1".to_string(),
            ));
        }
        for metric in Metric::ALL {
            let threshold = self.threshold(metric);
            if !threshold.is_finite() {
                return Err(MonitorError::InvalidConfig(format!(
                    "{metric} threshold must be finite, got {threshold}"
                )));
            }
            if !(0.0..=100.0).contains(&threshold) {
                tracing::warn!(%metric, threshold, "threshold is outside 0..=100");
            }
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval)
    }

    pub fn threshold(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Utilization => self.gpu_use_avg,
            Metric::Temperature => self.gpu_temp_avg,
            Metric::MemoryUsed => self.mem_use_avg,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MonitorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.check_interval(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_non_positive_interval() {
        for interval in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = MonitorConfig {
                check_interval: interval,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(MonitorError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn rejects_interval_below_one_nanosecond() {
        let config = MonitorConfig {
            check_interval: 1e-10,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MonitorError::InvalidConfig(_))
        ));

        let config = MonitorConfig {
            check_interval: 1e-9,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.check_interval(), Duration::from_nanos(1));
    }

    #[test]
    fn rejects_empty_window() {
        let config = MonitorConfig {
            graph_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_threshold_is_allowed() {
        let config = MonitorConfig {
            mem_use_avg: 120.0,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn rejects_nan_threshold() {
        let config = MonitorConfig {
            gpu_temp_avg: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn thresholds_map_one_to_one() {
        let config = MonitorConfig {
            gpu_use_avg: 1.0,
            gpu_temp_avg: 2.0,
            mem_use_avg: 3.0,
            ..Default::default()
        };
        assert_eq!(config.threshold(Metric::Utilization), 1.0);
        assert_eq!(config.threshold(Metric::Temperature), 2.0);
        assert_eq!(config.threshold(Metric::MemoryUsed), 3.0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "check_interval = 0.5\ngpu_temp_avg = 70").unwrap();

        let config = MonitorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.check_interval, 0.5);
        assert_eq!(config.gpu_temp_avg, 70.0);
        assert_eq!(config.graph_length, 10);
        assert_eq!(config.gpu_use_avg, 40.0);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gpu_use = 50").unwrap();
        assert!(matches!(
            MonitorConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            MonitorConfig::from_file("/nonexistent/gpu-throttle.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
