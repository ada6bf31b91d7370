use crate::detectors::power::default_window_len;
use crate::error::{Result, RippleError};
use crate::filter::validate_passband;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Detection parameters. Every field has a default, so a TOML file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    /// (low, high) thresholds in multiples of the NSS standard deviation
    pub thresholds: (f64, f64),
    /// (minimum inter-ripple interval, maximum ripple duration) in ms; a
    /// `None` maximum disables the upper duration bound
    pub durations_ms: (f64, Option<f64>),
    /// Minimum ripple duration in ms
    pub min_duration_ms: f64,
    /// Time intervals (s) used as the normalization baseline; empty uses everything
    pub restrict: Vec<(f64, f64)>,
    pub frequency_hz: f64,
    /// Reuse a standard deviation from an earlier run
    pub stdev: Option<f64>,
    pub passband_hz: (f64, f64),
    pub filter_order: usize,
    /// Smoothing window in samples (odd); defaults to 11
    pub window_len: Option<usize>,
    /// Reject events whose EMG estimate exceeds this value; `None` disables
    pub emg_threshold: Option<f64>,
    /// Interpret `thresholds` in squared-signal units instead of stdev multiples
    pub absolute_thresholds: bool,
    /// Band just above the ripple band used to reject broadband transients
    pub above_band_hz: Option<(f64, f64)>,
    /// Write the event collection next to the session data
    pub persist: bool,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            thresholds: (2.0, 5.0),
            durations_ms: (30.0, Some(100.0)),
            min_duration_ms: 20.0,
            restrict: Vec::new(),
            frequency_hz: 1250.0,
            stdev: None,
            passband_hz: (130.0, 200.0),
            filter_order: 4,
            window_len: None,
            emg_threshold: Some(0.9),
            absolute_thresholds: false,
            above_band_hz: None,
            persist: false,
        }
    }
}

impl RippleConfig {
    pub fn window_len(&self) -> usize {
        self.window_len
            .unwrap_or_else(|| default_window_len(self.frequency_hz))
    }

    /// Inter-ripple gap in samples; gaps strictly shorter than this merge.
    pub fn merge_gap_samples(&self) -> usize {
        (self.durations_ms.0 / 1000.0 * self.frequency_hz).ceil() as usize
    }

    /// Upper duration bound in seconds, `None` when disabled.
    pub fn max_duration_s(&self) -> Option<f64> {
        self.durations_ms
            .1
            .filter(|ms| ms.is_finite())
            .map(|ms| ms / 1000.0)
    }

    /// Same config with an infinite maximum duration spelled as `None`, the
    /// form that survives JSON persistence.
    pub fn normalized(mut self) -> Self {
        if self.durations_ms.1 == Some(f64::INFINITY) {
            self.durations_ms.1 = None;
        }
        self
    }

    pub fn min_duration_s(&self) -> f64 {
        self.min_duration_ms / 1000.0
    }

    /// EMG threshold if EMG rejection is enabled (zero counts as disabled).
    pub fn emg_enabled(&self) -> Option<f64> {
        self.emg_threshold.filter(|&t| t > 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.frequency_hz > 0.0) || !self.frequency_hz.is_finite() {
            return Err(RippleError::invalid(
                "frequency_hz",
                format!("sampling rate must be positive, got {}", self.frequency_hz),
            ));
        }
        let win = self.window_len();
        if win == 0 || win % 2 == 0 {
            return Err(RippleError::invalid(
                "window_len",
                format!("window length must be odd, got {win}"),
            ));
        }
        let (low, high) = self.thresholds;
        if !low.is_finite() || !high.is_finite() {
            return Err(RippleError::invalid(
                "thresholds",
                format!("thresholds must be finite, got ({low}, {high})"),
            ));
        }
        if !(low < high) {
            return Err(RippleError::invalid(
                "thresholds",
                format!("low threshold {low} must be below high threshold {high}"),
            ));
        }
        let (gap, max) = self.durations_ms;
        let max_ok = max.map_or(true, |m| m > 0.0);
        let finite = gap.is_finite() && self.min_duration_ms.is_finite();
        if !finite || !(gap >= 0.0) || !max_ok || !(self.min_duration_ms >= 0.0) {
            return Err(RippleError::invalid(
                "durations_ms",
                "durations must be finite and non-negative, the maximum positive or disabled",
            ));
        }
        if let Some(max) = max.filter(|m| self.min_duration_ms > *m) {
            return Err(RippleError::invalid(
                "min_duration_ms",
                format!("minimum duration {} ms exceeds maximum {max} ms", self.min_duration_ms),
            ));
        }
        validate_passband(self.frequency_hz, self.passband_hz)?;
        if let Some(band) = self.above_band_hz {
            validate_passband(self.frequency_hz, band)?;
        }
        if self.filter_order == 0 {
            return Err(RippleError::invalid("filter_order", "order must be at least 1"));
        }
        if let Some(sd) = self.stdev {
            if !(sd > 0.0) || !sd.is_finite() {
                return Err(RippleError::invalid(
                    "stdev",
                    format!("prior standard deviation must be positive, got {sd}"),
                ));
            }
        }
        if let Some(t) = self.emg_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(RippleError::invalid(
                    "emg_threshold",
                    format!("EMG threshold must lie in [0, 1], got {t}"),
                ));
            }
        }
        if let Some(&(a, b)) = self
            .restrict
            .iter()
            .find(|(a, b)| !(a <= b) || !a.is_finite() || !b.is_finite())
        {
            return Err(RippleError::invalid(
                "restrict",
                format!("interval ({a}, {b}) is inverted or unbounded"),
            ));
        }
        Ok(())
    }
}

/// Read a TOML config file; missing keys keep their defaults.
pub fn load_config(path: &Path) -> anyhow::Result<RippleConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: RippleConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RippleConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.window_len(), 11);
        // 30 ms at 1250 Hz is 37.5 samples: gaps up to 37 merge
        assert_eq!(cfg.merge_gap_samples(), 38);
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: RippleConfig = toml::from_str(
            r#"
            thresholds = [3, 7]
            passband_hz = [120.0, 220.0]
            restrict = [[0.0, 10.0], [20.0, 30.0]]
            stdev = 4.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.thresholds, (3.0, 7.0));
        assert_eq!(cfg.restrict.len(), 2);
        assert_eq!(cfg.stdev, Some(4.5));
        assert_eq!(cfg.durations_ms, (30.0, Some(100.0)));
        cfg.validate().unwrap();
    }

    #[test]
    fn infinite_max_duration_disables_the_bound() {
        let cfg: RippleConfig = toml::from_str("durations_ms = [30.0, inf]").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.max_duration_s(), None);
        let cfg = cfg.normalized();
        assert_eq!(cfg.durations_ms, (30.0, None));
        assert_eq!(RippleConfig::default().max_duration_s(), Some(0.1));
    }

    #[test]
    fn rejects_values_json_cannot_hold() {
        for cfg in [
            RippleConfig {
                thresholds: (2.0, f64::INFINITY),
                ..RippleConfig::default()
            },
            RippleConfig {
                durations_ms: (f64::NAN, Some(100.0)),
                ..RippleConfig::default()
            },
            RippleConfig {
                durations_ms: (30.0, Some(f64::NAN)),
                ..RippleConfig::default()
            },
            RippleConfig {
                restrict: vec![(0.0, f64::INFINITY)],
                ..RippleConfig::default()
            },
        ] {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn rejects_malformed_parameters() {
        let even = RippleConfig {
            window_len: Some(10),
            ..RippleConfig::default()
        };
        assert!(matches!(
            even.validate(),
            Err(RippleError::InvalidParameter { name: "window_len", .. })
        ));

        let inverted = RippleConfig {
            thresholds: (5.0, 2.0),
            ..RippleConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(RippleError::InvalidParameter { name: "thresholds", .. })
        ));

        let durations = RippleConfig {
            min_duration_ms: 200.0,
            ..RippleConfig::default()
        };
        assert!(durations.validate().is_err());

        let emg = RippleConfig {
            emg_threshold: Some(1.5),
            ..RippleConfig::default()
        };
        assert!(emg.validate().is_err());
    }

    #[test]
    fn zero_emg_threshold_disables_rejection() {
        let cfg = RippleConfig {
            emg_threshold: Some(0.0),
            ..RippleConfig::default()
        };
        assert_eq!(cfg.emg_enabled(), None);
    }
}
