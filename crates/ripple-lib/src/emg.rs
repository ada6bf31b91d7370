use crate::error::{Result, RippleError};
use crate::filter::{BandFilter, ButterworthFft};
use crate::signal::TimeSeries;
use serde::{Deserialize, Serialize};

/// EMG artifact estimate in [0, 1]; high values mark muscle artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmgSeries {
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl EmgSeries {
    pub fn validate(&self) -> Result<()> {
        if self.timestamps.len() != self.values.len() {
            return Err(RippleError::LengthMismatch {
                what: "EMG timestamps/values",
                left: self.timestamps.len(),
                right: self.values.len(),
            });
        }
        if self.timestamps.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(RippleError::invalid(
                "emg",
                "EMG timestamps must be strictly increasing",
            ));
        }
        if let Some(v) = self.values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(RippleError::invalid(
                "emg",
                format!("EMG values must lie in [0, 1], found {v}"),
            ));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Anything that can provide an EMG estimate for the recording being analysed.
pub trait EmgSource {
    fn emg(&self) -> anyhow::Result<EmgSeries>;
}

/// Try a stored estimate first and compute one on demand if it is unavailable.
pub struct EmgWithFallback<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P: EmgSource, F: EmgSource> EmgSource for EmgWithFallback<P, F> {
    fn emg(&self) -> anyhow::Result<EmgSeries> {
        match self.primary.emg() {
            Ok(series) => Ok(series),
            Err(err) => {
                log::warn!("stored EMG estimate unavailable ({err:#}); computing it from the LFP");
                self.fallback.emg()
            }
        }
    }
}

impl EmgSource for EmgSeries {
    fn emg(&self) -> anyhow::Result<EmgSeries> {
        Ok(self.clone())
    }
}

/// EMG estimate from the mean pairwise correlation of high-frequency LFP.
#[derive(Debug, Clone)]
pub struct CorrelationEmg {
    pub channels: Vec<TimeSeries>,
    /// Band used to isolate muscle activity (Hz); the top edge is capped below Nyquist
    pub band_hz: (f64, f64),
    /// Correlation window length in seconds
    pub window_s: f64,
    /// Output sampling rate in Hz
    pub out_fs: f64,
}

impl CorrelationEmg {
    pub fn new(channels: Vec<TimeSeries>) -> Self {
        Self {
            channels,
            band_hz: (275.0, 600.0),
            window_s: 0.5,
            out_fs: 10.0,
        }
    }

    pub fn estimate(&self) -> Result<EmgSeries> {
        if self.channels.len() < 2 {
            return Err(RippleError::MissingCollaboratorData {
                what: format!(
                    "EMG estimation needs at least two channels, got {}",
                    self.channels.len()
                ),
            });
        }
        let reference = &self.channels[0];
        let n = reference.len();
        if let Some(other) = self.channels.iter().find(|c| c.len() != n) {
            return Err(RippleError::LengthMismatch {
                what: "EMG channels",
                left: n,
                right: other.len(),
            });
        }
        if n == 0 {
            return Ok(EmgSeries {
                timestamps: Vec::new(),
                values: Vec::new(),
            });
        }
        let fs = reference.fs;
        let band = (self.band_hz.0, self.band_hz.1.min(0.48 * fs));
        let filtered = self
            .channels
            .iter()
            .map(|ch| ButterworthFft.filter(&ch.data, fs, band, 4))
            .collect::<Result<Vec<_>>>()?;

        let half = ((self.window_s * fs / 2.0).round() as usize).max(1);
        let step = ((fs / self.out_fs).round() as usize).max(1);
        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        let mut center = 0;
        while center < n {
            let lo = center.saturating_sub(half);
            let hi = (center + half).min(n - 1);
            let mut sum = 0.0;
            let mut pairs = 0usize;
            for a in 0..filtered.len() {
                for b in a + 1..filtered.len() {
                    sum += pearson(&filtered[a][lo..=hi], &filtered[b][lo..=hi]);
                    pairs += 1;
                }
            }
            timestamps.push(reference.timestamps[center]);
            values.push((sum / pairs as f64).clamp(0.0, 1.0));
            center += step;
        }
        Ok(EmgSeries { timestamps, values })
    }
}

impl EmgSource for CorrelationEmg {
    fn emg(&self) -> anyhow::Result<EmgSeries> {
        Ok(self.estimate()?)
    }
}

/// Pearson correlation; zero when either side has no variance.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va == 0.0 || vb == 0.0 {
        return 0.0;
    }
    cov / (va * vb).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn shared_broadband_activity_scores_high() {
        let fs = 1250.0;
        let n = 2500;
        let mut rng = StdRng::seed_from_u64(7);
        let common = noise(&mut rng, n);
        let channels: Vec<TimeSeries> = (0..3)
            .map(|_| {
                let own = noise(&mut rng, n);
                let data = common.iter().zip(&own).map(|(c, o)| c + 0.05 * o).collect();
                TimeSeries::uniform(fs, data, 0.0)
            })
            .collect();
        let emg = CorrelationEmg::new(channels).estimate().unwrap();
        assert_eq!(emg.timestamps.len(), 20);
        assert!(emg.values.iter().all(|&v| v > 0.8), "{:?}", emg.values);
        emg.validate().unwrap();
    }

    #[test]
    fn independent_channels_score_low() {
        let fs = 1250.0;
        let mut rng = StdRng::seed_from_u64(11);
        let channels: Vec<TimeSeries> = (0..3)
            .map(|_| TimeSeries::uniform(fs, noise(&mut rng, 2500), 0.0))
            .collect();
        let emg = CorrelationEmg::new(channels).estimate().unwrap();
        let mean = emg.values.iter().sum::<f64>() / emg.values.len() as f64;
        assert!(mean < 0.2, "mean EMG {mean}");
    }

    #[test]
    fn single_channel_is_missing_data() {
        let ch = TimeSeries::uniform(1250.0, vec![0.0; 100], 0.0);
        let err = CorrelationEmg::new(vec![ch]).estimate();
        assert!(matches!(err, Err(RippleError::MissingCollaboratorData { .. })));
    }

    struct Unavailable;
    impl EmgSource for Unavailable {
        fn emg(&self) -> anyhow::Result<EmgSeries> {
            anyhow::bail!("no EMG file")
        }
    }

    #[test]
    fn fallback_runs_when_primary_fails() {
        let stored = EmgSeries {
            timestamps: vec![0.0, 1.0],
            values: vec![0.2, 0.3],
        };
        let chain = EmgWithFallback {
            primary: Unavailable,
            fallback: stored.clone(),
        };
        assert_eq!(chain.emg().unwrap(), stored);
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        let emg = EmgSeries {
            timestamps: vec![0.0, 1.0],
            values: vec![0.2, 1.3],
        };
        assert!(emg.validate().is_err());
    }
}
