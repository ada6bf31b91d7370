use crate::error::{Result, RippleError};
use serde::{Deserialize, Serialize};

/// Sampled trace with explicit timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Nominal sampling frequency in Hz
    pub fs: f64,
    /// Sample times in seconds, strictly increasing
    pub timestamps: Vec<f64>,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    /// Uniformly sampled series starting at `t0` seconds.
    pub fn uniform(fs: f64, data: Vec<f64>, t0: f64) -> Self {
        let timestamps = (0..data.len()).map(|i| t0 + i as f64 / fs).collect();
        Self {
            fs,
            timestamps,
            data,
        }
    }

    /// Build a series from explicit timestamps, checking alignment and ordering.
    pub fn with_timestamps(fs: f64, timestamps: Vec<f64>, data: Vec<f64>) -> Result<Self> {
        let ts = Self {
            fs,
            timestamps,
            data,
        };
        ts.validate()?;
        Ok(ts)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fs > 0.0) {
            return Err(RippleError::invalid(
                "frequency",
                format!("sampling rate must be positive, got {}", self.fs),
            ));
        }
        if self.timestamps.len() != self.data.len() {
            return Err(RippleError::LengthMismatch {
                what: "timestamps/samples",
                left: self.timestamps.len(),
                right: self.data.len(),
            });
        }
        if let Some(i) = self.timestamps.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(RippleError::invalid(
                "timestamps",
                format!("timestamps must be strictly increasing (index {})", i + 1),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }

    /// Same timestamps, new values.
    pub fn with_data(&self, data: Vec<f64>) -> Self {
        Self {
            fs: self.fs,
            timestamps: self.timestamps.clone(),
            data,
        }
    }

    /// Mask of samples whose timestamp falls inside any of `intervals` (closed bounds).
    pub fn mask_within(&self, intervals: &[(f64, f64)]) -> Vec<bool> {
        self.timestamps
            .iter()
            .map(|&t| intervals.iter().any(|&(a, b)| t >= a && t <= b))
            .collect()
    }
}

/// Index of the sample whose timestamp is closest to `t`.
///
/// `timestamps` must be sorted. Ties resolve to the earlier sample.
pub fn nearest_index(timestamps: &[f64], t: f64) -> Option<usize> {
    if timestamps.is_empty() {
        return None;
    }
    let upper = timestamps.partition_point(|&x| x < t);
    if upper == 0 {
        return Some(0);
    }
    if upper == timestamps.len() {
        return Some(timestamps.len() - 1);
    }
    let lower = upper - 1;
    if (t - timestamps[lower]) <= (timestamps[upper] - t) {
        Some(lower)
    } else {
        Some(upper)
    }
}

/// Incremental lookup of index spans `[first, last]` for time-ordered windows.
///
/// Each call resumes from where the previous one stopped, so a sequence of
/// sorted windows costs one pass over the timestamps.
#[derive(Debug)]
pub struct SpanCursor<'a> {
    timestamps: &'a [f64],
    next: usize,
}

impl<'a> SpanCursor<'a> {
    pub fn new(timestamps: &'a [f64]) -> Self {
        Self {
            timestamps,
            next: 0,
        }
    }

    /// Indices of samples with `start <= t <= end`, or `None` if no sample falls inside.
    pub fn span(&mut self, start: f64, end: f64) -> Option<(usize, usize)> {
        let ts = self.timestamps;
        let mut first = self.next;
        while first < ts.len() && ts[first] < start {
            first += 1;
        }
        let mut last = first;
        while last < ts.len() && ts[last] <= end {
            last += 1;
        }
        if last == first {
            self.next = first;
            return None;
        }
        // windows may share a boundary sample, so resume at the last sample
        self.next = last - 1;
        Some((first, last - 1))
    }
}
