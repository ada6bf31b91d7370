use crate::error::{Result, RippleError};
use serde::{Deserialize, Serialize};

/// Closed index interval into the sample series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub stop: usize,
}

impl Interval {
    pub fn new(start: usize, stop: usize) -> Self {
        debug_assert!(start <= stop);
        Self { start, stop }
    }
}

/// Interval that passed the peak threshold, with its NSS maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub interval: Interval,
    pub peak_power: f64,
}

/// Output of every segmentation pass, kept for stage diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub crossings: Vec<Interval>,
    pub merged: Vec<Interval>,
    pub candidates: Vec<Candidate>,
}

/// Run thresholding, merging and peak validation in order.
///
/// An empty `crossings` list means detection by thresholding failed; the
/// later passes are then empty as well.
pub fn segment(nss: &[f64], low: f64, high: f64, merge_gap_samples: usize) -> Result<Segmentation> {
    if !(low < high) {
        return Err(RippleError::invalid(
            "thresholds",
            format!("low threshold {low} must be below high threshold {high}"),
        ));
    }
    let crossings = threshold_crossings(nss, low);
    if crossings.is_empty() {
        return Ok(Segmentation::default());
    }
    let merged = merge_intervals(&crossings, merge_gap_samples);
    let candidates = apply_peak_threshold(nss, &merged, high);
    Ok(Segmentation {
        crossings,
        merged,
        candidates,
    })
}

/// Fully bounded excursions of `nss` above `low`, bracketed by the last
/// sample at or below `low` on each side.
///
/// Excursions already running at the first sample or still running at the
/// last one are dropped. NaN samples count as below threshold.
pub fn threshold_crossings(nss: &[f64], low: f64) -> Vec<Interval> {
    let above = |i: usize| nss[i] > low;
    let mut starts = Vec::new();
    let mut stops = Vec::new();
    for i in 0..nss.len().saturating_sub(1) {
        match (above(i), above(i + 1)) {
            (false, true) => starts.push(i),
            (true, false) => stops.push(i + 1),
            _ => {}
        }
    }
    // falling edge before any rising edge: the series started above threshold
    let started_above = match (starts.first(), stops.first()) {
        (Some(&start), Some(&stop)) => stop < start,
        (None, Some(_)) => true,
        _ => false,
    };
    if started_above {
        stops.remove(0);
    }
    // rising edge after the last falling edge: the series ended above threshold
    let ended_above = match (starts.last(), stops.last()) {
        (Some(&start), Some(&stop)) => start > stop,
        (Some(_), None) => true,
        _ => false,
    };
    if ended_above {
        starts.pop();
    }
    debug_assert_eq!(starts.len(), stops.len());
    starts
        .into_iter()
        .zip(stops)
        .map(|(start, stop)| Interval::new(start, stop))
        .collect()
}

/// Greedy left-to-right merge of intervals closer than `gap` samples.
pub fn merge_intervals(intervals: &[Interval], gap: usize) -> Vec<Interval> {
    let mut out = Vec::new();
    let mut iter = intervals.iter().copied();
    let Some(mut running) = iter.next() else {
        return out;
    };
    for next in iter {
        if next.start.saturating_sub(running.stop) < gap {
            running.stop = running.stop.max(next.stop);
        } else {
            out.push(running);
            running = next;
        }
    }
    out.push(running);
    out
}

/// Keep intervals whose NSS maximum exceeds `high`.
pub fn apply_peak_threshold(nss: &[f64], intervals: &[Interval], high: f64) -> Vec<Candidate> {
    intervals
        .iter()
        .filter_map(|&interval| {
            let peak = max_in(nss, interval)?;
            (peak > high).then_some(Candidate {
                interval,
                peak_power: peak,
            })
        })
        .collect()
}

/// Keep candidates whose ripple-band peak beats the band just above it.
pub fn apply_above_band(candidates: &[Candidate], above_nss: &[f64]) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| match max_in(above_nss, c.interval) {
            Some(above) => c.peak_power > above,
            None => true,
        })
        .copied()
        .collect()
}

/// Largest non-NaN value in the interval.
pub(crate) fn max_in(values: &[f64], interval: Interval) -> Option<f64> {
    values
        .get(interval.start..=interval.stop)?
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}
