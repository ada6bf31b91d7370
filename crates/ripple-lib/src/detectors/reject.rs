use crate::emg::EmgSeries;
use crate::events::RippleEvent;
use crate::signal::{nearest_index, SpanCursor};

/// Slack for durations computed as differences of timestamps.
const DURATION_EPS: f64 = 1e-9;

/// Events split by the duration bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationSplit {
    pub kept: Vec<RippleEvent>,
    pub too_long: Vec<RippleEvent>,
    pub too_short: Vec<RippleEvent>,
}

/// Keep events with `min <= duration <= max` (seconds).
///
/// `None` disables a bound. Durations are checked against the maximum first,
/// matching the order the stage counts are reported in.
pub fn filter_by_duration(
    events: &[RippleEvent],
    min_s: Option<f64>,
    max_s: Option<f64>,
) -> DurationSplit {
    let min_s = min_s.unwrap_or(0.0);
    let max_s = max_s.unwrap_or(f64::INFINITY);
    let mut split = DurationSplit::default();
    for &event in events {
        let duration = event.duration();
        debug_assert!(!duration.is_nan(), "event with NaN duration: {event:?}");
        if duration > max_s + DURATION_EPS {
            split.too_long.push(event);
        } else if duration < min_s - DURATION_EPS {
            split.too_short.push(event);
        } else {
            split.kept.push(event);
        }
    }
    split
}

/// Events split into survivors and rejected ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rejection {
    pub kept: Vec<RippleEvent>,
    pub rejected: Vec<RippleEvent>,
}

/// Reject events during which the noise channel's NSS exceeds `high`.
///
/// `events` must be sorted by start time; the lookup into the noise
/// timestamps resumes where the previous event ended.
pub fn reject_by_noise(
    events: &[RippleEvent],
    noise_timestamps: &[f64],
    noise_nss: &[f64],
    high: f64,
) -> Rejection {
    let mut cursor = SpanCursor::new(noise_timestamps);
    let mut out = Rejection::default();
    for &event in events {
        let noisy = cursor
            .span(event.start, event.end)
            .map(|(first, last)| noise_nss[first..=last].iter().any(|&v| v > high))
            .unwrap_or(false);
        if noisy {
            out.rejected.push(event);
        } else {
            out.kept.push(event);
        }
    }
    out
}

/// Reject events whose nearest EMG sample (to the event start) exceeds `threshold`.
pub fn reject_by_emg(events: &[RippleEvent], emg: &EmgSeries, threshold: f64) -> Rejection {
    let mut out = Rejection::default();
    for &event in events {
        let noisy = nearest_index(&emg.timestamps, event.start)
            .map(|i| emg.values[i] > threshold)
            .unwrap_or(false);
        if noisy {
            out.rejected.push(event);
        } else {
            out.kept.push(event);
        }
    }
    out
}

/// Merge rejected sets and order them by start time.
pub fn sorted_union(a: &[RippleEvent], b: &[RippleEvent]) -> Vec<RippleEvent> {
    let mut all: Vec<RippleEvent> = a.iter().chain(b).copied().collect();
    all.sort_by(|x, y| x.start.total_cmp(&y.start));
    all
}
