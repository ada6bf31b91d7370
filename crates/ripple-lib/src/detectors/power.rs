use crate::error::{Result, RippleError};

/// Default smoothing window, `round(11 * fs / fs)` samples.
pub fn default_window_len(fs: f64) -> usize {
    (11.0 * fs / fs).round() as usize
}

/// Normalized squared signal plus the standard deviation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub nss: Vec<f64>,
    pub mean: f64,
    pub stdev: f64,
}

pub fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x * x).collect()
}

/// Moving average realigned to be centred on each sample.
///
/// Runs the causal filter and shifts the output back by `(win - 1) / 2`;
/// the missing history and future are treated as zeros.
pub fn centered_moving_average(data: &[f64], win: usize) -> Result<Vec<f64>> {
    if win == 0 || win % 2 == 0 {
        return Err(RippleError::invalid(
            "window_len",
            format!("window length must be odd, got {win}"),
        ));
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let shift = (win - 1) / 2;
    let n = data.len();
    let mut out = vec![0.0; n];
    let mut acc = 0.0;
    // causal output at k lands on index k - shift
    for k in 0..n + shift {
        if k < n {
            acc += data[k];
        }
        if k >= win {
            acc -= data[k - win];
        }
        if k >= shift {
            out[k - shift] = acc / win as f64;
        }
    }
    Ok(out)
}

/// Z-score `signal` against the kept subset, optionally reusing a prior stdev.
///
/// The mean is always recomputed; `prior_stdev` only replaces the spread so
/// thresholds stay comparable across calls.
pub fn unity(signal: &[f64], prior_stdev: Option<f64>, keep: Option<&[bool]>) -> Result<Normalized> {
    if let Some(mask) = keep {
        if mask.len() != signal.len() {
            return Err(RippleError::LengthMismatch {
                what: "restrict mask/signal",
                left: mask.len(),
                right: signal.len(),
            });
        }
    }
    let kept: Vec<f64> = match keep {
        Some(mask) => signal
            .iter()
            .zip(mask)
            .filter(|(_, k)| **k)
            .map(|(&x, _)| x)
            .collect(),
        None => signal.to_vec(),
    };
    if kept.is_empty() {
        return Err(RippleError::DegenerateSignal {
            reason: "no samples available to estimate the baseline".into(),
        });
    }
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    let stdev = match prior_stdev {
        Some(sd) => sd,
        None => sample_stdev(&kept, mean),
    };
    if !(stdev > 0.0) || !stdev.is_finite() {
        return Err(RippleError::DegenerateSignal {
            reason: format!("standard deviation is {stdev}; normalization is undefined"),
        });
    }
    let nss = signal.iter().map(|x| (x - mean) / stdev).collect();
    Ok(Normalized { nss, mean, stdev })
}

fn sample_stdev(data: &[f64], mean: f64) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let ss = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    (ss / (data.len() as f64 - 1.0)).sqrt()
}

/// Square, smooth, and normalize a filtered trace.
pub fn normalize(
    filtered: &[f64],
    window_len: usize,
    prior_stdev: Option<f64>,
    restrict: Option<&[bool]>,
) -> Result<Normalized> {
    let smoothed = centered_moving_average(&square(filtered), window_len)?;
    unity(&smoothed, prior_stdev, restrict)
}
