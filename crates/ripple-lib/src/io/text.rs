use crate::signal::TimeSeries;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a trace with one sample per line, ignoring blank/comment lines.
///
/// Lines hold either `value` or `timestamp value` (whitespace or comma
/// separated); every line must use the same layout. Without timestamps the
/// trace is uniformly sampled at `fs` from t = 0.
pub fn parse_trace(text: &str, fs: f64) -> Result<TimeSeries> {
    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    let mut columns = None;
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        let expected = *columns.get_or_insert(fields.len());
        if fields.len() != expected || !(1..=2).contains(&expected) {
            anyhow::bail!(
                "line {} has {} column(s), expected {}",
                idx + 1,
                fields.len(),
                expected.min(2)
            );
        }
        let parse = |s: &str| {
            s.parse::<f64>()
                .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))
        };
        if expected == 2 {
            timestamps.push(parse(fields[0])?);
        }
        values.push(parse(fields[expected - 1])?);
    }
    if columns == Some(2) {
        Ok(TimeSeries::with_timestamps(fs, timestamps, values)?)
    } else {
        Ok(TimeSeries::uniform(fs, values, 0.0))
    }
}

/// Read a text trace from disk.
pub fn read_trace(path: &Path, fs: f64) -> Result<TimeSeries> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_trace(&text, fs).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_column_is_uniformly_sampled() {
        let ts = parse_trace("# lfp\n1.0\n\n2.5\n-3\n", 1250.0).unwrap();
        assert_eq!(ts.data, vec![1.0, 2.5, -3.0]);
        assert!((ts.timestamps[2] - 2.0 / 1250.0).abs() < 1e-12);
    }

    #[test]
    fn two_columns_carry_timestamps() {
        let ts = parse_trace("10.0, 1\n10.5, 2\n11.0 3\n", 2.0).unwrap();
        assert_eq!(ts.timestamps, vec![10.0, 10.5, 11.0]);
        assert_eq!(ts.data, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mixed_layouts_are_rejected() {
        assert!(parse_trace("1.0\n2.0 3.0\n", 10.0).is_err());
        assert!(parse_trace("1 2 3\n", 10.0).is_err());
        assert!(parse_trace("abc\n", 10.0).is_err());
    }

    #[test]
    fn empty_input_is_an_empty_trace() {
        let ts = parse_trace("# nothing\n", 1250.0).unwrap();
        assert!(ts.is_empty());
    }
}
