use crate::emg::{EmgSeries, EmgSource};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct EmgRow {
    timestamp: f64,
    value: f64,
}

/// Read a stored EMG estimate from a CSV with `timestamp,value` columns.
pub fn read_emg_csv(path: &Path) -> Result<EmgSeries> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening EMG estimate {}", path.display()))?;
    let mut series = EmgSeries {
        timestamps: Vec::new(),
        values: Vec::new(),
    };
    for (idx, row) in reader.deserialize::<EmgRow>().enumerate() {
        let row = row.with_context(|| format!("parsing EMG row {}", idx + 1))?;
        series.timestamps.push(row.timestamp);
        series.values.push(row.value);
    }
    series
        .validate()
        .with_context(|| format!("invalid EMG estimate {}", path.display()))?;
    Ok(series)
}

/// EMG estimate stored next to the session data.
#[derive(Debug, Clone)]
pub struct CsvEmgSource {
    pub path: PathBuf,
}

impl EmgSource for CsvEmgSource {
    fn emg(&self) -> Result<EmgSeries> {
        read_emg_csv(&self.path)
    }
}
