use crate::metrics::rank_order::UnitSpikes;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SpikeRow {
    unit: u32,
    time: f64,
}

/// Read spike times from a CSV with `unit,time` columns, grouped by unit id.
///
/// Units come back in ascending id order with their spike times sorted.
pub fn read_spikes_csv(path: &Path) -> Result<Vec<UnitSpikes>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening spikes {}", path.display()))?;
    let mut by_unit: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (idx, row) in reader.deserialize::<SpikeRow>().enumerate() {
        let row = row.with_context(|| format!("parsing spike row {}", idx + 1))?;
        by_unit.entry(row.unit).or_default().push(row.time);
    }
    Ok(by_unit
        .into_iter()
        .map(|(unit, mut times)| {
            times.sort_by(f64::total_cmp);
            UnitSpikes { unit, times }
        })
        .collect())
}
