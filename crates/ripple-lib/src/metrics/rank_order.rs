use serde::{Deserialize, Serialize};

/// Sorted spike times of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpikes {
    pub unit: u32,
    pub times: Vec<f64>,
}

/// Which spike time represents a unit inside an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankBy {
    #[default]
    First,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankOrderOptions {
    pub rank_by: RankBy,
    /// Events with fewer active units are skipped
    pub min_units: usize,
}

impl Default for RankOrderOptions {
    fn default() -> Self {
        Self {
            rank_by: RankBy::First,
            min_units: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankOrderResult {
    /// Unit ids, in the column order used below
    pub units: Vec<u32>,
    /// Normalized rank per event and unit; `None` for silent units
    pub ranks: Vec<Vec<Option<f64>>>,
    pub skipped: Vec<bool>,
    /// Mean normalized rank per unit over the events it was active in
    pub template: Vec<Option<f64>>,
    /// Spearman correlation of each event with the template
    pub correlations: Vec<Option<f64>>,
}

/// Rank-order analysis of unit firing inside events.
pub fn rank_order(
    spikes: &[UnitSpikes],
    events: &[(f64, f64)],
    opts: &RankOrderOptions,
) -> RankOrderResult {
    let units: Vec<u32> = spikes.iter().map(|u| u.unit).collect();
    let mut ranks = Vec::with_capacity(events.len());
    let mut skipped = Vec::with_capacity(events.len());
    for &(start, end) in events {
        let times: Vec<Option<f64>> = spikes
            .iter()
            .map(|u| representative_time(&u.times, start, end, opts.rank_by))
            .collect();
        let active = times.iter().flatten().count();
        if active == 0 || active < opts.min_units {
            ranks.push(vec![None; spikes.len()]);
            skipped.push(true);
        } else {
            ranks.push(normalized_ranks(&times));
            skipped.push(false);
        }
    }

    let template: Vec<Option<f64>> = (0..spikes.len())
        .map(|u| {
            let vals: Vec<f64> = ranks.iter().filter_map(|row| row[u]).collect();
            (!vals.is_empty()).then(|| vals.iter().sum::<f64>() / vals.len() as f64)
        })
        .collect();

    let correlations = ranks
        .iter()
        .zip(&skipped)
        .map(|(row, &skip)| if skip { None } else { spearman(row, &template) })
        .collect();

    RankOrderResult {
        units,
        ranks,
        skipped,
        template,
        correlations,
    }
}

fn representative_time(times: &[f64], start: f64, end: f64, by: RankBy) -> Option<f64> {
    let from = times.partition_point(|&t| t < start);
    let to = times.partition_point(|&t| t <= end);
    let inside = times.get(from..to)?;
    match by {
        RankBy::First => inside.first().copied(),
        RankBy::Mean if inside.is_empty() => None,
        RankBy::Mean => Some(inside.iter().sum::<f64>() / inside.len() as f64),
    }
}

/// Ranks of the present values scaled to [0, 1]; one active unit sits at 0.5.
fn normalized_ranks(times: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<f64> = times.iter().flatten().copied().collect();
    let n = present.len();
    let ranks = average_ranks(&present);
    let mut it = ranks.into_iter();
    times
        .iter()
        .map(|t| {
            t.and_then(|_| it.next()).map(|r| {
                if n == 1 {
                    0.5
                } else {
                    (r - 1.0) / (n as f64 - 1.0)
                }
            })
        })
        .collect()
}

/// 1-based ranks with ties sharing their mean rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman correlation over positions present in both; `None` with fewer
/// than two pairs or no spread.
fn spearman(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    pearson(&average_ranks(&xs), &average_ranks(&ys))
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}
