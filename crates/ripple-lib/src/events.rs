use crate::config::RippleConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Version of the persisted `EventCollection` layout.
pub const SCHEMA_VERSION: u32 = 1;

/// One detected ripple. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RippleEvent {
    pub start: f64,
    /// Time of the most negative filtered sample inside the event
    pub peak: f64,
    pub end: f64,
    /// Maximum normalized squared signal inside the event
    pub peak_power: f64,
}

impl RippleEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_ordered(&self) -> bool {
        self.start < self.peak && self.peak < self.end
    }
}

/// Column projection of a list of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventColumns {
    pub start: Vec<f64>,
    pub peak: Vec<f64>,
    pub end: Vec<f64>,
    pub peak_power: Vec<f64>,
}

impl EventColumns {
    pub fn from_events(events: &[RippleEvent]) -> Self {
        Self {
            start: events.iter().map(|e| e.start).collect(),
            peak: events.iter().map(|e| e.peak).collect(),
            end: events.iter().map(|e| e.end).collect(),
            peak_power: events.iter().map(|e| e.peak_power).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    pub fn events(&self) -> Vec<RippleEvent> {
        (0..self.len())
            .map(|i| RippleEvent {
                start: self.start[i],
                peak: self.peak[i],
                end: self.end[i],
                peak_power: self.peak_power[i],
            })
            .collect()
    }

    /// `(start, end)` pairs, the shape downstream metrics consume.
    pub fn intervals(&self) -> Vec<(f64, f64)> {
        self.start.iter().copied().zip(self.end.iter().copied()).collect()
    }
}

/// Survivor count after every pipeline stage.
///
/// Optional stages that did not run are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub thresholding: usize,
    pub merging: usize,
    pub peak_threshold: usize,
    pub above_band: Option<usize>,
    pub max_duration: usize,
    pub min_duration: usize,
    pub noise: Option<usize>,
    pub emg: Option<usize>,
}

impl StageCounts {
    /// Number of events that survived the last stage that ran.
    pub fn final_count(&self) -> usize {
        self.emg.or(self.noise).unwrap_or(self.min_duration)
    }
}

impl fmt::Display for StageCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "After detection by thresholding: {} events.", self.thresholding)?;
        writeln!(f, "After ripple merge: {} events.", self.merging)?;
        writeln!(f, "After peak thresholding: {} events.", self.peak_threshold)?;
        if let Some(n) = self.above_band {
            writeln!(f, "After above-band comparison: {n} events.")?;
        }
        writeln!(f, "After max duration test: {} events.", self.max_duration)?;
        write!(f, "After min duration test: {} events.", self.min_duration)?;
        if let Some(n) = self.noise {
            write!(f, "\nAfter ripple-band noise removal: {n} events.")?;
        }
        if let Some(n) = self.emg {
            write!(f, "\nAfter EMG noise removal: {n} events.")?;
        }
        Ok(())
    }
}

/// Identifies which recorded channel a trace came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelId {
    /// Zero-based channel index in the source file, when known
    pub index: Option<usize>,
    /// Source description (file path or "series")
    pub source: String,
}

impl ChannelId {
    pub fn series() -> Self {
        Self {
            index: None,
            source: "series".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub detector: String,
    pub version: String,
    pub detected_at: DateTime<Utc>,
    pub session: Option<String>,
    pub channel: ChannelId,
    pub noise_channel: Option<ChannelId>,
    pub restrict: Vec<(f64, f64)>,
    pub params: RippleConfig,
}

impl Provenance {
    pub fn new(params: &RippleConfig, channel: ChannelId) -> Self {
        Self {
            detector: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            detected_at: Utc::now(),
            session: None,
            channel,
            noise_channel: None,
            restrict: params.restrict.clone(),
            params: params.clone(),
        }
    }
}

/// Everything a detection run produces.
///
/// `noise_rejected` is `None` when no noise channel was used and an empty
/// column set when one was used but rejected nothing; `emg_rejected` follows
/// the same rule. `rejected` is their union, sorted by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCollection {
    pub schema_version: u32,
    pub accepted: EventColumns,
    pub rejected: EventColumns,
    pub noise_rejected: Option<EventColumns>,
    pub emg_rejected: Option<EventColumns>,
    /// Standard deviation used for normalization; `None` if nothing was normalized
    pub stdev: Option<f64>,
    pub counts: StageCounts,
    pub provenance: Provenance,
}

impl EventCollection {
    pub fn empty(stdev: Option<f64>, counts: StageCounts, provenance: Provenance) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            accepted: EventColumns::default(),
            rejected: EventColumns::default(),
            noise_rejected: None,
            emg_rejected: None,
            stdev,
            counts,
            provenance,
        }
    }

    pub fn accepted_events(&self) -> Vec<RippleEvent> {
        self.accepted.events()
    }

    pub fn rejected_events(&self) -> Vec<RippleEvent> {
        self.rejected.events()
    }
}

/// Conventional artifact location for a session: `<basepath>/<session>.ripples.events.json`.
pub fn artifact_path(basepath: &Path, session: &str) -> PathBuf {
    basepath.join(format!("{session}.ripples.events.json"))
}

pub fn save_events(path: &Path, events: &EventCollection) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, events)?;
    Ok(())
}

pub fn load_events(path: &Path) -> Result<EventCollection> {
    let file = fs::File::open(path)?;
    let events = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_collection() -> EventCollection {
        let accepted = [
            RippleEvent {
                start: 0.4,
                peak: 0.42,
                end: 0.448,
                peak_power: 12.5,
            },
            RippleEvent {
                start: 1.1,
                peak: 1.1234,
                end: 1.16,
                peak_power: 6.25,
            },
        ];
        let rejected = [RippleEvent {
            start: 0.7,
            peak: 0.71,
            end: 0.74,
            peak_power: 9.0,
        }];
        let mut provenance = Provenance::new(&RippleConfig::default(), ChannelId::series());
        provenance.session = Some("rat01_day2".into());
        EventCollection {
            schema_version: SCHEMA_VERSION,
            accepted: EventColumns::from_events(&accepted),
            rejected: EventColumns::from_events(&rejected),
            noise_rejected: Some(EventColumns::from_events(&rejected)),
            emg_rejected: None,
            stdev: Some(3.75),
            counts: StageCounts {
                thresholding: 5,
                merging: 4,
                peak_threshold: 3,
                above_band: None,
                max_duration: 3,
                min_duration: 3,
                noise: Some(2),
                emg: None,
            },
            provenance,
        }
    }

    #[test]
    fn persisted_collection_round_trips() {
        let dir = tempdir().unwrap();
        let path = artifact_path(dir.path(), "rat01_day2");
        let original = sample_collection();
        save_events(&path, &original).unwrap();
        let loaded = load_events(&path).unwrap();
        assert_eq!(loaded, original);
        assert!(path.ends_with("rat01_day2.ripples.events.json"));
    }

    #[test]
    fn absent_noise_channel_differs_from_empty_rejection() {
        let mut collection = sample_collection();
        collection.noise_rejected = Some(EventColumns::default());
        let used = serde_json::to_value(&collection).unwrap();
        collection.noise_rejected = None;
        let unused = serde_json::to_value(&collection).unwrap();
        assert!(used["noise_rejected"].is_object());
        assert!(unused["noise_rejected"].is_null());
    }

    #[test]
    fn columns_rebuild_events() {
        let collection = sample_collection();
        let events = collection.accepted_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(RippleEvent::is_ordered));
        assert_eq!(collection.accepted.intervals()[1], (1.1, 1.16));
    }

    #[test]
    fn stage_summary_lists_optional_stages_only_when_run() {
        let counts = sample_collection().counts;
        let text = counts.to_string();
        assert!(text.contains("After ripple-band noise removal: 2 events."));
        assert!(!text.contains("EMG"));
        assert_eq!(counts.final_count(), 2);
    }
}
