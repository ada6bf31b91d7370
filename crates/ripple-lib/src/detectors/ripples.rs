use crate::{
    config::RippleConfig,
    detectors::{
        power::{self, Normalized},
        reject::{filter_by_duration, reject_by_emg, reject_by_noise, sorted_union},
        segment::{apply_above_band, segment, Candidate},
    },
    emg::EmgSource,
    error::{Result, RippleError},
    events::{EventCollection, EventColumns, Provenance, RippleEvent, StageCounts, SCHEMA_VERSION},
    filter::{BandFilter, ButterworthFft},
    signal::TimeSeries,
    source::ChannelTrace,
};
use log::{debug, info, warn};

/// Ripple detector: band-pass, normalize, segment, then reject.
///
/// Every call to [`RippleDetector::detect`] is independent; nothing is cached
/// between runs.
#[derive(Debug, Clone)]
pub struct RippleDetector<F = ButterworthFft> {
    config: RippleConfig,
    filter: F,
}

impl RippleDetector<ButterworthFft> {
    pub fn new(config: RippleConfig) -> Result<Self> {
        Self::with_filter(config, ButterworthFft)
    }
}

impl<F: BandFilter> RippleDetector<F> {
    pub fn with_filter(config: RippleConfig, filter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.normalized(),
            filter,
        })
    }

    pub fn config(&self) -> &RippleConfig {
        &self.config
    }

    /// Run the full pipeline on `trace`.
    ///
    /// `noise` is a second channel whose ripple-band power vetoes events;
    /// `emg` is consulted only when the EMG threshold is enabled.
    pub fn detect(
        &self,
        trace: &ChannelTrace,
        noise: Option<&ChannelTrace>,
        emg: Option<&dyn EmgSource>,
    ) -> Result<EventCollection> {
        let series = &trace.series;
        series.validate()?;
        let cfg = self.effective_config(series.fs)?;
        debug!("ripple detection parameters: {cfg:?}");

        let mut provenance = Provenance::new(&cfg, trace.channel.clone());
        provenance.noise_channel = noise.map(|n| n.channel.clone());
        let mut counts = StageCounts::default();

        let emg = match (cfg.emg_enabled(), emg) {
            (Some(threshold), Some(source)) => Some((threshold, source)),
            (Some(_), None) => {
                warn!("EMG threshold set but no EMG source supplied; skipping EMG rejection");
                None
            }
            (None, _) => None,
        };
        let ran = RanStages {
            noise: noise.is_some(),
            emg: emg.is_some(),
        };

        if series.is_empty() {
            warn!("empty input series; nothing to detect");
            return Ok(ran.empty_collection(cfg.stdev, counts, provenance));
        }
        if let Some(noise) = noise {
            check_noise(noise, &cfg)?;
        }

        let filtered = self.band(&series.data, &cfg, cfg.passband_hz)?;
        let restrict = (!cfg.restrict.is_empty()).then(|| series.mask_within(&cfg.restrict));
        let normalized =
            power::normalize(&filtered, cfg.window_len(), cfg.stdev, restrict.as_deref())?;
        let (low, high) = detection_thresholds(&cfg, &normalized);

        let seg = segment(&normalized.nss, low, high, cfg.merge_gap_samples())?;
        counts.thresholding = seg.crossings.len();
        if seg.crossings.is_empty() {
            warn!("detection by thresholding failed");
            return Ok(ran.empty_collection(Some(normalized.stdev), counts, provenance));
        }
        info!("after detection by thresholding: {} events", counts.thresholding);
        counts.merging = seg.merged.len();
        info!("after ripple merge: {} events", counts.merging);
        counts.peak_threshold = seg.candidates.len();
        info!("after peak thresholding: {} events", counts.peak_threshold);

        let mut candidates = seg.candidates;
        if let Some(band) = cfg.above_band_hz {
            let above = self.band(&series.data, &cfg, band)?;
            let above = power::normalize(
                &above,
                cfg.window_len(),
                Some(normalized.stdev),
                restrict.as_deref(),
            )?;
            candidates = apply_above_band(&candidates, &above.nss);
            counts.above_band = Some(candidates.len());
            info!("after above-band comparison: {} events", candidates.len());
        }

        let events: Vec<RippleEvent> = candidates
            .iter()
            .map(|c| to_event(series, &filtered, c))
            .collect();

        let split = filter_by_duration(
            &events,
            Some(cfg.min_duration_s()),
            cfg.max_duration_s(),
        );
        counts.max_duration = events.len() - split.too_long.len();
        info!("after max duration test: {} events", counts.max_duration);
        counts.min_duration = split.kept.len();
        info!("after min duration test: {} events", counts.min_duration);
        let mut accepted = split.kept;

        let mut noise_rejected = None;
        if let Some(noise) = noise {
            let outcome = self.reject_noise(&accepted, noise, &cfg, normalized.stdev, high)?;
            accepted = outcome.kept;
            counts.noise = Some(accepted.len());
            info!("after ripple-band noise removal: {} events", accepted.len());
            noise_rejected = Some(outcome.rejected);
        }

        let mut emg_rejected = None;
        if let Some((threshold, source)) = emg {
            let series = source.emg().map_err(|e| RippleError::MissingCollaboratorData {
                what: format!("EMG estimate: {e:#}"),
            })?;
            series.validate()?;
            let outcome = reject_by_emg(&accepted, &series, threshold);
            accepted = outcome.kept;
            counts.emg = Some(accepted.len());
            info!("after EMG noise removal: {} events", accepted.len());
            emg_rejected = Some(outcome.rejected);
        }

        let rejected = sorted_union(
            noise_rejected.as_deref().unwrap_or_default(),
            emg_rejected.as_deref().unwrap_or_default(),
        );
        Ok(EventCollection {
            schema_version: SCHEMA_VERSION,
            accepted: EventColumns::from_events(&accepted),
            rejected: EventColumns::from_events(&rejected),
            noise_rejected: noise_rejected.as_deref().map(EventColumns::from_events),
            emg_rejected: emg_rejected.as_deref().map(EventColumns::from_events),
            stdev: Some(normalized.stdev),
            counts,
            provenance,
        })
    }

    /// Config with the trace's sampling rate, revalidated against it.
    fn effective_config(&self, fs: f64) -> Result<RippleConfig> {
        let mut cfg = self.config.clone();
        if (cfg.frequency_hz - fs).abs() > 1e-9 {
            warn!(
                "configured frequency {} Hz differs from trace rate {} Hz; using the trace rate",
                cfg.frequency_hz, fs
            );
            cfg.frequency_hz = fs;
            cfg.validate()?;
        }
        Ok(cfg)
    }

    fn band(&self, data: &[f64], cfg: &RippleConfig, band: (f64, f64)) -> Result<Vec<f64>> {
        self.filter.filter(data, cfg.frequency_hz, band, cfg.filter_order)
    }

    fn reject_noise(
        &self,
        events: &[RippleEvent],
        noise: &ChannelTrace,
        cfg: &RippleConfig,
        stdev: f64,
        high: f64,
    ) -> Result<crate::detectors::reject::Rejection> {
        let series = &noise.series;
        if events.is_empty() {
            return Ok(Default::default());
        }
        let filtered = self.band(&series.data, cfg, cfg.passband_hz)?;
        let nss = power::normalize(&filtered, cfg.window_len(), Some(stdev), None)?;
        Ok(reject_by_noise(events, &series.timestamps, &nss.nss, high))
    }
}

/// Noise channel must be usable before any event can be checked against it.
fn check_noise(noise: &ChannelTrace, cfg: &RippleConfig) -> Result<()> {
    let series = &noise.series;
    series.validate()?;
    if series.is_empty() {
        return Err(RippleError::MissingCollaboratorData {
            what: format!("noise channel {} has no samples", noise.channel.source),
        });
    }
    if (series.fs - cfg.frequency_hz).abs() > 1e-9 {
        return Err(RippleError::invalid(
            "noise",
            format!(
                "noise channel sampled at {} Hz, ripple channel at {} Hz",
                series.fs, cfg.frequency_hz
            ),
        ));
    }
    Ok(())
}

/// Rejection stages requested for a run.
#[derive(Debug, Clone, Copy)]
struct RanStages {
    noise: bool,
    emg: bool,
}

impl RanStages {
    /// Empty result that still tells requested rejection stages from absent ones.
    fn empty_collection(
        self,
        stdev: Option<f64>,
        mut counts: StageCounts,
        provenance: Provenance,
    ) -> EventCollection {
        if self.noise {
            counts.noise = Some(0);
        }
        if self.emg {
            counts.emg = Some(0);
        }
        let mut collection = EventCollection::empty(stdev, counts, provenance);
        if self.noise {
            collection.noise_rejected = Some(EventColumns::default());
        }
        if self.emg {
            collection.emg_rejected = Some(EventColumns::default());
        }
        collection
    }
}

/// Thresholds in NSS units. Absolute thresholds are given in smoothed
/// squared-signal units and mapped through the same z-score.
fn detection_thresholds(cfg: &RippleConfig, normalized: &Normalized) -> (f64, f64) {
    let (low, high) = cfg.thresholds;
    if cfg.absolute_thresholds {
        let z = |t: f64| (t - normalized.mean) / normalized.stdev;
        (z(low), z(high))
    } else {
        (low, high)
    }
}

/// Times for a candidate; the peak is the most negative filtered sample
/// strictly inside the bracketing samples.
fn to_event(series: &TimeSeries, filtered: &[f64], candidate: &Candidate) -> RippleEvent {
    let interval = candidate.interval;
    let interior = interval.start + 1..interval.stop;
    let peak = interior
        .clone()
        .min_by(|&a, &b| filtered[a].total_cmp(&filtered[b]))
        .unwrap_or(interior.start);
    RippleEvent {
        start: series.timestamps[interval.start],
        peak: series.timestamps[peak],
        end: series.timestamps[interval.stop],
        peak_power: candidate.peak_power,
    }
}

/// Detect ripples in a bare series with the default filter and no noise or EMG input.
pub fn detect_ripples(series: &TimeSeries, config: &RippleConfig) -> Result<EventCollection> {
    RippleDetector::new(config.clone())?.detect(
        &ChannelTrace::from_series(series.clone()),
        None,
        None,
    )
}
