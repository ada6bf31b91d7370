use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use plotters::prelude::*;
use ripple_lib::{
    config::{load_config, RippleConfig},
    detectors::RippleDetector,
    emg::EmgSource,
    events::{artifact_path, load_events, save_events, EventCollection},
    io::{emg::CsvEmgSource, session::load_session, session::SessionInfo, spikes, text},
    metrics::rank_order::{rank_order, RankBy, RankOrderOptions},
    plot::{figure_from_events, Figure, PlotBackend, Series},
    signal::TimeSeries,
    source::{ChannelFormat, InputSource, SampleSource},
};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ripple",
    version,
    about = "Hippocampal ripple detection from LFP recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect ripples and print the event collection as JSON
    Detect(DetectArgs),
    /// Print the stage summary of a saved event collection
    Show {
        #[arg(long)]
        events: PathBuf,
    },
    /// Rank-order analysis of unit spikes inside accepted events
    RankOrder {
        #[arg(long)]
        events: PathBuf,
        /// CSV with `unit,time` columns
        #[arg(long)]
        spikes: PathBuf,
        #[arg(long, value_enum, default_value_t = RankByArg::First)]
        rank_by: RankByArg,
        #[arg(long, default_value_t = 5)]
        min_units: usize,
    },
    /// Render a text trace with detected event peaks to PNG
    Plot {
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 1250.0)]
        fs: f64,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct DetectArgs {
    /// Text trace (one sample, or `timestamp value`, per line); stdin when no input is given
    #[arg(long)]
    input: Option<PathBuf>,
    /// Sampling rate of text and int16 inputs
    #[arg(long, default_value_t = 1250.0)]
    fs: f64,
    /// Interleaved int16 LFP file
    #[arg(long, requires = "n_channels")]
    lfp: Option<PathBuf>,
    #[arg(long)]
    n_channels: Option<usize>,
    #[arg(long)]
    edf: Option<PathBuf>,
    /// Ripple channel for --lfp / --edf
    #[arg(long, default_value_t = 0)]
    channel: usize,
    /// Session metadata JSON
    #[arg(long, conflicts_with_all = ["input", "lfp", "edf"])]
    session: Option<PathBuf>,
    /// Noise channel in the same file as the ripple channel
    #[arg(long)]
    noise_channel: Option<usize>,
    /// Noise trace as a separate text file
    #[arg(long, conflicts_with = "noise_channel")]
    noise_input: Option<PathBuf>,
    /// EMG estimate CSV (`timestamp,value`)
    #[arg(long)]
    emg: Option<PathBuf>,
    /// TOML file with detection parameters
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    low: Option<f64>,
    #[arg(long)]
    high: Option<f64>,
    #[arg(long)]
    min_gap_ms: Option<f64>,
    #[arg(long)]
    max_duration_ms: Option<f64>,
    #[arg(long)]
    min_duration_ms: Option<f64>,
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    passband: Option<Vec<f64>>,
    #[arg(long)]
    stdev: Option<f64>,
    /// Disable EMG rejection
    #[arg(long)]
    no_emg: bool,
    /// Also write the event collection to this file
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RankByArg {
    First,
    Mean,
}

impl From<RankByArg> for RankBy {
    fn from(arg: RankByArg) -> Self {
        match arg {
            RankByArg::First => RankBy::First,
            RankByArg::Mean => RankBy::Mean,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect(args) => cmd_detect(&args)?,
        Commands::Show { events } => cmd_show(&events)?,
        Commands::RankOrder {
            events,
            spikes,
            rank_by,
            min_units,
        } => cmd_rank_order(&events, &spikes, rank_by.into(), min_units)?,
        Commands::Plot {
            events,
            input,
            fs,
            out,
        } => cmd_plot(&events, &input, fs, &out)?,
    }
    Ok(())
}

fn cmd_detect(args: &DetectArgs) -> Result<()> {
    let session = args.session.as_deref().map(load_session).transpose()?;
    let mut cfg = build_config(args)?;

    let trace = primary_source(args, session.as_ref())?.load()?;
    cfg.frequency_hz = trace.series.fs;
    let noise = noise_source(args, session.as_ref())
        .map(|source| source.load())
        .transpose()
        .context("loading noise channel")?;
    let emg = cfg
        .emg_enabled()
        .and_then(|_| emg_source(args, session.as_ref()));

    let detector = RippleDetector::new(cfg)?;
    let mut collection = detector.detect(&trace, noise.as_ref(), emg.as_deref())?;
    collection.provenance.session = session.as_ref().map(|s| s.name.clone());
    info!("{}", collection.counts);

    if let Some(out) = &args.out {
        save_events(out, &collection)?;
    }
    if detector.config().persist {
        match &session {
            Some(session) => {
                let path = artifact_path(&session.basepath, &session.name);
                save_events(&path, &collection)?;
                info!("saved events to {}", path.display());
            }
            None => log::warn!("persist requested without a session; nothing written"),
        }
    }
    println!("{}", serde_json::to_string(&collection)?);
    Ok(())
}

fn build_config(args: &DetectArgs) -> Result<RippleConfig> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => RippleConfig::default(),
    };
    if let Some(low) = args.low {
        cfg.thresholds.0 = low;
    }
    if let Some(high) = args.high {
        cfg.thresholds.1 = high;
    }
    if let Some(gap) = args.min_gap_ms {
        cfg.durations_ms.0 = gap;
    }
    if let Some(max) = args.max_duration_ms {
        cfg.durations_ms.1 = Some(max);
    }
    if let Some(min) = args.min_duration_ms {
        cfg.min_duration_ms = min;
    }
    if let Some(band) = &args.passband {
        cfg.passband_hz = (band[0], band[1]);
    }
    if args.stdev.is_some() {
        cfg.stdev = args.stdev;
    }
    if args.no_emg {
        cfg.emg_threshold = None;
    }
    Ok(cfg)
}

fn primary_source(args: &DetectArgs, session: Option<&SessionInfo>) -> Result<InputSource> {
    if let Some(session) = session {
        return Ok(InputSource::Session(session.clone()));
    }
    if let Some(path) = &args.lfp {
        let n_channels = args
            .n_channels
            .ok_or_else(|| anyhow!("--lfp needs --n-channels"))?;
        return Ok(InputSource::ChannelFile {
            path: path.clone(),
            channel: args.channel,
            format: ChannelFormat::Int16 {
                n_channels,
                fs: args.fs,
            },
        });
    }
    if let Some(path) = &args.edf {
        return Ok(InputSource::ChannelFile {
            path: path.clone(),
            channel: args.channel,
            format: ChannelFormat::Edf,
        });
    }
    match &args.input {
        Some(path) => Ok(InputSource::ChannelFile {
            path: path.clone(),
            channel: 0,
            format: ChannelFormat::Text { fs: args.fs },
        }),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(InputSource::Series(text::parse_trace(&buf, args.fs)?))
        }
    }
}

fn noise_source(args: &DetectArgs, session: Option<&SessionInfo>) -> Option<InputSource> {
    if let Some(path) = &args.noise_input {
        return Some(InputSource::ChannelFile {
            path: path.clone(),
            channel: 0,
            format: ChannelFormat::Text { fs: args.fs },
        });
    }
    let channel = args.noise_channel;
    if let Some(session) = session {
        let mut session = session.clone();
        session.noise_channel = channel.or(session.noise_channel);
        return InputSource::session_noise(&session);
    }
    let channel = channel?;
    if let Some(path) = &args.lfp {
        return Some(InputSource::ChannelFile {
            path: path.clone(),
            channel,
            format: ChannelFormat::Int16 {
                n_channels: args.n_channels?,
                fs: args.fs,
            },
        });
    }
    args.edf.as_ref().map(|path| InputSource::ChannelFile {
        path: path.clone(),
        channel,
        format: ChannelFormat::Edf,
    })
}

/// EMG from `--emg`, else the session's stored estimate with on-demand
/// estimation from the session's LFP as fallback.
fn emg_source(args: &DetectArgs, session: Option<&SessionInfo>) -> Option<Box<dyn EmgSource>> {
    if let Some(path) = &args.emg {
        return Some(Box::new(CsvEmgSource { path: path.clone() }));
    }
    session.map(SessionInfo::emg_source)
}

fn cmd_show(path: &Path) -> Result<()> {
    let collection = load_events(path)?;
    println!("{}", collection.counts);
    println!(
        "Accepted: {}, rejected: {}",
        collection.accepted.len(),
        collection.rejected.len()
    );
    if let Some(sd) = collection.stdev {
        println!("Standard deviation: {sd}");
    }
    Ok(())
}

fn cmd_rank_order(
    events: &Path,
    spikes_path: &Path,
    rank_by: RankBy,
    min_units: usize,
) -> Result<()> {
    let collection = load_events(events)?;
    let units = spikes::read_spikes_csv(spikes_path)?;
    let result = rank_order(
        &units,
        &collection.accepted.intervals(),
        &RankOrderOptions { rank_by, min_units },
    );
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_plot(events: &Path, input: &Path, fs: f64, out: &Path) -> Result<()> {
    let collection: EventCollection = load_events(events)?;
    let series: TimeSeries = text::read_trace(input, fs)?;
    let fig = figure_from_events(&series, &collection, 4096);
    PngBackend::new(out).draw(&fig)
}

struct PngBackend<'a> {
    path: &'a Path,
    size: (u32, u32),
}

impl<'a> PngBackend<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            size: (1200, 480),
        }
    }
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let Some((x_min, x_max, y_min, y_max)) = fig.bounds() else {
            bail!("nothing to plot");
        };
        let (x_max, y_max) = (widen(x_min, x_max), widen(y_min, y_max));
        let root = BitMapBackend::new(self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        let mut mesh = chart.configure_mesh();
        if let Some(label) = &fig.x.label {
            mesh.x_desc(label.as_str());
        }
        mesh.draw()?;
        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    chart.draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        RGBColor(r, g, b).stroke_width(line.style.width.round() as u32),
                    ))?;
                }
                Series::Markers(markers) => {
                    let (r, g, b) = markers.color.rgb();
                    let style = RGBColor(r, g, b).filled();
                    chart.draw_series(
                        markers
                            .points
                            .iter()
                            .map(|p| Circle::new((p[0], p[1]), markers.size, style)),
                    )?;
                }
            }
        }
        root.present()?;
        Ok(())
    }
}

/// Upper bound that keeps a degenerate range drawable.
fn widen(min: f64, max: f64) -> f64 {
    if max > min {
        max
    } else {
        min + 1.0
    }
}
