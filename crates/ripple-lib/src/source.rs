use crate::events::ChannelId;
use crate::io::{edf, lfp, session::SessionInfo, text};
use crate::signal::TimeSeries;
use anyhow::Result;
use std::path::PathBuf;

/// A trace together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrace {
    pub series: TimeSeries,
    pub channel: ChannelId,
}

impl ChannelTrace {
    pub fn from_series(series: TimeSeries) -> Self {
        Self {
            series,
            channel: ChannelId::series(),
        }
    }
}

/// Capability to produce a trace.
pub trait SampleSource {
    fn load(&self) -> Result<ChannelTrace>;
}

/// On-disk layouts a single channel can be read from.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelFormat {
    /// One sample (or `timestamp value`) per line
    Text { fs: f64 },
    /// Interleaved little-endian int16 frames
    Int16 { n_channels: usize, fs: f64 },
    Edf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Series(TimeSeries),
    ChannelFile {
        path: PathBuf,
        channel: usize,
        format: ChannelFormat,
    },
    /// Ripple channel of a recording session
    Session(SessionInfo),
}

impl InputSource {
    /// Noise channel declared by a session, read from the same file.
    pub fn session_noise(session: &SessionInfo) -> Option<InputSource> {
        session.noise_channel.map(|channel| InputSource::ChannelFile {
            path: session.lfp_path(),
            channel,
            format: ChannelFormat::Int16 {
                n_channels: session.n_channels,
                fs: session.sample_rate,
            },
        })
    }
}

impl SampleSource for InputSource {
    fn load(&self) -> Result<ChannelTrace> {
        match self {
            InputSource::Series(series) => {
                series.validate()?;
                Ok(ChannelTrace::from_series(series.clone()))
            }
            InputSource::ChannelFile {
                path,
                channel,
                format,
            } => {
                let series = match format {
                    ChannelFormat::Text { fs } => text::read_trace(path, *fs)?,
                    ChannelFormat::Int16 { n_channels, fs } => {
                        lfp::load_int16_channel(path, *n_channels, *channel, *fs)?
                    }
                    ChannelFormat::Edf => edf::load_edf_channel(path, *channel)?,
                };
                let index = match format {
                    ChannelFormat::Text { .. } => None,
                    _ => Some(*channel),
                };
                Ok(ChannelTrace {
                    series,
                    channel: ChannelId {
                        index,
                        source: path.display().to_string(),
                    },
                })
            }
            InputSource::Session(session) => {
                let series = lfp::load_int16_channel(
                    &session.lfp_path(),
                    session.n_channels,
                    session.ripple_channel,
                    session.sample_rate,
                )?;
                Ok(ChannelTrace {
                    series,
                    channel: ChannelId {
                        index: Some(session.ripple_channel),
                        source: session.lfp_path().display().to_string(),
                    },
                })
            }
        }
    }
}
