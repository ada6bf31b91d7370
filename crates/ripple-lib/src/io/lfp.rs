use crate::signal::TimeSeries;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read selected channels from an interleaved little-endian int16 file
/// (`.lfp` / `.dat` layout: one frame of `n_channels` samples per time step).
///
/// Values are kept in raw ADC units.
pub fn load_int16_channels(
    path: &Path,
    n_channels: usize,
    channels: &[usize],
    fs: f64,
) -> Result<Vec<TimeSeries>> {
    if n_channels == 0 {
        return Err(anyhow!("channel count must be positive"));
    }
    if let Some(&bad) = channels.iter().find(|&&c| c >= n_channels) {
        return Err(anyhow!(
            "file has {} channels; channel {} is out of range",
            n_channels,
            bad
        ));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let frame_bytes = 2 * n_channels;
    let len = file
        .metadata()
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len() as usize;
    if len % frame_bytes != 0 {
        return Err(anyhow!(
            "{} is {} bytes, not a whole number of {}-channel frames",
            path.display(),
            len,
            n_channels
        ));
    }
    let frames = len / frame_bytes;
    let mut data: Vec<Vec<f64>> = channels.iter().map(|_| Vec::with_capacity(frames)).collect();
    let mut reader = BufReader::new(file);
    let mut frame = vec![0u8; frame_bytes];
    for _ in 0..frames {
        reader
            .read_exact(&mut frame)
            .with_context(|| format!("reading {}", path.display()))?;
        for (out, &ch) in data.iter_mut().zip(channels) {
            let sample = i16::from_le_bytes([frame[2 * ch], frame[2 * ch + 1]]);
            out.push(sample as f64);
        }
    }
    Ok(data
        .into_iter()
        .map(|samples| TimeSeries::uniform(fs, samples, 0.0))
        .collect())
}

/// Read one channel from an interleaved int16 file.
pub fn load_int16_channel(
    path: &Path,
    n_channels: usize,
    channel: usize,
    fs: f64,
) -> Result<TimeSeries> {
    load_int16_channels(path, n_channels, &[channel], fs)?
        .pop()
        .ok_or_else(|| anyhow!("missing channel data"))
}
