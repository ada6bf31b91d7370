use crate::emg::{CorrelationEmg, EmgSeries, EmgSource, EmgWithFallback};
use crate::io::{emg::CsvEmgSource, lfp};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Recording session metadata, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    /// Directory holding the session files; relative paths resolve against it
    #[serde(default)]
    pub basepath: PathBuf,
    /// Interleaved int16 LFP file
    pub lfp_file: PathBuf,
    pub n_channels: usize,
    #[serde(default = "default_lfp_rate")]
    pub sample_rate: f64,
    pub ripple_channel: usize,
    #[serde(default)]
    pub noise_channel: Option<usize>,
    /// Stored EMG estimate (`timestamp,value` CSV)
    #[serde(default)]
    pub emg_file: Option<PathBuf>,
    /// Channels used to estimate EMG on demand; empty picks a spread across the recording
    #[serde(default)]
    pub emg_channels: Vec<usize>,
}

fn default_lfp_rate() -> f64 {
    1250.0
}

impl SessionInfo {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.basepath.join(path)
        }
    }

    pub fn lfp_path(&self) -> PathBuf {
        self.resolve(&self.lfp_file)
    }

    pub fn emg_path(&self) -> Option<PathBuf> {
        self.emg_file.as_deref().map(|p| self.resolve(p))
    }

    /// Channels for on-demand EMG estimation: configured ones, else up to
    /// eight evenly spaced across the recording.
    pub fn emg_channels(&self) -> Vec<usize> {
        if !self.emg_channels.is_empty() {
            return self.emg_channels.clone();
        }
        let count = self.n_channels.min(8);
        if count == 0 {
            return Vec::new();
        }
        let stride = self.n_channels / count;
        (0..count).map(|i| i * stride).collect()
    }

    /// Stored EMG estimate when the session names one, with estimation from
    /// the LFP as fallback. Nothing is read until `emg()` is called.
    pub fn emg_source(&self) -> Box<dyn EmgSource> {
        let estimator = SessionCorrelationEmg {
            session: self.clone(),
        };
        match self.emg_path() {
            Some(path) => Box::new(EmgWithFallback {
                primary: CsvEmgSource { path },
                fallback: estimator,
            }),
            None => Box::new(estimator),
        }
    }
}

/// Correlation EMG over the session's estimation channels, loaded on demand.
#[derive(Debug, Clone)]
pub struct SessionCorrelationEmg {
    pub session: SessionInfo,
}

impl EmgSource for SessionCorrelationEmg {
    fn emg(&self) -> Result<EmgSeries> {
        let session = &self.session;
        let channels = lfp::load_int16_channels(
            &session.lfp_path(),
            session.n_channels,
            &session.emg_channels(),
            session.sample_rate,
        )
        .context("loading channels for EMG estimation")?;
        Ok(CorrelationEmg::new(channels).estimate()?)
    }
}

/// Load session metadata; an empty `basepath` defaults to the file's directory.
pub fn load_session(path: &Path) -> Result<SessionInfo> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read session {}", path.display()))?;
    let mut session: SessionInfo = serde_json::from_str(&text)
        .with_context(|| format!("parsing session {}", path.display()))?;
    if session.basepath.as_os_str().is_empty() {
        session.basepath = path.parent().map(Path::to_path_buf).unwrap_or_default();
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn two_channel_session(
        dir: &Path,
        emg_file: Option<&str>,
        emg_channels: Vec<usize>,
    ) -> SessionInfo {
        let mut bytes = Vec::new();
        for i in 0..2500i32 {
            let a = ((i * 37) % 201 - 100) as i16;
            let b = ((i * 53) % 199 - 99) as i16;
            bytes.extend_from_slice(&a.to_le_bytes());
            bytes.extend_from_slice(&b.to_le_bytes());
        }
        fs::write(dir.join("s.lfp"), bytes).unwrap();
        SessionInfo {
            name: "s".into(),
            basepath: dir.to_path_buf(),
            lfp_file: "s.lfp".into(),
            n_channels: 2,
            sample_rate: 1250.0,
            ripple_channel: 0,
            noise_channel: None,
            emg_file: emg_file.map(PathBuf::from),
            emg_channels,
        }
    }

    #[test]
    fn stored_emg_wins_without_touching_estimation_channels() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("s.emg.csv"),
            "timestamp,value\n0.0,0.2\n1.0,0.3\n",
        )
        .unwrap();
        // channel 7 does not exist; only the fallback would read it
        let session = two_channel_session(dir.path(), Some("s.emg.csv"), vec![0, 7]);
        let emg = session.emg_source().emg().unwrap();
        assert_eq!(emg.values, vec![0.2, 0.3]);
    }

    #[test]
    fn missing_stored_emg_falls_back_to_estimation() {
        let dir = tempdir().unwrap();
        let session = two_channel_session(dir.path(), Some("absent.csv"), Vec::new());
        let emg = session.emg_source().emg().unwrap();
        assert_eq!(emg.timestamps.len(), 20);
        emg.validate().unwrap();

        let broken = two_channel_session(dir.path(), Some("absent.csv"), vec![0, 7]);
        assert!(broken.emg_source().emg().is_err());
    }

    #[test]
    fn basepath_defaults_to_metadata_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rat01.session.json");
        fs::write(
            &path,
            r#"{"name": "rat01", "lfp_file": "rat01.lfp", "n_channels": 32, "ripple_channel": 5}"#,
        )
        .unwrap();
        let session = load_session(&path).unwrap();
        assert_eq!(session.basepath, dir.path());
        assert_eq!(session.lfp_path(), dir.path().join("rat01.lfp"));
        assert_eq!(session.sample_rate, 1250.0);
        assert_eq!(session.noise_channel, None);
        assert_eq!(session.emg_channels(), vec![0, 4, 8, 12, 16, 20, 24, 28]);
    }
}
