use assert_cmd::cargo::cargo_bin_cmd;
use ripple_lib::events::{load_events, EventCollection};
use std::error::Error;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FS: f64 = 1250.0;

/// One second of silence with a 160 Hz burst over samples 500..560.
fn write_burst_trace(path: &Path) -> Result<(), Box<dyn Error>> {
    let lines: Vec<String> = (0..1250)
        .map(|i| {
            let v = if (500..560).contains(&i) {
                10.0 * (2.0 * PI * 160.0 * (i - 500) as f64 / FS).sin()
            } else {
                0.0
            };
            format!("{v}")
        })
        .collect();
    fs::write(path, lines.join("\n"))?;
    Ok(())
}

fn detect_args(input: &str) -> Vec<&str> {
    vec![
        "detect",
        "--input",
        input,
        "--fs",
        "1250",
        "--low",
        "2",
        "--high",
        "5",
        "--stdev",
        "1",
        "--max-duration-ms",
        "150",
        "--no-emg",
    ]
}

#[test]
fn detect_finds_single_burst() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("lfp.txt");
    write_burst_trace(&trace)?;
    let out_path = dir.path().join("events.json");

    let mut cmd = cargo_bin_cmd!("ripple");
    cmd.args(detect_args(trace.to_str().expect("utf8 path")))
        .args(["--out", out_path.to_str().expect("utf8 path")]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let printed: EventCollection = serde_json::from_slice(&stdout)?;

    assert_eq!(printed.accepted.len(), 1);
    assert_eq!(printed.schema_version, 1);
    let event = printed.accepted_events()[0];
    assert!(event.start < event.peak && event.peak < event.end);
    assert!((event.start - 0.4).abs() < 0.02);
    assert_eq!(load_events(&out_path)?, printed);
    Ok(())
}

#[test]
fn detect_rejects_burst_seen_on_noise_channel() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("lfp.txt");
    write_burst_trace(&trace)?;
    let trace = trace.to_str().expect("utf8 path");

    let mut cmd = cargo_bin_cmd!("ripple");
    cmd.args(detect_args(trace)).args(["--noise-input", trace]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let printed: EventCollection = serde_json::from_slice(&stdout)?;
    assert!(printed.accepted.is_empty());
    assert_eq!(printed.rejected.len(), 1);
    assert_eq!(printed.counts.noise, Some(0));
    Ok(())
}

#[test]
fn show_prints_stage_summary() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("lfp.txt");
    write_burst_trace(&trace)?;
    let events = dir.path().join("events.json");
    cargo_bin_cmd!("ripple")
        .args(detect_args(trace.to_str().expect("utf8 path")))
        .args(["--out", events.to_str().expect("utf8 path")])
        .assert()
        .success();

    let mut cmd = cargo_bin_cmd!("ripple");
    cmd.args(["show", "--events", events.to_str().expect("utf8 path")]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(stdout)?;
    assert!(text.contains("After detection by thresholding: 1 events."));
    assert!(text.contains("Accepted: 1, rejected: 0"));
    Ok(())
}

#[test]
fn inverted_thresholds_fail() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("lfp.txt");
    write_burst_trace(&trace)?;
    cargo_bin_cmd!("ripple")
        .args([
            "detect",
            "--input",
            trace.to_str().expect("utf8 path"),
            "--low",
            "6",
            "--high",
            "5",
        ])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn missing_events_file_fails() {
    cargo_bin_cmd!("ripple")
        .args(["show", "--events", "/nonexistent/events.json"])
        .assert()
        .failure();
}
