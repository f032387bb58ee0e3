use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::Path, path::PathBuf};
use tempfile::tempdir;

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn simulate(out: &Path, duration_s: &str) {
    cargo_bin_cmd!("qrsd")
        .args([
            "simulate",
            "--out",
            out.to_str().expect("utf8 path"),
            "--duration-s",
            duration_s,
        ])
        .assert()
        .success();
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}

#[test]
fn detect_reports_simulated_beats() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let recording = temp.path().join("ecg_data.csv");
    simulate(&recording, "10");

    let output = cargo_bin_cmd!("qrsd")
        .args([
            "detect",
            "--input",
            recording.to_str().expect("utf8 path"),
            "--fs",
            "250",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output)?;

    let qrs = report["qrs"].as_array().expect("qrs array");
    assert_eq!(qrs.len(), 12);
    assert_eq!(report["rr"]["rr_ms"].as_array().expect("rr array").len(), 11);
    assert_eq!(report["sample_count"], 2500);
    assert_close(
        report["summary"]["mean_rr_ms"].as_f64().expect("mean rr"),
        800.0,
        10.0,
    );
    assert_close(
        report["summary"]["mean_heart_rate_bpm"]
            .as_f64()
            .expect("heart rate"),
        75.0,
        1.0,
    );
    Ok(())
}

#[test]
fn detect_writes_annotated_log_and_summary() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let recording = temp.path().join("ecg_data.csv");
    let logs = temp.path().join("logs");
    simulate(&recording, "6");
    let config = workspace_root().join("test_data/qrsd.toml");

    cargo_bin_cmd!("qrsd")
        .args([
            "detect",
            "--input",
            recording.to_str().expect("utf8 path"),
            "--config",
            config.to_str().expect("utf8 path"),
            "--log",
            "--log-dir",
            logs.to_str().expect("utf8 path"),
        ])
        .assert()
        .success();

    let mut entries: Vec<PathBuf> = fs::read_dir(&logs)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();
    assert_eq!(entries.len(), 2, "log csv + summary: {:?}", entries);
    let csv_path = entries
        .iter()
        .find(|p| p.extension().is_some_and(|e| e == "csv"))
        .expect("annotated csv");
    let summary_path = entries
        .iter()
        .find(|p| p.to_string_lossy().ends_with("_summary.txt"))
        .expect("summary file");

    let csv = fs::read_to_string(csv_path)?;
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,ecg_measurement,qrs_detected")
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 1500);
    let flagged = rows.iter().filter(|l| l.ends_with(",1")).count();
    assert_eq!(flagged, 7);

    let summary = fs::read_to_string(summary_path)?;
    assert!(summary.starts_with("Average QRS peak value:"));
    assert!(summary.contains("RR intervals (ms):"));
    Ok(())
}

#[test]
fn detect_reads_plain_amplitudes_from_stdin() -> Result<(), Box<dyn Error>> {
    let mut samples = vec!["0.0"; 400];
    samples[50] = "1.0";
    samples[300] = "0.9";
    let input = samples.join("\n");

    let output = cargo_bin_cmd!("qrsd")
        .args(["detect", "--fs", "100"])
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output)?;
    let indices: Vec<u64> = report["qrs"]
        .as_array()
        .expect("qrs array")
        .iter()
        .map(|e| e["index"].as_u64().expect("index"))
        .collect();
    assert_eq!(indices, vec![50, 300]);
    assert_close(report["rr"]["rr_ms"][0].as_f64().expect("rr"), 2500.0, 1e-9);
    Ok(())
}

#[test]
fn empty_recording_yields_null_statistics() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("qrsd")
        .args(["detect"])
        .write_stdin("# nothing recorded\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output)?;
    assert_eq!(report["qrs"].as_array().map(Vec::len), Some(0));
    assert!(report["summary"]["mean_rr_ms"].is_null());
    assert!(report["summary"]["mean_candidate_amplitude"].is_null());
    Ok(())
}

#[test]
fn invalid_filter_factor_is_rejected() {
    cargo_bin_cmd!("qrsd")
        .args(["detect", "--qrs-filter-factor", "1.5"])
        .write_stdin("0.0\n1.0\n0.0\n")
        .assert()
        .failure();
}

#[test]
fn detect_warns_when_timestamps_disagree_with_fs() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let recording = temp.path().join("ecg_data.csv");
    // Simulated at 250 Hz, analysed at the 100 Hz default.
    simulate(&recording, "4");

    let assert = cargo_bin_cmd!("qrsd")
        .env_remove("RUST_LOG")
        .args(["detect", "--input", recording.to_str().expect("utf8 path")])
        .assert()
        .success();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("timestamps imply 250.0 Hz"), "{}", stderr);
    Ok(())
}

#[test]
fn simulate_rejects_non_positive_heart_rate() {
    cargo_bin_cmd!("qrsd")
        .args(["simulate", "--bpm=-60", "--duration-s", "2"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure();
}

