use crate::{
    annotate::AnnotatedSignal,
    metrics::summary::DetectionSummary,
    signal::{RRSeries, Recording, Sample},
};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read a `timestamp,ecg_value` CSV (header row required) into a recording.
///
/// Columns are taken by position; extra columns are ignored.
pub fn read_ecg_csv(path: &Path, fs: f64) -> Result<Recording> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_ecg_csv_from(file, fs).with_context(|| format!("reading {}", path.display()))
}

pub fn read_ecg_csv_from<R: Read>(reader: R, fs: f64) -> Result<Recording> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut samples = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.context("reading record")?;
        let line = index + 2;
        let timestamp_str = record
            .get(0)
            .with_context(|| format!("line {}: missing timestamp column", line))?;
        let timestamp: f64 = timestamp_str
            .parse()
            .with_context(|| format!("line {}: parsing timestamp {}", line, timestamp_str))?;
        let value_str = record
            .get(1)
            .with_context(|| format!("line {}: missing signal column", line))?;
        let amplitude: f64 = value_str
            .parse()
            .with_context(|| format!("line {}: parsing signal value {}", line, value_str))?;
        if !amplitude.is_finite() {
            anyhow::bail!("line {}: signal value {} is not finite", line, value_str);
        }
        samples.push(Sample {
            index,
            timestamp,
            amplitude,
        });
    }
    Ok(Recording { fs, samples })
}

/// Write a raw recording in the same `timestamp,ecg_value` layout [`read_ecg_csv`] accepts.
pub fn write_recording_to<W: Write>(writer: W, recording: &Recording) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["timestamp", "ecg_value"])?;
    for sample in &recording.samples {
        writer.write_record([sample.timestamp.to_string(), sample.amplitude.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the annotated signal as `timestamp,ecg_measurement,qrs_detected`.
pub fn write_annotated_csv(path: &Path, annotated: &AnnotatedSignal) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_annotated_to(file, annotated).with_context(|| format!("writing {}", path.display()))
}

pub fn write_annotated_to<W: Write>(writer: W, annotated: &AnnotatedSignal) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["timestamp", "ecg_measurement", "qrs_detected"])?;
    for (sample, flag) in annotated.rows() {
        writer.write_record([
            sample.timestamp.to_string(),
            sample.amplitude.to_string(),
            flag.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Companion summary file of a detection log: `run.csv` -> `run_summary.txt`.
pub fn summary_path_for(log_path: &Path) -> PathBuf {
    let stem = log_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    log_path.with_file_name(format!("{}_summary.txt", stem))
}

pub fn format_summary(summary: &DetectionSummary, rr: &RRSeries) -> String {
    let rr_list: Vec<String> = rr.rr_ms.iter().map(|v| format!("{:.1}", v)).collect();
    format!(
        "Average QRS peak value: {}\nAverage RR interval: {} ms\nRR intervals (ms):\n[{}]\n",
        summary.mean_candidate_amplitude,
        summary.mean_rr_ms,
        rr_list.join(", ")
    )
}

pub fn write_summary(path: &Path, summary: &DetectionSummary, rr: &RRSeries) -> Result<()> {
    std::fs::write(path, format_summary(summary, rr))
        .with_context(|| format!("writing {}", path.display()))
}
