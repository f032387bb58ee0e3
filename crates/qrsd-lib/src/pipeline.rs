use crate::{
    annotate::{annotate, AnnotatedSignal},
    config::PipelineConfig,
    detectors::{
        peaks::PeakSource,
        qrs::{classify, Classification, Levels},
    },
    error::{ensure_strictly_increasing, QrsError},
    metrics::summary::{summarize, DetectionSummary},
    signal::{PeakCandidate, QrsEvent, RRSeries, Recording},
};
use log::{info, warn};
use serde::Serialize;

/// Combined result of one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub fs: f64,
    pub sample_count: usize,
    pub candidates: Vec<PeakCandidate>,
    pub qrs: Vec<QrsEvent>,
    pub noise: Vec<PeakCandidate>,
    pub refractory_skipped: usize,
    pub levels: Levels,
    pub rr: RRSeries,
    pub summary: DetectionSummary,
    #[serde(skip)]
    pub annotated: AnnotatedSignal,
}

impl DetectionReport {
    pub fn qrs_indices(&self) -> Vec<usize> {
        self.qrs.iter().map(|e| e.index).collect()
    }
}

/// Relative disagreement between the configured rate and the timestamp column
/// above which a warning is logged.
const RATE_MISMATCH_TOLERANCE: f64 = 0.05;

fn check_inputs(recording: &Recording, cfg: &PipelineConfig) -> Result<(), QrsError> {
    cfg.validate()?;
    ensure_strictly_increasing("sample", recording.samples.iter().map(|s| s.index))?;
    let fs = cfg.sampling_frequency_hz;
    if let Some(rate) = recording.timestamp_rate() {
        if (rate - fs).abs() / fs > RATE_MISMATCH_TOLERANCE {
            warn!(
                "timestamps imply {:.1} Hz but sampling_frequency_hz is {}; RR intervals use the configured rate",
                rate, fs
            );
        }
    }
    Ok(())
}

/// Classify already-extracted candidates against `recording`.
pub fn detect_from_candidates(
    recording: &Recording,
    candidates: Vec<PeakCandidate>,
    cfg: &PipelineConfig,
) -> Result<DetectionReport, QrsError> {
    check_inputs(recording, cfg)?;
    detect_checked(recording, candidates, cfg)
}

fn detect_checked(
    recording: &Recording,
    candidates: Vec<PeakCandidate>,
    cfg: &PipelineConfig,
) -> Result<DetectionReport, QrsError> {
    let classification = classify(&candidates, &cfg.classifier)?;
    let rr = RRSeries::from_events(&classification.events, cfg.sampling_frequency_hz);
    let annotated = annotate(&recording.samples, &classification.events)?;
    let summary = summarize(&candidates, &classification, &rr);
    let Classification {
        events,
        noise,
        refractory_skipped,
        levels,
    } = classification;
    info!(
        "{} samples -> {} QRS events, mean RR {:.1} ms",
        recording.len(),
        events.len(),
        summary.mean_rr_ms
    );
    Ok(DetectionReport {
        fs: cfg.sampling_frequency_hz,
        sample_count: recording.len(),
        candidates,
        qrs: events,
        noise,
        refractory_skipped,
        levels,
        rr,
        summary,
        annotated,
    })
}

/// Full run: extract candidates with `source`, classify, derive intervals and annotate.
pub fn run_detection<S: PeakSource + ?Sized>(
    recording: &Recording,
    source: &S,
    cfg: &PipelineConfig,
) -> Result<DetectionReport, QrsError> {
    check_inputs(recording, cfg)?;
    let candidates = source.candidates(recording);
    detect_checked(recording, candidates, cfg)
}
