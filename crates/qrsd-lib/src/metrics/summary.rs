use crate::{
    detectors::qrs::Classification,
    signal::{PeakCandidate, RRSeries},
};
use serde::Serialize;

/// Run-level statistics. Undefined quantities are `NaN` (serialized as `null`).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DetectionSummary {
    pub candidate_count: usize,
    pub qrs_count: usize,
    pub noise_count: usize,
    pub mean_candidate_amplitude: f64,
    pub mean_rr_ms: f64,
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
    pub mean_heart_rate_bpm: f64,
}

pub fn summarize(
    candidates: &[PeakCandidate],
    classification: &Classification,
    rr: &RRSeries,
) -> DetectionSummary {
    let amplitudes: Vec<f64> = candidates.iter().map(|c| c.amplitude).collect();
    let mean_rr_ms = mean(&rr.rr_ms);
    DetectionSummary {
        candidate_count: candidates.len(),
        qrs_count: classification.events.len(),
        noise_count: classification.noise.len(),
        mean_candidate_amplitude: mean(&amplitudes),
        mean_rr_ms,
        sdnn_ms: sdnn(&rr.rr_ms),
        rmssd_ms: rmssd(&rr.rr_ms),
        mean_heart_rate_bpm: 60_000.0 / mean_rr_ms,
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sdnn(rr: &[f64]) -> f64 {
    let n = rr.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(rr);
    (rr.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
}

fn rmssd(rr: &[f64]) -> f64 {
    let n = rr.len();
    if n < 2 {
        return f64::NAN;
    }
    let diffs = rr.windows(2).map(|w| (w[1] - w[0]).powi(2));
    (diffs.sum::<f64>() / (n as f64 - 1.0)).sqrt()
}
