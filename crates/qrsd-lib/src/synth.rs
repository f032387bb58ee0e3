use crate::{error::QrsError, signal::Recording};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters for a synthetic ECG-like recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticEcg {
    pub fs: f64,
    pub duration_s: f64,
    pub heart_rate_bpm: f64,
    /// Height of each R wave.
    pub amplitude: f64,
    /// Half-width of the uniform noise added to every sample.
    pub noise: f64,
    /// Amplitude of the slow baseline drift.
    pub wander: f64,
    pub seed: u64,
}

impl Default for SyntheticEcg {
    fn default() -> Self {
        Self {
            fs: 250.0,
            duration_s: 60.0,
            heart_rate_bpm: 75.0,
            amplitude: 1.0,
            noise: 0.01,
            wander: 0.05,
            seed: 7,
        }
    }
}

impl SyntheticEcg {
    pub fn validate(&self) -> Result<(), QrsError> {
        positive("fs", self.fs)?;
        positive("duration_s", self.duration_s)?;
        positive("heart_rate_bpm", self.heart_rate_bpm)?;
        for (field, value) in [
            ("amplitude", self.amplitude),
            ("noise", self.noise),
            ("wander", self.wander),
        ] {
            if !value.is_finite() {
                return Err(QrsError::config(field, value, "must be finite"));
            }
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), QrsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(QrsError::config(field, value, "must be positive and finite"))
    }
}

/// Generate a recording with Gaussian R waves and return it with the true beat indices.
pub fn synthetic_ecg(spec: &SyntheticEcg) -> Result<(Recording, Vec<usize>), QrsError> {
    spec.validate()?;
    let rr_s = 60.0 / spec.heart_rate_bpm;
    let mut beat_times = Vec::new();
    let mut k = 0usize;
    loop {
        let t = 0.5 + k as f64 * rr_s;
        if t + 0.3 >= spec.duration_s {
            break;
        }
        beat_times.push(t);
        k += 1;
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let samples = (spec.duration_s * spec.fs) as usize;
    let width = 0.02;
    let mut data = Vec::with_capacity(samples);
    for i in 0..samples {
        let time = i as f64 / spec.fs;
        let mut v = spec.wander * (2.0 * PI * 0.3 * time).sin();
        for &bt in &beat_times {
            if (time - bt).abs() < 5.0 * width {
                v += spec.amplitude * (-0.5 * ((time - bt) / width).powi(2)).exp();
            }
        }
        let noise = spec.noise.abs();
        v += rng.gen_range(-noise..=noise);
        data.push(v);
    }
    let beats = beat_times
        .iter()
        .map(|t| (t * spec.fs).round() as usize)
        .collect();
    Ok((Recording::from_amplitudes(spec.fs, &data), beats))
}
