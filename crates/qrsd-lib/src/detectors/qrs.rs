use crate::{
    error::{ensure_strictly_increasing, QrsError},
    signal::{PeakCandidate, QrsEvent},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Parameters of the adaptive QRS/noise decision rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Samples after an accepted QRS during which candidates are discarded.
    pub refractory_period: usize,
    /// Exponential-average weight for the QRS level.
    pub qrs_filter_factor: f64,
    /// Exponential-average weight for the noise level.
    pub noise_filter_factor: f64,
    /// Position of the threshold between the noise and QRS levels.
    pub threshold_weight: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            refractory_period: 120,
            qrs_filter_factor: 0.125,
            noise_filter_factor: 0.125,
            threshold_weight: 0.25,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), QrsError> {
        open_unit("qrs_filter_factor", self.qrs_filter_factor)?;
        open_unit("noise_filter_factor", self.noise_filter_factor)?;
        if !(0.0..=1.0).contains(&self.threshold_weight) {
            return Err(QrsError::config(
                "threshold_weight",
                self.threshold_weight,
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

fn open_unit(field: &'static str, value: f64) -> Result<(), QrsError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(QrsError::config(field, value, "must lie in (0, 1)"))
    }
}

/// Snapshot of the running levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub qrs_level: f64,
    pub noise_level: f64,
    pub threshold: f64,
}

/// Outcome of feeding one candidate to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Qrs,
    Noise,
    /// Arrived within the refractory window of the last QRS; state untouched.
    Refractory,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClassifierState {
    levels: Levels,
    last_qrs_index: Option<usize>,
}

/// Accumulated output of a classifier run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub events: Vec<QrsEvent>,
    pub noise: Vec<PeakCandidate>,
    /// Candidates discarded by the refractory gate.
    pub refractory_skipped: usize,
    pub levels: Levels,
}

/// Online two-level adaptive threshold classifier (Pan–Tompkins style).
///
/// Candidates must be pushed in strictly increasing index order. Stopping
/// between pushes and calling [`AdaptiveClassifier::finish`] always yields a
/// consistent prefix result.
#[derive(Debug, Clone)]
pub struct AdaptiveClassifier {
    config: ClassifierConfig,
    state: ClassifierState,
    last_candidate_index: Option<usize>,
    out: Classification,
}

impl AdaptiveClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, QrsError> {
        config.validate()?;
        Ok(Self {
            config,
            state: ClassifierState::default(),
            last_candidate_index: None,
            out: Classification::default(),
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn levels(&self) -> Levels {
        self.state.levels
    }

    pub fn events(&self) -> &[QrsEvent] {
        &self.out.events
    }

    /// Classify the next candidate.
    pub fn push(&mut self, candidate: PeakCandidate) -> Result<Decision, QrsError> {
        ensure_finite(&candidate)?;
        if let Some(previous) = self.last_candidate_index {
            if candidate.index <= previous {
                return Err(QrsError::InputOrderViolation {
                    what: "candidate",
                    index: candidate.index,
                    previous,
                });
            }
        }
        self.last_candidate_index = Some(candidate.index);
        Ok(self.step(candidate))
    }

    fn step(&mut self, candidate: PeakCandidate) -> Decision {
        let cfg = &self.config;
        let state = &mut self.state;

        if let Some(last) = state.last_qrs_index {
            if candidate.index - last <= cfg.refractory_period {
                self.out.refractory_skipped += 1;
                return Decision::Refractory;
            }
        }

        let levels = &mut state.levels;
        let decision = if candidate.amplitude > levels.threshold {
            state.last_qrs_index = Some(candidate.index);
            levels.qrs_level = cfg.qrs_filter_factor * candidate.amplitude
                + (1.0 - cfg.qrs_filter_factor) * levels.qrs_level;
            self.out.events.push(QrsEvent {
                index: candidate.index,
                amplitude: candidate.amplitude,
            });
            Decision::Qrs
        } else {
            levels.noise_level = cfg.noise_filter_factor * candidate.amplitude
                + (1.0 - cfg.noise_filter_factor) * levels.noise_level;
            self.out.noise.push(candidate);
            Decision::Noise
        };
        levels.threshold =
            levels.noise_level + cfg.threshold_weight * (levels.qrs_level - levels.noise_level);
        decision
    }

    pub fn finish(mut self) -> Classification {
        self.out.levels = self.state.levels;
        self.out
    }
}

fn ensure_finite(candidate: &PeakCandidate) -> Result<(), QrsError> {
    if candidate.amplitude.is_finite() {
        Ok(())
    } else {
        Err(QrsError::NonFiniteAmplitude {
            what: "candidate",
            index: candidate.index,
        })
    }
}

/// Batch classification. The whole candidate list (ordering and amplitudes)
/// is checked before any state is touched.
pub fn classify(
    candidates: &[PeakCandidate],
    config: &ClassifierConfig,
) -> Result<Classification, QrsError> {
    let mut classifier = AdaptiveClassifier::new(*config)?;
    ensure_strictly_increasing("candidate", candidates.iter().map(|c| c.index))?;
    candidates.iter().try_for_each(ensure_finite)?;
    for &candidate in candidates {
        let decision = classifier.step(candidate);
        debug!(
            "candidate {} amp {:.4} -> {:?} (threshold {:.4})",
            candidate.index,
            candidate.amplitude,
            decision,
            classifier.state.levels.threshold
        );
    }
    let result = classifier.finish();
    info!(
        "classified {} candidates: {} QRS, {} noise, {} refractory",
        candidates.len(),
        result.events.len(),
        result.noise.len(),
        result.refractory_skipped
    );
    Ok(result)
}
