use crate::{detectors::peaks::LocalMaxima, detectors::qrs::ClassifierConfig, error::QrsError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a detection run needs, loadable from a TOML file.
///
/// ```toml
/// sampling_frequency_hz = 100.0
///
/// [classifier]
/// refractory_period = 120
/// threshold_weight = 0.25
///
/// [peaks]
/// min_height = 0.35
/// min_distance = 50
///
/// [output]
/// log_dir = "logs"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling_frequency_hz: f64,
    pub classifier: ClassifierConfig,
    pub peaks: LocalMaxima,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_frequency_hz: 100.0,
            classifier: ClassifierConfig::default(),
            peaks: LocalMaxima::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub log_dir: PathBuf,
    pub plot_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            plot_dir: PathBuf::from("plots"),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), QrsError> {
        let fs = self.sampling_frequency_hz;
        if !(fs.is_finite() && fs > 0.0) {
            return Err(QrsError::config(
                "sampling_frequency_hz",
                fs,
                "must be a positive finite number",
            ));
        }
        if self.peaks.min_height.is_nan() {
            return Err(QrsError::config(
                "min_height",
                self.peaks.min_height,
                "must be a number",
            ));
        }
        self.classifier.validate()
    }
}

pub fn parse_config(text: &str) -> Result<PipelineConfig> {
    let cfg: PipelineConfig = toml::from_str(text).context("parsing pipeline config")?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("in {}", path.display()))
}
