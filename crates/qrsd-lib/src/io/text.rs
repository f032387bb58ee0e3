use crate::signal::Recording;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        if !val.is_finite() {
            anyhow::bail!("line {} is not finite: {}", idx + 1, trimmed);
        }
        out.push(val);
    }
    Ok(out)
}

/// Read bare amplitudes from disk; timestamps come from `fs`.
pub fn read_text_recording(path: &Path, fs: f64) -> Result<Recording> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let data = parse_f64_series(&text)?;
    Ok(Recording::from_amplitudes(fs, &data))
}
