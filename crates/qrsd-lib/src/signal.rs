use serde::{Deserialize, Serialize};

/// One raw acquisition sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Position in the recording, one step per sampling period.
    pub index: usize,
    /// Time column of the source, in seconds.
    pub timestamp: f64,
    pub amplitude: f64,
}

/// Raw ECG capture sampled at a uniform rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    pub samples: Vec<Sample>,
}

impl Recording {
    /// Build a recording from bare amplitudes, deriving timestamps from `fs`.
    pub fn from_amplitudes(fs: f64, data: &[f64]) -> Self {
        let samples = data
            .iter()
            .enumerate()
            .map(|(index, &amplitude)| Sample {
                index,
                timestamp: index as f64 / fs,
                amplitude,
            })
            .collect();
        Self { fs, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.fs
    }
    pub fn amplitudes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.amplitude).collect()
    }

    /// Sampling rate implied by the timestamp column: mean spacing between the
    /// first and last sample. `None` with fewer than two samples or a timestamp
    /// column that does not advance.
    pub fn timestamp_rate(&self) -> Option<f64> {
        let (first, last) = (self.samples.first()?, self.samples.last()?);
        let span = last.timestamp - first.timestamp;
        if self.samples.len() < 2 || !(span.is_finite() && span > 0.0) {
            return None;
        }
        Some((self.samples.len() - 1) as f64 / span)
    }
}

/// Local maximum of the raw signal, not yet classified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    pub index: usize,
    pub amplitude: f64,
}

impl PeakCandidate {
    pub fn new(index: usize, amplitude: f64) -> Self {
        Self { index, amplitude }
    }
}

/// Candidate accepted as a QRS complex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QrsEvent {
    pub index: usize,
    pub amplitude: f64,
}

/// RR intervals (milliseconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr_ms: Vec<f64>,
}

impl RRSeries {
    /// Successive index differences of `events`, converted to milliseconds at `fs`.
    ///
    /// Fewer than two events yield an empty series. `events` must be strictly
    /// increasing by index, as the classifier emits them.
    pub fn from_events(events: &[QrsEvent], fs: f64) -> Self {
        let rr_ms = events
            .windows(2)
            .map(|w| {
                debug_assert!(w[1].index > w[0].index, "QRS events out of order");
                w[1].index.saturating_sub(w[0].index) as f64 / fs * 1000.0
            })
            .collect();
        Self { rr_ms }
    }

    pub fn len(&self) -> usize {
        self.rr_ms.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rr_ms.is_empty()
    }
}
