use crate::{
    error::{ensure_strictly_increasing, QrsError},
    signal::{QrsEvent, Sample},
};
use serde::{Deserialize, Serialize};

/// Raw samples with a QRS detection flag per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSignal {
    pub samples: Vec<Sample>,
    pub flags: Vec<u8>,
}

impl AnnotatedSignal {
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(sample, flag)` rows in export order.
    pub fn rows(&self) -> impl Iterator<Item = (&Sample, u8)> + '_ {
        self.samples.iter().zip(self.flags.iter().copied())
    }

    pub fn flagged_count(&self) -> usize {
        self.flags.iter().filter(|&&f| f == 1).count()
    }
}

/// Flag every sample whose index carries a QRS event.
pub fn annotate(samples: &[Sample], events: &[QrsEvent]) -> Result<AnnotatedSignal, QrsError> {
    ensure_strictly_increasing("sample", samples.iter().map(|s| s.index))?;
    let mut flags = vec![0u8; samples.len()];
    for event in events {
        let pos = samples
            .binary_search_by_key(&event.index, |s| s.index)
            .map_err(|_| QrsError::EventOutOfRange { index: event.index })?;
        flags[pos] = 1;
    }
    Ok(AnnotatedSignal {
        samples: samples.to_vec(),
        flags,
    })
}
