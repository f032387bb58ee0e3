use thiserror::Error;

/// Failures surfaced at the boundary of a detection run.
///
/// Empty inputs are not errors: they produce empty event lists and `NaN` summaries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QrsError {
    #[error("{what} index {index} does not follow previous index {previous}")]
    InputOrderViolation {
        what: &'static str,
        index: usize,
        previous: usize,
    },
    #[error("invalid configuration: {field} = {value} ({reason})")]
    Configuration {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("{what} at index {index} has a non-finite amplitude")]
    NonFiniteAmplitude { what: &'static str, index: usize },
    #[error("QRS event at index {index} has no matching sample")]
    EventOutOfRange { index: usize },
}

impl QrsError {
    pub(crate) fn config(field: &'static str, value: f64, reason: &'static str) -> Self {
        QrsError::Configuration {
            field,
            value,
            reason,
        }
    }
}

/// Reject any index sequence that is not strictly increasing.
pub fn ensure_strictly_increasing<I>(what: &'static str, indices: I) -> Result<(), QrsError>
where
    I: IntoIterator<Item = usize>,
{
    let mut previous: Option<usize> = None;
    for index in indices {
        if let Some(prev) = previous {
            if index <= prev {
                return Err(QrsError::InputOrderViolation {
                    what,
                    index,
                    previous: prev,
                });
            }
        }
        previous = Some(index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_increasing_and_empty_sequences() {
        assert!(ensure_strictly_increasing("candidate", Vec::new()).is_ok());
        assert!(ensure_strictly_increasing("candidate", vec![0, 3, 9]).is_ok());
    }

    #[test]
    fn duplicate_index_is_an_order_violation() {
        let err = ensure_strictly_increasing("sample", vec![1, 4, 4]).unwrap_err();
        assert_eq!(
            err,
            QrsError::InputOrderViolation {
                what: "sample",
                index: 4,
                previous: 4
            }
        );
        assert_eq!(
            err.to_string(),
            "sample index 4 does not follow previous index 4"
        );
    }
}
