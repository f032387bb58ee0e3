use crate::signal::{PeakCandidate, Recording};
use serde::{Deserialize, Serialize};

/// Anything that can turn a raw recording into ordered peak candidates.
///
/// Implementations must return candidates strictly increasing by index.
pub trait PeakSource {
    fn candidates(&self, recording: &Recording) -> Vec<PeakCandidate>;
}

/// Local-maximum finder with a minimum height and a minimum spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalMaxima {
    /// Peaks below this amplitude are discarded.
    pub min_height: f64,
    /// Minimum distance in samples between two kept peaks.
    pub min_distance: usize,
}

impl Default for LocalMaxima {
    fn default() -> Self {
        Self {
            min_height: 0.35,
            min_distance: 50,
        }
    }
}

impl PeakSource for LocalMaxima {
    fn candidates(&self, recording: &Recording) -> Vec<PeakCandidate> {
        let data = recording.amplitudes();
        let mut peaks = local_maxima(&data);
        peaks.retain(|&i| data[i] >= self.min_height);
        let peaks = enforce_distance(&peaks, &data, self.min_distance);
        peaks
            .into_iter()
            .map(|i| PeakCandidate::new(recording.samples[i].index, data[i]))
            .collect()
    }
}

/// Positions of strict local maxima; flat tops resolve to their middle sample.
fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if data.len() < 3 {
        return peaks;
    }
    let last = data.len() - 1;
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Keep the tallest peaks first, dropping neighbours closer than `distance`.
fn enforce_distance(peaks: &[usize], data: &[f64], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| data[peaks[a]].total_cmp(&data[peaks[b]]));

    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(data: &[f64]) -> Recording {
        Recording::from_amplitudes(100.0, data)
    }

    #[test]
    fn finds_simple_maxima_above_height() {
        let finder = LocalMaxima {
            min_height: 0.5,
            min_distance: 1,
        };
        let peaks = finder.candidates(&rec(&[0.0, 1.0, 0.0, 0.3, 0.0, 0.8, 0.1]));
        assert_eq!(
            peaks,
            vec![PeakCandidate::new(1, 1.0), PeakCandidate::new(5, 0.8)]
        );
    }

    #[test]
    fn plateau_resolves_to_middle_sample() {
        let finder = LocalMaxima {
            min_height: 0.0,
            min_distance: 1,
        };
        let peaks = finder.candidates(&rec(&[0.0, 1.0, 1.0, 1.0, 0.0]));
        assert_eq!(peaks, vec![PeakCandidate::new(2, 1.0)]);
    }

    #[test]
    fn edges_and_rising_tail_are_not_peaks() {
        let finder = LocalMaxima {
            min_height: 0.0,
            min_distance: 1,
        };
        assert!(finder.candidates(&rec(&[2.0, 1.0, 0.5, 1.0, 1.0])).is_empty());
        assert!(finder.candidates(&rec(&[1.0, 2.0])).is_empty());
    }

    #[test]
    fn distance_keeps_taller_neighbour() {
        let finder = LocalMaxima {
            min_height: 0.0,
            min_distance: 5,
        };
        let data = [0.0, 0.6, 0.0, 0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.7, 0.0];
        let idx: Vec<usize> = finder
            .candidates(&rec(&data))
            .iter()
            .map(|c| c.index)
            .collect();
        assert_eq!(idx, vec![3, 9]);
    }

    #[test]
    fn candidates_are_strictly_increasing() {
        let data: Vec<f64> = (0..500).map(|i| ((i as f64) * 0.37).sin()).collect();
        let peaks = LocalMaxima::default().candidates(&rec(&data));
        assert!(peaks.windows(2).all(|w| w[1].index > w[0].index));
        assert!(peaks.windows(2).all(|w| w[1].index - w[0].index >= 50));
    }
}
