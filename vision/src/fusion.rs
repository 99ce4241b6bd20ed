//! Fusion of per-camera samples and temporal smoothing.
//!
//! Fusion is selection, not averaging: the sample with the strongest column
//! energy wins outright. Smoothing is a bounded moving average over past
//! fused estimates - deliberately a plain arithmetic mean, which downstream
//! output parity depends on.

use crate::estimator::OffsetSample;
use shared::{RowConfidence, RowEstimate};
use std::collections::VecDeque;
use tracing::debug;

/// Fixed-capacity FIFO of past fused estimates.
///
/// Seeded at startup with the re-centered image-center value (zero) so the
/// average starts neutral rather than empty. Lives for the whole process.
#[derive(Debug, Clone)]
pub struct OffsetHistory {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl OffsetHistory {
    /// History seeded with `capacity` center (zero) entries.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be at least 1");
        let mut buffer = VecDeque::with_capacity(capacity + 1);
        buffer.extend(std::iter::repeat(0.0).take(capacity));
        Self { buffer, capacity }
    }

    /// Append the newest estimate, evicting the oldest beyond capacity.
    pub fn push(&mut self, estimate: f64) {
        self.buffer.push_back(estimate);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    /// Arithmetic mean of the current contents.
    pub fn mean(&self) -> f64 {
        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Contents in insertion order, oldest first.
    pub fn as_slices(&self) -> (&[f64], &[f64]) {
        self.buffer.as_slices()
    }
}

/// Picks the most confident camera and maintains the smoothed estimate.
#[derive(Debug)]
pub struct RowFuser {
    history: OffsetHistory,
}

impl RowFuser {
    pub fn new(num_averages: usize) -> Self {
        Self {
            history: OffsetHistory::new(num_averages),
        }
    }

    /// Fuse this cycle's per-camera samples into a smoothed estimate.
    ///
    /// Only samples with real signal are eligible; degenerate reads and
    /// zero-strength candidates carry no plant evidence, so a cycle with
    /// nothing better falls back to the image center (zero, in
    /// center-relative coordinates) and is flagged
    /// [`RowConfidence::Fallback`] so telemetry can tell it apart from a
    /// genuinely centered row. The fallback still enters the history; a
    /// sustained dropout therefore pulls the average back toward center.
    pub fn fuse(&mut self, samples: &[OffsetSample]) -> RowEstimate {
        let best = samples
            .iter()
            .filter(|sample| !sample.degenerate && sample.strength > 0.0)
            .max_by(|a, b| a.strength.total_cmp(&b.strength));

        match best {
            Some(sample) => {
                let estimate = sample.offset as f64;
                self.history.push(estimate);
                let average = self.history.mean();
                let differential = estimate - average;
                debug!(estimate, average, differential, "fused row estimate");
                RowEstimate {
                    estimate,
                    average,
                    differential,
                    confidence: RowConfidence::Detected,
                }
            }
            None => {
                self.history.push(0.0);
                let average = self.history.mean();
                debug!(average, "no usable samples; falling back to center");
                RowEstimate::fallback(average)
            }
        }
    }

    pub fn history(&self) -> &OffsetHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(offset: i32, strength: f64) -> OffsetSample {
        OffsetSample {
            offset,
            strength,
            degenerate: false,
        }
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut history = OffsetHistory::new(4);
        for i in 0..20 {
            history.push(i as f64);
            assert!(history.len() <= 4);
        }
    }

    #[test]
    fn test_history_keeps_last_capacity_values_in_order() {
        let mut history = OffsetHistory::new(3);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            history.push(value);
        }
        let (a, b) = history.as_slices();
        let contents: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(contents, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_mean_matches_direct_computation() {
        let mut history = OffsetHistory::new(5);
        for value in [10.0, -4.0, 6.0] {
            history.push(value);
        }
        // Two seed zeros remain alongside the three pushed values.
        assert_relative_eq!(history.mean(), (0.0 + 0.0 + 10.0 - 4.0 + 6.0) / 5.0);
    }

    #[test]
    fn test_strongest_sample_wins() {
        let mut fuser = RowFuser::new(5);
        let est = fuser.fuse(&[sample(-40, 100.0), sample(80, 1000.0), sample(10, 50.0)]);
        assert_relative_eq!(est.estimate, 80.0);
        assert_eq!(est.confidence, RowConfidence::Detected);
    }

    #[test]
    fn test_no_samples_falls_back_to_center() {
        let mut fuser = RowFuser::new(5);
        let est = fuser.fuse(&[]);
        assert_relative_eq!(est.estimate, 0.0);
        assert_eq!(est.confidence, RowConfidence::Fallback);
    }

    #[test]
    fn test_first_sample_smoothing_scenario() {
        // Seeded history of five zeros; first real sample of 80 leaves
        // [0, 0, 0, 0, 80] -> average 16, differential 64.
        let mut fuser = RowFuser::new(5);
        let est = fuser.fuse(&[sample(80, 1000.0)]);
        assert_relative_eq!(est.estimate, 80.0);
        assert_relative_eq!(est.average, 16.0);
        assert_relative_eq!(est.differential, 64.0);
    }

    #[test]
    fn test_all_degenerate_cycle_falls_back() {
        let mut fuser = RowFuser::new(5);
        let degenerate = OffsetSample {
            offset: -3,
            strength: 0.0,
            degenerate: true,
        };
        let est = fuser.fuse(&[degenerate]);
        assert_relative_eq!(est.estimate, 0.0);
        assert_eq!(est.confidence, RowConfidence::Fallback);
    }

    #[test]
    fn test_undiscriminating_mask_does_not_steer() {
        use crate::estimator::estimate_offset;
        use shared::PlantMask;

        // 95 of 100 columns hot at 95th percentile: the cutoff cannot
        // discriminate and the read comes back degenerate. Its median
        // offset is meaningless and must not reach the steering law.
        let mut mask = PlantMask::zeros((10, 100));
        for col in 0..95 {
            for row in 0..10 {
                mask[[row, col]] = 255;
            }
        }
        let sample = estimate_offset(&mask, 95.0, 50).unwrap();
        assert!(sample.degenerate);

        let mut fuser = RowFuser::new(5);
        let est = fuser.fuse(&[sample]);
        assert_relative_eq!(est.estimate, 0.0);
        assert_eq!(est.confidence, RowConfidence::Fallback);
    }

    #[test]
    fn test_degenerate_zero_strength_loses_to_detection() {
        let mut fuser = RowFuser::new(5);
        let degenerate = OffsetSample {
            offset: 200,
            strength: 0.0,
            degenerate: true,
        };
        let est = fuser.fuse(&[degenerate, sample(-30, 12.0)]);
        assert_relative_eq!(est.estimate, -30.0);
    }
}
