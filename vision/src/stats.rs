//! Percentile statistics over channels and profiles.
//!
//! Both the segmentation filter (per-frame adaptive thresholds) and the row
//! estimator (column-energy cutoff) rank a distribution at a configured
//! percentile. The interpolation convention is the linear one: rank
//! `p/100 * (n-1)`, interpolating between the two nearest order statistics.

/// Percentile of a u8 sample set described by a 256-bin histogram.
///
/// Equivalent to sorting the samples and interpolating, but O(1) in the
/// sample count once the histogram is built. `total` must be the sum of
/// `counts` and non-zero.
pub fn percentile_from_histogram(counts: &[u64; 256], total: u64, percentile: f64) -> f64 {
    debug_assert!(total > 0);
    let rank = percentile.clamp(0.0, 100.0) / 100.0 * (total - 1) as f64;
    let lo_idx = rank.floor() as u64;
    let hi_idx = rank.ceil() as u64;
    let frac = rank - rank.floor();

    let lo = value_at(counts, lo_idx);
    let hi = value_at(counts, hi_idx);
    lo as f64 + (hi as f64 - lo as f64) * frac
}

/// The `idx`-th smallest value (0-based) in the histogram.
fn value_at(counts: &[u64; 256], idx: u64) -> u8 {
    let mut seen = 0u64;
    for (value, &count) in counts.iter().enumerate() {
        seen += count;
        if seen > idx {
            return value as u8;
        }
    }
    255
}

/// Percentile of an f64 slice with linear interpolation.
///
/// Returns `None` for an empty slice; NaN inputs sort last.
pub fn percentile(values: &[f64], percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Less));

    let rank = percentile.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = sorted[rank.floor() as usize];
    let hi = sorted[rank.ceil() as usize];
    Some(lo + (hi - lo) * (rank - rank.floor()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_endpoints() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&values, 100.0).unwrap(), 4.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.0, 10.0];
        assert_relative_eq!(percentile(&values, 50.0).unwrap(), 5.0);
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&values, 25.0).unwrap(), 2.0);
    }

    #[test]
    fn test_percentile_unsorted_input() {
        let values = [9.0, 1.0, 5.0];
        assert_relative_eq!(percentile(&values, 50.0).unwrap(), 5.0);
    }

    #[test]
    fn test_percentile_empty() {
        assert!(percentile(&[], 50.0).is_none());
    }

    #[test]
    fn test_histogram_matches_direct() {
        let samples: Vec<u8> = vec![0, 0, 10, 20, 30, 200, 255];
        let mut counts = [0u64; 256];
        for &s in &samples {
            counts[s as usize] += 1;
        }
        let direct: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        for p in [0.0, 12.5, 50.0, 87.5, 100.0] {
            assert_relative_eq!(
                percentile_from_histogram(&counts, samples.len() as u64, p),
                percentile(&direct, p).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_histogram_uniform_value() {
        let mut counts = [0u64; 256];
        counts[42] = 100;
        assert_relative_eq!(percentile_from_histogram(&counts, 100, 95.0), 42.0);
    }
}
