//! Row offset estimation from a plant mask.
//!
//! The mask is collapsed into a column-energy profile (vertical sums), the
//! profile is thresholded at a configured percentile, and the median of the
//! qualifying columns is taken as the row candidate. The energy at that
//! column is the sample's signal strength, which fusion uses to pick
//! between cameras.

use crate::stats::percentile;
use shared::PlantMask;
use tracing::{debug, warn};

/// One camera's row candidate for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetSample {
    /// Candidate column relative to the image center; negative is left.
    pub offset: i32,
    /// Column energy at the candidate column. Zeroed for degenerate reads.
    pub strength: f64,
    /// The percentile cutoff degenerated (uniform profile); the offset is
    /// not trustworthy and the strength has been zeroed.
    pub degenerate: bool,
}

/// Estimate the row offset from one mask.
///
/// Qualifying columns are those at or above the percentile threshold;
/// zero-energy columns never qualify since they carry no plant signal.
/// Returns `None` when nothing qualifies (blank mask, empty profile); that
/// camera simply contributes nothing this cycle.
///
/// A degenerate read - a uniform profile, or a qualifying count of exactly
/// `width * percentile / 100` - keeps its median offset but is flagged and
/// has its strength zeroed, so fusion prefers any real detection over it.
pub fn estimate_offset(
    mask: &PlantMask,
    threshold_percentile: f64,
    center: i32,
) -> Option<OffsetSample> {
    let (height, width) = mask.dim();
    if height == 0 || width == 0 {
        return None;
    }

    // Vertical summation: one energy value per column.
    let profile: Vec<f64> = (0..width)
        .map(|col| (0..height).map(|row| mask[[row, col]] as u64).sum::<u64>() as f64)
        .collect();

    let threshold = percentile(&profile, threshold_percentile)?;
    let qualifying: Vec<usize> = profile
        .iter()
        .enumerate()
        .filter(|(_, &energy)| energy >= threshold && energy > 0.0)
        .map(|(col, _)| col)
        .collect();
    if qualifying.is_empty() {
        debug!("no qualifying columns; no sample this cycle");
        return None;
    }

    let max_energy = profile.iter().copied().fold(f64::MIN, f64::max);
    let min_energy = profile.iter().copied().fold(f64::MAX, f64::min);
    let degenerate = max_energy == min_energy
        || qualifying.len() as f64 == width as f64 * threshold_percentile / 100.0;
    if degenerate {
        warn!(
            qualifying = qualifying.len(),
            width, "degenerate column profile; flagging low confidence"
        );
    }

    let best = median_column(&qualifying);
    let strength = if degenerate { 0.0 } else { profile[best] };
    let offset = best as i32 - center;
    debug!(offset, strength, degenerate, "row candidate");

    Some(OffsetSample {
        offset,
        strength,
        degenerate,
    })
}

/// Median of a sorted index list, truncated to an integer column.
fn median_column(sorted: &[usize]) -> usize {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    }
}
