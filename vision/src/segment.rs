//! Plant segmentation filter.
//!
//! Converts a BGR frame to HSV and keeps pixels inside a hue band fixed by
//! configuration and a saturation/value band derived from the frame itself:
//! the configured soft bounds are read as percentile ranks of the frame's
//! own channel distributions, so the filter tracks lighting changes from
//! frame to frame without retuning.

use crate::stats::percentile_from_histogram;
use ndarray::Array3;
use shared::{Frame, GuidanceConfig, PlantMask};
use thiserror::Error;
use tracing::trace;

/// Errors raised while segmenting a single frame.
///
/// These are isolated per camera by the caller; a malformed frame costs one
/// camera one cycle, nothing more.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("frame has {channels} channels, expected 3")]
    BadChannelCount { channels: usize },

    #[error("frame is empty")]
    EmptyFrame,
}

/// HSV in-range bounds for one frame.
///
/// The hue band comes straight from configuration; the saturation and value
/// bounds are recomputed from each frame's percentile statistics. Lifecycle
/// is exactly one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorThreshold {
    pub hue_min: u8,
    pub hue_max: u8,
    pub sat_min: u8,
    pub sat_max: u8,
    pub val_min: u8,
    pub val_max: u8,
}

impl ColorThreshold {
    /// In-range test for a single HSV pixel.
    #[inline]
    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        (self.hue_min..=self.hue_max).contains(&h)
            && (self.sat_min..=self.sat_max).contains(&s)
            && (self.val_min..=self.val_max).contains(&v)
    }
}

/// Convert one BGR pixel to HSV, OpenCV 8-bit conventions.
///
/// Hue is halved into [0, 179]; saturation and value are [0, 255].
pub fn bgr_to_hsv(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let (bf, gf, rf) = (b as f64, g as f64, r as f64);
    let v = bf.max(gf).max(rf);
    let min = bf.min(gf).min(rf);
    let delta = v - min;

    let s = if v > 0.0 {
        (255.0 * delta / v).round()
    } else {
        0.0
    };

    let h = if delta > 0.0 {
        let deg = if v == rf {
            60.0 * (gf - bf) / delta
        } else if v == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        let deg = if deg < 0.0 { deg + 360.0 } else { deg };
        let half = (deg / 2.0).round();
        if half >= 180.0 {
            0.0
        } else {
            half
        }
    } else {
        0.0
    };

    (h as u8, s as u8, v as u8)
}

/// Per-frame adaptive plant filter.
#[derive(Debug, Clone)]
pub struct PlantFilter {
    hue_min: u8,
    hue_max: u8,
    sat_min: u8,
    val_min: u8,
    val_max: u8,
}

impl PlantFilter {
    pub fn new(config: &GuidanceConfig) -> Self {
        Self {
            hue_min: config.hue_min,
            hue_max: config.hue_max,
            sat_min: config.sat_min,
            val_min: config.val_min,
            val_max: config.val_max,
        }
    }

    /// Derive this frame's in-range bounds from its channel histograms.
    ///
    /// The configured sat/val bounds are 0-255 levels reinterpreted as
    /// percentile ranks (level/255 of the distribution), which is what makes
    /// the filter self-adapting; the saturation ceiling stays at full range.
    fn thresholds(&self, sat_counts: &[u64; 256], val_counts: &[u64; 256], total: u64) -> ColorThreshold {
        let sat_rank = 100.0 * self.sat_min as f64 / 255.0;
        let val_lo_rank = 100.0 * self.val_min as f64 / 255.0;
        let val_hi_rank = 100.0 * self.val_max as f64 / 255.0;

        ColorThreshold {
            hue_min: self.hue_min,
            hue_max: self.hue_max,
            sat_min: percentile_from_histogram(sat_counts, total, sat_rank) as u8,
            sat_max: 255,
            val_min: percentile_from_histogram(val_counts, total, val_lo_rank) as u8,
            val_max: percentile_from_histogram(val_counts, total, val_hi_rank) as u8,
        }
    }

    /// Segment one frame into a binary plant mask.
    pub fn mask_frame(&self, frame: &Frame) -> Result<PlantMask, SegmentationError> {
        let (height, width, channels) = frame.dim();
        if channels != 3 {
            return Err(SegmentationError::BadChannelCount { channels });
        }
        if height == 0 || width == 0 {
            return Err(SegmentationError::EmptyFrame);
        }

        // First pass: HSV conversion plus channel histograms for the
        // adaptive bounds.
        let mut hsv = Array3::<u8>::zeros((height, width, 3));
        let mut sat_counts = [0u64; 256];
        let mut val_counts = [0u64; 256];
        for row in 0..height {
            for col in 0..width {
                let (h, s, v) = bgr_to_hsv(
                    frame[[row, col, 0]],
                    frame[[row, col, 1]],
                    frame[[row, col, 2]],
                );
                hsv[[row, col, 0]] = h;
                hsv[[row, col, 1]] = s;
                hsv[[row, col, 2]] = v;
                sat_counts[s as usize] += 1;
                val_counts[v as usize] += 1;
            }
        }

        let total = (height * width) as u64;
        let threshold = self.thresholds(&sat_counts, &val_counts, total);
        trace!(?threshold, "segmentation thresholds");

        // Second pass: in-range test.
        let mut mask = PlantMask::zeros((height, width));
        for row in 0..height {
            for col in 0..width {
                if threshold.contains(
                    hsv[[row, col, 0]],
                    hsv[[row, col, 1]],
                    hsv[[row, col, 2]],
                ) {
                    mask[[row, col]] = 255;
                }
            }
        }

        Ok(mask)
    }
}
