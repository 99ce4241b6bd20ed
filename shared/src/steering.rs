//! Fused row estimates and steering commands.
//!
//! These are the per-cycle outputs of the vision core that the telemetry
//! and display collaborators consume, so they live here rather than in the
//! `vision` crate.

use serde::Serialize;

/// Whether the cycle's estimate came from a detected row or the center
/// fallback.
///
/// The numeric fallback (offset zero) is indistinguishable from a perfectly
/// centered row, so the distinction is carried explicitly for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowConfidence {
    /// At least one camera produced a usable sample this cycle.
    Detected,
    /// No camera produced a sample; the estimate is the image center.
    Fallback,
}

/// Fused and smoothed row offset for one cycle, in center-relative pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowEstimate {
    /// Instantaneous estimate: the most confident camera's offset.
    pub estimate: f64,
    /// Arithmetic mean of the bounded offset history.
    pub average: f64,
    /// `estimate - average`.
    pub differential: f64,
    /// Detection confidence for this cycle.
    pub confidence: RowConfidence,
}

impl RowEstimate {
    /// Estimate for a cycle with no usable samples.
    pub fn fallback(average: f64) -> Self {
        Self {
            estimate: 0.0,
            average,
            differential: -average,
            confidence: RowConfidence::Fallback,
        }
    }
}

/// Actuator command for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteeringOutput {
    /// PWM-equivalent command, clamped to the configured actuator range.
    pub command: i32,
    /// Voltage corresponding to `command`, rounded to two decimals.
    pub voltage: f64,
}
