//! GPS position and speed as of the most recent fix.

use serde::{Deserialize, Serialize};

/// Latest GPS fix.
///
/// Updated by the background GPS task and read by the control loop when it
/// assembles telemetry records. Staleness of up to a few cycles is
/// acceptable; a zeroed fix means no GPS has reported yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Ground speed in meters per second.
    pub speed: f64,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64, speed: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed,
        }
    }
}
