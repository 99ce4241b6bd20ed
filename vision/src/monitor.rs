//! Acquisition health monitoring.
//!
//! Wraps the per-camera read path: applies rotation, detects stuck feeds by
//! bit-comparison against the previous frame, and converts every per-camera
//! failure into an absent slot so one camera can never abort the cycle.

use shared::{frames_identical, transpose_frame, CameraInterface, Frame};
use tracing::{debug, warn};

/// Per-cycle frame acquisition with freeze detection.
///
/// Owns the camera handles and the per-camera previous-frame memory for the
/// lifetime of the control loop.
pub struct AcquisitionMonitor {
    cameras: Vec<Box<dyn CameraInterface>>,
    previous: Vec<Option<Frame>>,
    freeze_counts: Vec<u64>,
    failure_counts: Vec<u64>,
}

impl AcquisitionMonitor {
    pub fn new(cameras: Vec<Box<dyn CameraInterface>>) -> Self {
        let count = cameras.len();
        Self {
            cameras,
            previous: vec![None; count],
            freeze_counts: vec![0; count],
            failure_counts: vec![0; count],
        }
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Attempt one read per camera.
    ///
    /// Returns one slot per camera: a fresh frame, or `None` for a failed
    /// read or a frozen feed. Rotation is applied before the freeze
    /// comparison so downstream width/height semantics match the configured
    /// (possibly swapped) dimensions. A frozen frame still replaces the
    /// stored previous frame, so a feed that recovers is picked up on the
    /// next differing capture.
    pub fn acquire(&mut self) -> Vec<Option<Frame>> {
        let mut slots = Vec::with_capacity(self.cameras.len());

        for (index, camera) in self.cameras.iter_mut().enumerate() {
            let rotated = camera.settings().rotated;
            match camera.read_frame() {
                Ok(frame) => {
                    let frame = if rotated {
                        transpose_frame(&frame)
                    } else {
                        frame
                    };
                    let frozen = self.previous[index]
                        .as_ref()
                        .is_some_and(|prev| frames_identical(prev, &frame));
                    if frozen {
                        self.freeze_counts[index] += 1;
                        warn!(
                            camera = index,
                            freezes = self.freeze_counts[index],
                            "frozen frame; discarding stale feed"
                        );
                        self.previous[index] = Some(frame);
                        slots.push(None);
                    } else {
                        debug!(camera = index, shape = ?frame.dim(), "capture ok");
                        self.previous[index] = Some(frame.clone());
                        slots.push(Some(frame));
                    }
                }
                Err(error) => {
                    self.failure_counts[index] += 1;
                    warn!(camera = index, %error, "capture failed");
                    slots.push(None);
                }
            }
        }

        slots
    }

    /// Frozen-frame count per camera since startup.
    pub fn freeze_counts(&self) -> &[u64] {
        &self.freeze_counts
    }

    /// Failed-read count per camera since startup.
    pub fn failure_counts(&self) -> &[u64] {
        &self.failure_counts
    }
}
