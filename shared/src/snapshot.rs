//! Single-slot publication of per-cycle control state.
//!
//! The control loop overwrites the cell once per cycle; the display and any
//! other observers read the latest snapshot on their own schedule. Reads are
//! deliberately eventually-consistent: a reader may see a snapshot at most
//! one cycle old, and a contended reader simply skips rather than blocking
//! the control thread.

use crate::frame::{Frame, PlantMask};
use crate::gps::GpsFix;
use crate::steering::{RowEstimate, SteeringOutput};
use std::sync::{Arc, Mutex};

/// Everything one control cycle produced.
#[derive(Debug, Clone)]
pub struct ControlSnapshot {
    /// Monotonic cycle counter.
    pub cycle: u64,
    /// Per-camera frames; `None` where acquisition failed or froze.
    pub frames: Vec<Option<Frame>>,
    /// Per-camera plant masks; `None` where the frame was absent.
    pub masks: Vec<Option<PlantMask>>,
    /// Per-camera raw offsets that survived estimation.
    pub offsets: Vec<i32>,
    /// Fused and smoothed row estimate.
    pub row: RowEstimate,
    /// Actuator command issued this cycle.
    pub steering: SteeringOutput,
    /// GPS fix as of this cycle.
    pub gps: GpsFix,
    /// Record timestamp, formatted per the configured time format.
    pub time: String,
}

/// Overwrite-on-write shared cell holding the latest snapshot.
///
/// Cloning the cell clones the handle, not the contents.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell {
    slot: Arc<Mutex<Option<ControlSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot. Last write wins.
    pub fn publish(&self, snapshot: ControlSnapshot) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            // A reader panicked mid-clone; the slot contents are still
            // plain data, so keep publishing.
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(snapshot);
    }

    /// Clone out the latest snapshot, blocking briefly if a writer holds
    /// the lock.
    pub fn latest(&self) -> Option<ControlSnapshot> {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Non-blocking read: `None` if the lock is contended or nothing has
    /// been published yet.
    pub fn try_latest(&self) -> Option<ControlSnapshot> {
        self.slot.try_lock().ok().and_then(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steering::RowConfidence;

    fn snapshot(cycle: u64) -> ControlSnapshot {
        ControlSnapshot {
            cycle,
            frames: vec![None],
            masks: vec![None],
            offsets: vec![],
            row: RowEstimate {
                estimate: 0.0,
                average: 0.0,
                differential: 0.0,
                confidence: RowConfidence::Fallback,
            },
            steering: SteeringOutput {
                command: 1500,
                voltage: 2.5,
            },
            gps: GpsFix::default(),
            time: String::new(),
        }
    }

    #[test]
    fn test_empty_cell_reads_none() {
        let cell = SnapshotCell::new();
        assert!(cell.latest().is_none());
        assert!(cell.try_latest().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cell = SnapshotCell::new();
        cell.publish(snapshot(1));
        cell.publish(snapshot(2));
        assert_eq!(cell.latest().unwrap().cycle, 2);
    }

    #[test]
    fn test_handle_clone_shares_slot() {
        let cell = SnapshotCell::new();
        let reader = cell.clone();
        cell.publish(snapshot(7));
        assert_eq!(reader.try_latest().unwrap().cycle, 7);
    }
}
