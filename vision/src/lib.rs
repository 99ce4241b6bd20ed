//! Row detection and steering control core.
//!
//! This crate implements the vision-guided steering pipeline: acquisition
//! health monitoring, plant segmentation, row offset estimation, fusion and
//! smoothing of per-camera estimates, and the control law that turns a pixel
//! offset into an actuator command. It performs no device I/O; cameras come
//! in through the `shared::CameraInterface` trait and commands leave as
//! plain values.

pub mod control;
pub mod estimator;
pub mod fusion;
pub mod monitor;
pub mod segment;
pub mod stats;

pub use control::SteeringLaw;
pub use estimator::{estimate_offset, OffsetSample};
pub use fusion::{OffsetHistory, RowFuser};
pub use monitor::AcquisitionMonitor;
pub use segment::{ColorThreshold, PlantFilter, SegmentationError};
