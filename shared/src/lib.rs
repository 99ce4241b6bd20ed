//! Shared components for the rowpilot guidance system.
//!
//! This crate holds the types that cross crate boundaries: frame and mask
//! aliases, the camera interface trait, the immutable guidance configuration,
//! GPS fix types, and the single-slot snapshot cell that the control loop
//! publishes into for the display and telemetry collaborators.

pub mod camera_interface;
pub mod config;
pub mod frame;
pub mod gps;
pub mod image_size;
pub mod snapshot;
pub mod steering;

pub use camera_interface::{CameraError, CameraInterface, CameraResult, CameraSettings};
pub use config::{ConfigError, GuidanceConfig};
pub use frame::{frames_identical, transpose_frame, Frame, PlantMask};
pub use gps::GpsFix;
pub use image_size::ImageSize;
pub use snapshot::{ControlSnapshot, SnapshotCell};
pub use steering::{RowConfidence, RowEstimate, SteeringOutput};
