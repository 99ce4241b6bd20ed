//! Device drivers for the rowpilot guidance system.
//!
//! This crate provides the hardware-facing implementations behind the
//! `shared` interfaces: camera drivers, the serial hydraulic actuator link,
//! and the gpsd client. The V4L2 webcam driver is feature-gated so the rest
//! of the workspace builds on any platform.

pub mod actuator;
pub mod gps;
pub mod mock_camera;

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod v4l2_camera;

pub use actuator::{ActuatorError, HydraulicLink};
pub use gps::GpsMonitor;
pub use mock_camera::{MockCamera, SyntheticRowCamera};

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub use v4l2_camera::V4l2Camera;
