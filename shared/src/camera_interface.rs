//! Camera abstraction for the guidance system.
//!
//! Drivers live in the `hardware` crate; the vision core only sees this
//! trait. A camera yields whole frames synchronously, one per read, and
//! reports failures through [`CameraError`] so that one camera's trouble
//! never aborts the rest of the cycle.

use crate::frame::Frame;
use thiserror::Error;

/// Per-camera device settings, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Device index (e.g. /dev/video{index}).
    pub index: usize,
    /// Configured sensor width in pixels (pre-rotation).
    pub width: usize,
    /// Configured sensor height in pixels (pre-rotation).
    pub height: usize,
    /// Camera is mounted sideways; frames are transposed after capture.
    pub rotated: bool,
    /// Device saturation setting, 0-255.
    pub saturation: i32,
    /// Device brightness setting, 0-255.
    pub brightness: i32,
    /// Device contrast setting, 0-255.
    pub contrast: i32,
    /// Requested capture rate in frames per second.
    pub fps: u32,
}

/// Errors a camera driver can surface on open or read.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device could not be opened.
    #[error("failed to open camera {index}: {message}")]
    OpenFailed { index: usize, message: String },

    /// A capture attempt returned no frame.
    #[error("capture failed on camera {index}: {message}")]
    CaptureFailed { index: usize, message: String },

    /// The driver returned a frame of unexpected geometry.
    #[error("camera {index} returned a {got_width}x{got_height} frame, expected {want_width}x{want_height}")]
    BadGeometry {
        index: usize,
        got_width: usize,
        got_height: usize,
        want_width: usize,
        want_height: usize,
    },

    /// The frame source is exhausted (mock cameras only).
    #[error("camera {index} has no more frames")]
    Exhausted { index: usize },
}

/// Result type for camera operations.
pub type CameraResult<T> = Result<T, CameraError>;

/// Interface implemented by all camera drivers.
///
/// `read_frame` blocks until a frame is available or the driver gives up.
/// The returned frame has the geometry of [`CameraSettings::width`] x
/// [`CameraSettings::height`]; rotation is applied downstream by the
/// acquisition monitor, not by the driver.
pub trait CameraInterface: Send {
    /// Settings this camera was opened with.
    fn settings(&self) -> &CameraSettings;

    /// Capture the next frame.
    fn read_frame(&mut self) -> CameraResult<Frame>;
}
