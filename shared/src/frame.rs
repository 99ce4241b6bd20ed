//! Frame and mask type aliases plus the frame-level helpers the
//! acquisition monitor needs.
//!
//! Frames are 3-channel BGR grids of shape (height, width, 3); masks are
//! binary grids of shape (height, width) with values 0 or 255. Both follow
//! the row-major (rows first) ndarray convention used across the workspace.

use ndarray::{Array2, Array3};

/// A captured 3-channel BGR frame, shape (height, width, 3).
pub type Frame = Array3<u8>;

/// A binary plant mask, shape (height, width), values 0 or 255.
pub type PlantMask = Array2<u8>;

/// Transpose a frame, exchanging rows and columns.
///
/// Used for cameras mounted sideways: an input of shape (h, w, 3) becomes
/// (w, h, 3), so downstream width/height semantics match the configured
/// (swapped) dimensions.
pub fn transpose_frame(frame: &Frame) -> Frame {
    let view = frame.view().permuted_axes([1, 0, 2]);
    // permuted_axes only changes strides; copy into standard layout so
    // downstream slicing stays contiguous.
    view.as_standard_layout().to_owned()
}

/// Bit-identical comparison of two frames.
///
/// A repeat of the previous frame from the same camera indicates a stalled
/// feed; the acquisition monitor treats it as a failed read.
pub fn frames_identical(a: &Frame, b: &Frame) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}
