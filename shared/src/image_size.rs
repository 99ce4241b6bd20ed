//! Image dimensions and size utilities

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions structure
///
/// Represents the width and height of a camera frame. Provides convenience
/// methods for creating blank frames/masks and for the column geometry the
/// row estimator works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Dimensions with width and height exchanged.
    ///
    /// A camera mounted sideways reports swapped dimensions after the frame
    /// is transposed; this is the size downstream stages see.
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Center column of the image.
    ///
    /// Row offsets are expressed relative to this column.
    pub fn center_column(&self) -> i32 {
        (self.width / 2) as i32
    }

    /// Create a zeroed 3-channel frame with this size.
    ///
    /// Returns an ndarray Array3 of zeros with shape (height, width, 3).
    /// Note the row-major ordering convention: rows (height) come first.
    pub fn empty_frame(&self) -> Array3<u8> {
        Array3::zeros((self.height, self.width, 3))
    }

    /// Create a zeroed binary mask with this size.
    pub fn empty_mask(&self) -> Array2<u8> {
        Array2::zeros((self.height, self.width))
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Create from tuple (width, height)
    pub fn from_tuple(dimensions: (usize, usize)) -> Self {
        Self {
            width: dimensions.0,
            height: dimensions.1,
        }
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_tuple(dimensions)
    }
}

impl From<ImageSize> for (usize, usize) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapped_dimensions() {
        let size = ImageSize::from_width_height(640, 480);
        assert_eq!(size.swapped(), ImageSize::from_width_height(480, 640));
    }

    #[test]
    fn test_center_column() {
        assert_eq!(ImageSize::from_width_height(640, 480).center_column(), 320);
        assert_eq!(ImageSize::from_width_height(641, 480).center_column(), 320);
    }

    #[test]
    fn test_empty_frame_shape() {
        let size = ImageSize::from_width_height(64, 48);
        let frame = size.empty_frame();
        assert_eq!(frame.dim(), (48, 64, 3));
        let mask = size.empty_mask();
        assert_eq!(mask.dim(), (48, 64));
    }
}
