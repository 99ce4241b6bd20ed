//! Scripted camera for tests and bench runs without hardware.

use shared::{CameraError, CameraInterface, CameraResult, CameraSettings, Frame};
use std::collections::VecDeque;

/// Camera backed by a fixed frame script.
///
/// Frames are yielded in order; when the script runs out the camera either
/// repeats the final frame (the default, which conveniently exercises the
/// frozen-frame path) or reports an exhausted error.
pub struct MockCamera {
    settings: CameraSettings,
    frames: VecDeque<Frame>,
    last: Option<Frame>,
    repeat_last: bool,
}

impl MockCamera {
    pub fn new(settings: CameraSettings, frames: Vec<Frame>) -> Self {
        Self {
            settings,
            frames: frames.into(),
            last: None,
            repeat_last: true,
        }
    }

    /// Error out instead of repeating the final frame when the script is
    /// exhausted.
    pub fn fail_when_exhausted(mut self) -> Self {
        self.repeat_last = false;
        self
    }

    /// A camera that produces an endless flat-gray scene.
    pub fn uniform(settings: CameraSettings, level: u8) -> Self {
        let mut frame = Frame::zeros((settings.height, settings.width, 3));
        frame.fill(level);
        Self::new(settings, vec![frame])
    }
}

impl CameraInterface for MockCamera {
    fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    fn read_frame(&mut self) -> CameraResult<Frame> {
        if let Some(frame) = self.frames.pop_front() {
            self.last = Some(frame.clone());
            return Ok(frame);
        }
        if self.repeat_last {
            if let Some(frame) = &self.last {
                return Ok(frame.clone());
            }
        }
        Err(CameraError::Exhausted {
            index: self.settings.index,
        })
    }
}

/// Endless camera that renders a green crop row drifting slowly across a
/// brown field. Useful for dry runs of the whole pipeline on a desk.
pub struct SyntheticRowCamera {
    settings: CameraSettings,
    tick: u64,
}

impl SyntheticRowCamera {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings, tick: 0 }
    }
}

impl CameraInterface for SyntheticRowCamera {
    fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    fn read_frame(&mut self) -> CameraResult<Frame> {
        let (width, height) = (self.settings.width, self.settings.height);
        let mut frame = Frame::zeros((height, width, 3));
        for row in 0..height {
            for col in 0..width {
                frame[[row, col, 0]] = 25;
                frame[[row, col, 1]] = 70;
                frame[[row, col, 2]] = 110;
            }
        }
        // Row sweeps across the middle half of the image, three columns wide.
        let sweep = width / 2;
        let phase = (self.tick % (2 * sweep as u64)) as usize;
        let drift = if phase < sweep { phase } else { 2 * sweep - phase };
        let row_col = width / 4 + drift;
        for row in 0..height {
            for col in row_col.saturating_sub(1)..(row_col + 2).min(width) {
                frame[[row, col, 0]] = 35;
                frame[[row, col, 1]] = 200;
                frame[[row, col, 2]] = 45;
            }
        }
        self.tick += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CameraSettings {
        CameraSettings {
            index: 0,
            width: 4,
            height: 2,
            rotated: false,
            saturation: 100,
            brightness: 96,
            contrast: 128,
            fps: 15,
        }
    }

    #[test]
    fn test_scripted_frames_in_order() {
        let mut a = Frame::zeros((2, 4, 3));
        a[[0, 0, 0]] = 1;
        let mut b = Frame::zeros((2, 4, 3));
        b[[0, 0, 0]] = 2;

        let mut camera = MockCamera::new(settings(), vec![a, b]);
        assert_eq!(camera.read_frame().unwrap()[[0, 0, 0]], 1);
        assert_eq!(camera.read_frame().unwrap()[[0, 0, 0]], 2);
    }

    #[test]
    fn test_repeats_last_frame_by_default() {
        let mut camera = MockCamera::uniform(settings(), 42);
        let first = camera.read_frame().unwrap();
        let second = camera.read_frame().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_synthetic_row_drifts() {
        let mut camera = SyntheticRowCamera::new(CameraSettings {
            width: 32,
            height: 4,
            ..settings()
        });
        let first = camera.read_frame().unwrap();
        let second = camera.read_frame().unwrap();
        // Consecutive frames must differ or the freeze detector would
        // discard the feed.
        assert_ne!(first, second);
    }

    #[test]
    fn test_fail_when_exhausted() {
        let mut camera =
            MockCamera::new(settings(), vec![Frame::zeros((2, 4, 3))]).fail_when_exhausted();
        assert!(camera.read_frame().is_ok());
        assert!(matches!(
            camera.read_frame(),
            Err(CameraError::Exhausted { index: 0 })
        ));
    }
}
