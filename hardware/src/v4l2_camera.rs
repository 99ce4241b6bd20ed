//! V4L2 webcam driver (Linux only, feature `v4l2`).

use shared::{CameraError, CameraInterface, CameraResult, CameraSettings, Frame};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Camera backed by a V4L2 device (`/dev/video{index}`).
pub struct V4l2Camera<'a> {
    settings: CameraSettings,
    #[allow(dead_code)] // keeps the device handle alive for the stream
    device: Device,
    stream: MmapStream<'a>,
}

impl<'a> V4l2Camera<'a> {
    /// Open and configure the device for 24-bit BGR capture.
    pub fn open(settings: CameraSettings) -> CameraResult<Self> {
        let open_err = |message: String| CameraError::OpenFailed {
            index: settings.index,
            message,
        };

        let device = Device::new(settings.index).map_err(|e| open_err(e.to_string()))?;

        let mut format = device.format().map_err(|e| open_err(e.to_string()))?;
        format.width = settings.width as u32;
        format.height = settings.height as u32;
        format.fourcc = v4l::FourCC::new(b"BGR3");
        let format = device
            .set_format(&format)
            .map_err(|e| open_err(e.to_string()))?;
        if format.fourcc != v4l::FourCC::new(b"BGR3") {
            return Err(open_err(format!(
                "device does not support BGR3 capture (got {})",
                format.fourcc
            )));
        }

        if let Ok(controls) = device.query_controls() {
            for control_desc in controls {
                let value = match control_desc.name.as_str() {
                    "Saturation" | "saturation" => settings.saturation,
                    "Brightness" | "brightness" => settings.brightness,
                    "Contrast" | "contrast" => settings.contrast,
                    _ => continue,
                };
                let ctrl = v4l::Control {
                    id: control_desc.id,
                    value: v4l::control::Value::Integer(value as i64),
                };
                let _ = device.set_control(ctrl);
            }
        }

        let mut params = device.params().map_err(|e| open_err(e.to_string()))?;
        params.interval = v4l::Fraction::new(1, settings.fps);
        let _ = device.set_params(&params);

        let stream =
            MmapStream::new(&device, Type::VideoCapture).map_err(|e| open_err(e.to_string()))?;

        Ok(Self {
            settings,
            device,
            stream,
        })
    }
}

impl<'a> CameraInterface for V4l2Camera<'a> {
    fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    fn read_frame(&mut self) -> CameraResult<Frame> {
        let index = self.settings.index;
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed {
                index,
                message: e.to_string(),
            })?;

        let (width, height) = (self.settings.width, self.settings.height);
        let expected = width * height * 3;
        if buf.len() < expected {
            return Err(CameraError::CaptureFailed {
                index,
                message: format!("short frame: {} of {expected} bytes", buf.len()),
            });
        }

        Frame::from_shape_vec((height, width, 3), buf[..expected].to_vec()).map_err(|_| {
            CameraError::BadGeometry {
                index,
                got_width: 0,
                got_height: 0,
                want_width: width,
                want_height: height,
            }
        })
    }
}
