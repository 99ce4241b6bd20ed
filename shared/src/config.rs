//! Guidance configuration.
//!
//! One flat, immutable configuration struct loaded from a JSON file at
//! startup and passed by reference everywhere. Unknown keys are rejected at
//! load time rather than silently ignored, and derived geometry (image
//! center, pixel-per-cm scale, tolerance band, center command) is computed
//! once here instead of being scattered through the pipeline.

use crate::camera_interface::CameraSettings;
use crate::image_size::ImageSize;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

fn default_gpsd_addr() -> String {
    "127.0.0.1:2947".to_string()
}

fn default_session_format() -> String {
    "%Y%m%d_%H%M%S".to_string()
}

fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S%.f".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Includes unknown-key rejections from `deny_unknown_fields`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete guidance configuration.
///
/// Field names mirror the flat parameter surface of the deployment config
/// files. All values are fixed for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuidanceConfig {
    /// Number of physical cameras.
    pub cameras: usize,
    /// Sensor width in pixels (pre-rotation).
    pub camera_width: usize,
    /// Sensor height in pixels (pre-rotation).
    pub camera_height: usize,
    /// Cameras are mounted sideways; frames are transposed after capture.
    #[serde(default)]
    pub camera_rotated: bool,
    /// Device saturation setting, 0-255.
    pub camera_saturation: i32,
    /// Device brightness setting, 0-255.
    pub camera_brightness: i32,
    /// Device contrast setting, 0-255.
    pub camera_contrast: i32,
    /// Requested capture rate, frames per second.
    pub camera_fps: u32,
    /// Camera height above the ground in centimeters.
    pub camera_depth_cm: f64,
    /// Camera field of view in radians.
    pub camera_fov_rad: f64,
    /// Acceptable lateral error in centimeters; sets the tolerance band
    /// drawn by the display overlay.
    pub error_tolerance_cm: f64,

    /// Hue band lower bound, OpenCV convention (0-179).
    pub hue_min: u8,
    /// Hue band upper bound, OpenCV convention (0-179).
    pub hue_max: u8,
    /// Saturation floor, 0-255. Interpreted as a percentile rank
    /// (100 * sat_min / 255) of each frame's own saturation channel.
    pub sat_min: u8,
    /// Saturation ceiling, 0-255. Fixed at full range by the filter.
    pub sat_max: u8,
    /// Value floor, 0-255. Interpreted as a percentile rank of each
    /// frame's own value channel.
    pub val_min: u8,
    /// Value ceiling, 0-255. Interpreted as a percentile rank of each
    /// frame's own value channel.
    pub val_max: u8,

    /// Column-energy percentile for row detection (e.g. 95.0).
    pub threshold_percentile: f64,
    /// Moving-average window for offset smoothing.
    pub num_averages: usize,

    /// Proportional gain applied to the instantaneous estimate.
    pub kp: f64,
    /// Integral gain applied to the smoothed average.
    pub ki: f64,
    /// Derivative gain applied to the differential.
    pub kd: f64,
    /// Actuator command lower bound.
    pub pwm_min: i32,
    /// Actuator command upper bound.
    pub pwm_max: i32,
    /// Voltage reported at pwm_min.
    pub min_voltage: f64,
    /// Voltage reported at pwm_max.
    pub max_voltage: f64,

    /// Serial device path of the hydraulic controller.
    pub serial_device: String,
    /// Serial baud rate of the hydraulic controller.
    pub serial_baud: u32,
    /// Address of the gpsd daemon.
    #[serde(default = "default_gpsd_addr")]
    pub gpsd_addr: String,

    /// Directory for session logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Session name timestamp format (chrono).
    #[serde(default = "default_session_format")]
    pub session_format: String,
    /// Per-record timestamp format (chrono).
    #[serde(default = "default_time_format")]
    pub time_format: String,

    /// Publish snapshots to the display task.
    #[serde(default)]
    pub display_on: bool,
    /// Display renders the mask with marker columns instead of raw frames.
    #[serde(default)]
    pub highlight: bool,
    /// Insert per-cycle documents into the telemetry store.
    #[serde(default)]
    pub telemetry_on: bool,
    /// Append per-cycle rows to the CSV session log.
    #[serde(default)]
    pub logfile_on: bool,
}

impl GuidanceConfig {
    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras == 0 {
            return Err(ConfigError::Invalid("cameras must be at least 1".into()));
        }
        if self.camera_width == 0 || self.camera_height == 0 {
            return Err(ConfigError::Invalid(
                "camera dimensions must be non-zero".into(),
            ));
        }
        if self.hue_min > self.hue_max {
            return Err(ConfigError::Invalid("hue_min exceeds hue_max".into()));
        }
        if !(0.0..=100.0).contains(&self.threshold_percentile) {
            return Err(ConfigError::Invalid(
                "threshold_percentile must be within 0-100".into(),
            ));
        }
        if self.num_averages == 0 {
            return Err(ConfigError::Invalid(
                "num_averages must be at least 1".into(),
            ));
        }
        if self.pwm_min >= self.pwm_max {
            return Err(ConfigError::Invalid(
                "pwm_min must be below pwm_max".into(),
            ));
        }
        if self.min_voltage >= self.max_voltage {
            return Err(ConfigError::Invalid(
                "min_voltage must be below max_voltage".into(),
            ));
        }
        if self.camera_fov_rad <= 0.0 || self.camera_depth_cm <= 0.0 {
            return Err(ConfigError::Invalid(
                "camera_fov_rad and camera_depth_cm must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Frame dimensions as seen downstream of the acquisition monitor
    /// (swapped when the cameras are mounted rotated).
    pub fn frame_size(&self) -> ImageSize {
        let size = ImageSize::from_width_height(self.camera_width, self.camera_height);
        if self.camera_rotated {
            size.swapped()
        } else {
            size
        }
    }

    /// Center column all offsets are measured against.
    pub fn center_column(&self) -> i32 {
        self.frame_size().center_column()
    }

    /// Width of ground covered by the frame, in centimeters.
    pub fn ground_width_cm(&self) -> f64 {
        2.0 * self.camera_depth_cm * (self.camera_fov_rad / 2.0).tan()
    }

    /// Image scale in pixels per centimeter of ground.
    pub fn pixels_per_cm(&self) -> f64 {
        self.frame_size().width as f64 / self.ground_width_cm()
    }

    /// Half-width of the tolerance band in pixels.
    pub fn pixel_tolerance(&self) -> i32 {
        (self.pixels_per_cm() * self.error_tolerance_cm) as i32
    }

    /// Leftmost column of the tolerance band.
    pub fn pixel_min(&self) -> i32 {
        self.center_column() - self.pixel_tolerance()
    }

    /// Rightmost column of the tolerance band.
    pub fn pixel_max(&self) -> i32 {
        self.center_column() + self.pixel_tolerance()
    }

    /// Midpoint of the actuator range; the neutral steering command.
    pub fn center_command(&self) -> i32 {
        (self.pwm_min + self.pwm_max) / 2
    }

    /// Device settings for camera `index`.
    pub fn camera_settings(&self, index: usize) -> CameraSettings {
        CameraSettings {
            index,
            width: self.camera_width,
            height: self.camera_height,
            rotated: self.camera_rotated,
            saturation: self.camera_saturation,
            brightness: self.camera_brightness,
            contrast: self.camera_contrast,
            fps: self.camera_fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) const TEST_CONFIG: &str = r#"{
        "cameras": 2,
        "camera_width": 640,
        "camera_height": 480,
        "camera_rotated": false,
        "camera_saturation": 100,
        "camera_brightness": 96,
        "camera_contrast": 128,
        "camera_fps": 15,
        "camera_depth_cm": 100.0,
        "camera_fov_rad": 0.7,
        "error_tolerance_cm": 5.0,
        "hue_min": 30,
        "hue_max": 90,
        "sat_min": 64,
        "sat_max": 255,
        "val_min": 32,
        "val_max": 240,
        "threshold_percentile": 95.0,
        "num_averages": 5,
        "kp": 1.0,
        "ki": 0.5,
        "kd": 0.25,
        "pwm_min": 1000,
        "pwm_max": 2000,
        "min_voltage": 0.0,
        "max_voltage": 5.0,
        "serial_device": "/dev/ttyUSB0",
        "serial_baud": 9600
    }"#;

    #[test]
    fn test_load_valid_config() {
        let config = GuidanceConfig::from_json(TEST_CONFIG).unwrap();
        assert_eq!(config.cameras, 2);
        assert_eq!(config.center_column(), 320);
        assert_eq!(config.center_command(), 1500);
        assert_eq!(config.gpsd_addr, "127.0.0.1:2947");
        assert!(!config.display_on);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let text = TEST_CONFIG.replacen("\"cameras\": 2", "\"cameras\": 2, \"mystery\": 1", 1);
        match GuidanceConfig::from_json(&text) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_rotated_swaps_frame_size() {
        let text = TEST_CONFIG.replacen(
            "\"camera_rotated\": false",
            "\"camera_rotated\": true",
            1,
        );
        let config = GuidanceConfig::from_json(&text).unwrap();
        assert_eq!(config.frame_size(), ImageSize::from_width_height(480, 640));
        assert_eq!(config.center_column(), 240);
    }

    #[test]
    fn test_ground_projection() {
        let config = GuidanceConfig::from_json(TEST_CONFIG).unwrap();
        let expected = 2.0 * 100.0 * (0.35_f64).tan();
        assert_relative_eq!(config.ground_width_cm(), expected, epsilon = 1e-9);
        assert!(config.pixel_min() < config.center_column());
        assert!(config.pixel_max() > config.center_column());
    }

    #[test]
    fn test_invalid_pwm_range() {
        let text = TEST_CONFIG.replacen("\"pwm_max\": 2000", "\"pwm_max\": 500", 1);
        assert!(matches!(
            GuidanceConfig::from_json(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_percentile() {
        let text = TEST_CONFIG.replacen(
            "\"threshold_percentile\": 95.0",
            "\"threshold_percentile\": 120.0",
            1,
        );
        assert!(matches!(
            GuidanceConfig::from_json(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guidance.json");
        std::fs::write(&path, TEST_CONFIG).unwrap();
        let config = GuidanceConfig::load(&path).unwrap();
        assert_eq!(config.serial_baud, 9600);
    }
}
