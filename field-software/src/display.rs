//! Display collaborators.
//!
//! The display task reads the latest published snapshot on its own schedule
//! and renders it through a [`DisplaySink`]. Rendering is strictly
//! one-directional: nothing flows back into the control loop. A refresh
//! that arrives while the previous one is still rendering is skipped
//! outright rather than queued, so a slow sink can never build backlog.

use image::{Rgb, RgbImage};
use shared::{ControlSnapshot, GuidanceConfig, SnapshotCell};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while rendering a snapshot.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Consumer of published control snapshots.
pub trait DisplaySink: Send {
    fn render(&mut self, snapshot: &ControlSnapshot) -> Result<(), DisplayError>;
}

/// Sink that logs the operator-facing readout: offset distance in
/// centimeters, steer direction, and actuator voltage.
pub struct LogSink {
    pixels_per_cm: f64,
}

impl LogSink {
    pub fn new(config: &GuidanceConfig) -> Self {
        Self {
            pixels_per_cm: config.pixels_per_cm(),
        }
    }
}

impl DisplaySink for LogSink {
    fn render(&mut self, snapshot: &ControlSnapshot) -> Result<(), DisplayError> {
        let distance_cm = (snapshot.row.average / self.pixels_per_cm * 10.0).round() / 10.0;
        let direction = if snapshot.row.average >= 0.0 {
            "right"
        } else {
            "left"
        };
        info!(
            cycle = snapshot.cycle,
            distance_cm,
            direction,
            volts = snapshot.steering.voltage,
            "row readout"
        );
        Ok(())
    }
}

/// Sink that writes PNG overlays of the masks with marker columns.
///
/// Every `every`-th snapshot becomes `{dir}/cycle_{n:08}.png`: the cameras'
/// masks side by side in grayscale, with the tolerance band in red, the
/// image center in green, and the current average in blue.
pub struct OverlaySink {
    dir: PathBuf,
    every: u64,
    pixel_min: i32,
    pixel_max: i32,
    center: i32,
}

impl OverlaySink {
    pub fn new(config: &GuidanceConfig, dir: PathBuf, every: u64) -> Self {
        Self {
            dir,
            every: every.max(1),
            pixel_min: config.pixel_min(),
            pixel_max: config.pixel_max(),
            center: config.center_column(),
        }
    }

    fn paint_column(image: &mut RgbImage, col: i32, color: Rgb<u8>) {
        if col < 0 || col >= image.width() as i32 {
            return;
        }
        for row in 0..image.height() {
            image.put_pixel(col as u32, row, color);
        }
    }
}

impl DisplaySink for OverlaySink {
    fn render(&mut self, snapshot: &ControlSnapshot) -> Result<(), DisplayError> {
        if snapshot.cycle % self.every != 0 {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut panels = Vec::new();
        for mask in &snapshot.masks {
            let Some(mask) = mask else { continue };
            let (height, width) = mask.dim();
            let mut panel = RgbImage::new(width as u32, height as u32);
            for row in 0..height {
                for col in 0..width {
                    let v = mask[[row, col]];
                    panel.put_pixel(col as u32, row as u32, Rgb([v, v, v]));
                }
            }
            Self::paint_column(&mut panel, self.pixel_min, Rgb([255, 0, 0]));
            Self::paint_column(&mut panel, self.pixel_max, Rgb([255, 0, 0]));
            Self::paint_column(&mut panel, self.center, Rgb([0, 255, 0]));
            let average_col = self.center + snapshot.row.average.round() as i32;
            Self::paint_column(&mut panel, average_col, Rgb([0, 0, 255]));
            panels.push(panel);
        }
        if panels.is_empty() {
            return Ok(());
        }

        // Stack the camera panels side by side.
        let total_width: u32 = panels.iter().map(|p| p.width()).sum();
        let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
        let mut output = RgbImage::new(total_width, height);
        let mut x = 0;
        for panel in &panels {
            for (px, py, pixel) in panel.enumerate_pixels() {
                output.put_pixel(x + px, py, *pixel);
            }
            x += panel.width();
        }

        let path = self.dir.join(format!("cycle_{:08}.png", snapshot.cycle));
        output.save(&path)?;
        debug!(path = %path.display(), "overlay written");
        Ok(())
    }
}

/// Periodic display refresher with skip-if-busy backpressure.
pub struct DisplayTask {
    cell: SnapshotCell,
    sink: Box<dyn DisplaySink>,
    busy: Arc<AtomicBool>,
    last_rendered: Option<u64>,
}

impl DisplayTask {
    pub fn new(cell: SnapshotCell, sink: Box<dyn DisplaySink>) -> Self {
        Self {
            cell,
            sink,
            busy: Arc::new(AtomicBool::new(false)),
            last_rendered: None,
        }
    }

    /// Render the latest snapshot once.
    ///
    /// If a previous refresh is still rendering, this is a no-op skip;
    /// there is no queue. Snapshots already rendered are skipped too.
    pub fn refresh(&mut self) {
        if self.busy.swap(true, Ordering::Acquire) {
            debug!("display busy; skipping refresh");
            return;
        }

        if let Some(snapshot) = self.cell.try_latest() {
            if self.last_rendered != Some(snapshot.cycle) {
                if let Err(error) = self.sink.render(&snapshot) {
                    warn!(%error, "display render failed");
                } else {
                    self.last_rendered = Some(snapshot.cycle);
                }
            }
        }

        self.busy.store(false, Ordering::Release);
    }

    /// Run refreshes on a background thread until shutdown.
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>, period: Duration) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                self.refresh();
                thread::sleep(period);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GpsFix, RowConfidence, RowEstimate, SteeringOutput};

    struct CountingSink {
        rendered: Arc<AtomicBool>,
    }

    impl DisplaySink for CountingSink {
        fn render(&mut self, _snapshot: &ControlSnapshot) -> Result<(), DisplayError> {
            self.rendered.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn snapshot(cycle: u64) -> ControlSnapshot {
        ControlSnapshot {
            cycle,
            frames: vec![],
            masks: vec![Some(shared::PlantMask::zeros((4, 8)))],
            offsets: vec![],
            row: RowEstimate {
                estimate: 2.0,
                average: 1.0,
                differential: 1.0,
                confidence: RowConfidence::Detected,
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
    fn test_refresh_renders_latest_snapshot() {
        let cell = SnapshotCell::new();
        cell.publish(snapshot(3));
        let rendered = Arc::new(AtomicBool::new(false));
        let mut task = DisplayTask::new(
            cell,
            Box::new(CountingSink {
                rendered: rendered.clone(),
            }),
        );
        task.refresh();
        assert!(rendered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_refresh_with_empty_cell_is_noop() {
        let rendered = Arc::new(AtomicBool::new(false));
        let mut task = DisplayTask::new(
            SnapshotCell::new(),
            Box::new(CountingSink {
                rendered: rendered.clone(),
            }),
        );
        task.refresh();
        assert!(!rendered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_busy_guard_skips() {
        let cell = SnapshotCell::new();
        cell.publish(snapshot(1));
        let rendered = Arc::new(AtomicBool::new(false));
        let mut task = DisplayTask::new(
            cell,
            Box::new(CountingSink {
                rendered: rendered.clone(),
            }),
        );
        task.busy.store(true, Ordering::SeqCst);
        task.refresh();
        assert!(!rendered.load(Ordering::SeqCst));
        // The skipped refresh must not clear someone else's busy flag.
        assert!(task.busy.load(Ordering::SeqCst));
    }

    #[test]
    fn test_overlay_sink_writes_png() {
        let config = shared::GuidanceConfig::from_json(
            r#"{
                "cameras": 1,
                "camera_width": 8,
                "camera_height": 4,
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
                "val_max": 255,
                "threshold_percentile": 95.0,
                "num_averages": 5,
                "kp": 1.0,
                "ki": 0.0,
                "kd": 0.0,
                "pwm_min": 1000,
                "pwm_max": 2000,
                "min_voltage": 0.0,
                "max_voltage": 5.0,
                "serial_device": "/dev/null",
                "serial_baud": 9600
            }"#,
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut sink = OverlaySink::new(&config, dir.path().to_path_buf(), 1);
        sink.render(&snapshot(0)).unwrap();
        assert!(dir.path().join("cycle_00000000.png").exists());
    }
}
