//! The cycle orchestrator.
//!
//! One steady state, entered repeatedly: acquire, segment, estimate, fuse,
//! compute control, actuate, publish. Every per-stage failure degrades to
//! an absent contribution for that cycle; only the external interrupt flag
//! ends the loop, which then releases the actuator link and camera handles.

use crate::telemetry::{CycleRecord, SessionLog, TelemetryStore};
use hardware::{GpsMonitor, HydraulicLink};
use shared::{ControlSnapshot, GuidanceConfig, PlantMask, SnapshotCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use vision::{estimate_offset, AcquisitionMonitor, OffsetSample, PlantFilter, RowFuser, SteeringLaw};

/// Owns the pipeline stages and hardware handles for the process lifetime.
pub struct GuidanceLoop {
    config: Arc<GuidanceConfig>,
    monitor: AcquisitionMonitor,
    filter: PlantFilter,
    fuser: RowFuser,
    law: SteeringLaw,
    actuator: Option<HydraulicLink>,
    gps: GpsMonitor,
    cell: SnapshotCell,
    store: Option<Box<dyn TelemetryStore>>,
    session_log: Option<SessionLog>,
    shutdown: Arc<AtomicBool>,
    cycle: u64,
}

impl GuidanceLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<GuidanceConfig>,
        monitor: AcquisitionMonitor,
        actuator: Option<HydraulicLink>,
        gps: GpsMonitor,
        cell: SnapshotCell,
        store: Option<Box<dyn TelemetryStore>>,
        session_log: Option<SessionLog>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let filter = PlantFilter::new(&config);
        let fuser = RowFuser::new(config.num_averages);
        let law = SteeringLaw::new(&config);
        Self {
            config,
            monitor,
            filter,
            fuser,
            law,
            actuator,
            gps,
            cell,
            store,
            session_log,
            shutdown,
            cycle: 0,
        }
    }

    /// Run cycles until the shutdown flag is set, then release hardware.
    pub fn run(&mut self) {
        info!(
            cameras = self.monitor.camera_count(),
            center = self.config.center_column(),
            center_command = self.config.center_command(),
            "guidance loop starting"
        );
        while !self.shutdown.load(Ordering::SeqCst) {
            self.run_cycle();
        }
        self.release();
    }

    /// One pass through the pipeline. Never fails; every stage degrades.
    fn run_cycle(&mut self) {
        let started = Instant::now();
        let center = self.config.center_column();

        let frames = self.monitor.acquire();
        let acquired_at = started.elapsed();

        let masks: Vec<Option<PlantMask>> = frames
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                frame.as_ref().and_then(|frame| {
                    match self.filter.mask_frame(frame) {
                        Ok(mask) => Some(mask),
                        Err(error) => {
                            warn!(camera = index, %error, "segmentation failed");
                            None
                        }
                    }
                })
            })
            .collect();
        let segmented_at = started.elapsed();

        let samples: Vec<OffsetSample> = masks
            .iter()
            .flatten()
            .filter_map(|mask| {
                estimate_offset(mask, self.config.threshold_percentile, center)
            })
            .collect();
        let offsets: Vec<i32> = samples.iter().map(|sample| sample.offset).collect();

        let row = self.fuser.fuse(&samples);
        let steering = self.law.compute(&row);
        let steered_at = started.elapsed();

        if let Some(link) = &mut self.actuator {
            if let Err(error) = link.send_command(steering.command) {
                warn!(%error, command = steering.command, "actuator write failed; command dropped");
            }
        }
        let actuated_at = started.elapsed();

        let gps = self.gps.fix();
        let time = chrono::Local::now()
            .format(&self.config.time_format)
            .to_string();

        let record = CycleRecord {
            offsets: offsets.clone(),
            estimated: row.estimate,
            average: row.average,
            differential: row.differential,
            pwm: steering.command,
            time: time.clone(),
            long: gps.longitude,
            lat: gps.latitude,
            speed: gps.speed,
        };
        if let Some(store) = &mut self.store {
            match store.insert(&record) {
                Ok(id) => debug!(%id, "telemetry document inserted"),
                Err(error) => warn!(%error, "telemetry insert failed; record dropped"),
            }
        }
        if let Some(log) = &mut self.session_log {
            if let Err(error) = log.append(&record) {
                warn!(%error, "session log append failed; row dropped");
            }
        }

        self.cell.publish(ControlSnapshot {
            cycle: self.cycle,
            frames,
            masks,
            offsets,
            row,
            steering,
            gps,
            time,
        });

        self.cycle += 1;
        debug!(
            cycle = self.cycle,
            acquire_ms = acquired_at.as_millis() as u64,
            segment_ms = (segmented_at - acquired_at).as_millis() as u64,
            steer_ms = (steered_at - segmented_at).as_millis() as u64,
            actuate_ms = (actuated_at - steered_at).as_millis() as u64,
            record_ms = (started.elapsed() - actuated_at).as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            command = steering.command,
            "cycle complete"
        );
    }

    fn release(&mut self) {
        info!(cycles = self.cycle, "guidance loop shutting down");
        if let Some(link) = self.actuator.take() {
            link.close();
        }
        self.gps.stop();
        // Camera handles are owned by the monitor and released with it.
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hardware::MockCamera;
    use shared::{CameraInterface, Frame, RowConfidence};
    use std::sync::Mutex;

    fn test_config(json_overrides: &[(&str, &str)]) -> Arc<GuidanceConfig> {
        let mut text = String::from(
            r#"{
                "cameras": 1,
                "camera_width": 64,
                "camera_height": 16,
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
        );
        for (from, to) in json_overrides {
            text = text.replacen(from, to, 1);
        }
        Arc::new(GuidanceConfig::from_json(&text).unwrap())
    }

    /// Frame with a bright green stripe at `col` over a brown background.
    fn row_frame(width: usize, height: usize, col: usize, seed: u8) -> Frame {
        let mut frame = Frame::zeros((height, width, 3));
        for row in 0..height {
            for c in 0..width {
                frame[[row, c, 0]] = 20;
                frame[[row, c, 1]] = 40;
                frame[[row, c, 2]] = 60;
            }
            frame[[row, col, 0]] = 30;
            frame[[row, col, 1]] = 220;
            frame[[row, col, 2]] = 40;
        }
        // Perturb one corner pixel so consecutive frames are never
        // bit-identical.
        frame[[0, 0, 0]] = frame[[0, 0, 0]].wrapping_add(seed);
        frame
    }

    struct RecordingStore {
        records: Arc<Mutex<Vec<CycleRecord>>>,
    }

    impl TelemetryStore for RecordingStore {
        fn insert(&mut self, record: &CycleRecord) -> Result<String, crate::TelemetryError> {
            let mut records = self.records.lock().unwrap();
            records.push(record.clone());
            Ok(format!("doc-{}", records.len()))
        }
    }

    fn build_loop(
        config: Arc<GuidanceConfig>,
        cameras: Vec<Box<dyn CameraInterface>>,
        records: Arc<Mutex<Vec<CycleRecord>>>,
        cell: SnapshotCell,
        shutdown: Arc<AtomicBool>,
    ) -> GuidanceLoop {
        GuidanceLoop::new(
            config,
            AcquisitionMonitor::new(cameras),
            None,
            GpsMonitor::disabled(),
            cell,
            Some(Box::new(RecordingStore { records })),
            None,
            shutdown,
        )
    }

    #[test]
    fn test_cycle_publishes_snapshot_and_record() {
        let config = test_config(&[]);
        let settings = config.camera_settings(0);
        let frames = vec![row_frame(64, 16, 40, 1)];
        let camera = MockCamera::new(settings, frames).fail_when_exhausted();

        let records = Arc::new(Mutex::new(Vec::new()));
        let cell = SnapshotCell::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut guidance = build_loop(
            config,
            vec![Box::new(camera)],
            records.clone(),
            cell.clone(),
            shutdown,
        );

        guidance.run_cycle();

        let snapshot = cell.latest().unwrap();
        assert_eq!(snapshot.cycle, 0);
        assert_eq!(snapshot.row.confidence, RowConfidence::Detected);
        // Stripe at column 40, center 32: offset 8.
        assert_eq!(snapshot.offsets, vec![8]);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].estimated, 8.0);
    }

    #[test]
    fn test_camera_dropout_degrades_to_fallback() {
        let config = test_config(&[]);
        let settings = config.camera_settings(0);
        let camera = MockCamera::new(settings, vec![]).fail_when_exhausted();

        let records = Arc::new(Mutex::new(Vec::new()));
        let cell = SnapshotCell::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut guidance = build_loop(
            config.clone(),
            vec![Box::new(camera)],
            records,
            cell.clone(),
            shutdown,
        );

        guidance.run_cycle();

        let snapshot = cell.latest().unwrap();
        assert_eq!(snapshot.row.confidence, RowConfidence::Fallback);
        assert_eq!(snapshot.steering.command, config.center_command());
        assert!(snapshot.frames[0].is_none());
        assert!(snapshot.masks[0].is_none());
    }

    #[test]
    fn test_frozen_feed_second_cycle_contributes_nothing() {
        let config = test_config(&[]);
        let settings = config.camera_settings(0);
        // Same frame twice: MockCamera repeats its last frame when the
        // script runs out.
        let camera = MockCamera::new(settings, vec![row_frame(64, 16, 40, 1)]);

        let records = Arc::new(Mutex::new(Vec::new()));
        let cell = SnapshotCell::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut guidance = build_loop(
            config,
            vec![Box::new(camera)],
            records,
            cell.clone(),
            shutdown,
        );

        guidance.run_cycle();
        assert_eq!(
            cell.latest().unwrap().row.confidence,
            RowConfidence::Detected
        );

        guidance.run_cycle();
        let snapshot = cell.latest().unwrap();
        assert_eq!(snapshot.row.confidence, RowConfidence::Fallback);
        assert!(snapshot.frames[0].is_none());
    }

    #[test]
    fn test_run_honors_shutdown_flag() {
        let config = test_config(&[]);
        let settings = config.camera_settings(0);
        let camera = MockCamera::uniform(settings, 40);

        let records = Arc::new(Mutex::new(Vec::new()));
        let cell = SnapshotCell::new();
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut guidance = build_loop(config, vec![Box::new(camera)], records, cell, shutdown);

        // Flag already set: run() must release and return without looping.
        guidance.run();
        assert_eq!(guidance.cycles_completed(), 0);
    }
}
