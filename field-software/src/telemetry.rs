//! Per-cycle telemetry: document store records and the CSV session log.
//!
//! Both sinks are append-only and best-effort; a failed write is logged by
//! the caller and the cycle's record is dropped. Sessions are named from a
//! configured chrono timestamp format at startup.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the telemetry sinks.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
}

/// One control cycle's telemetry document.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    /// Per-camera raw offsets that survived estimation.
    pub offsets: Vec<i32>,
    /// Instantaneous fused estimate.
    pub estimated: f64,
    /// Smoothed average.
    pub average: f64,
    /// Estimate minus average.
    pub differential: f64,
    /// Issued actuator command.
    pub pwm: i32,
    /// Formatted record timestamp.
    pub time: String,
    /// Longitude in decimal degrees.
    pub long: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Ground speed in meters per second.
    pub speed: f64,
}

/// Document store for per-cycle records.
pub trait TelemetryStore: Send {
    /// Insert one record, returning its document id.
    fn insert(&mut self, record: &CycleRecord) -> Result<String, TelemetryError>;
}

/// JSON-lines document store.
///
/// One document per line in `{dir}/{session}.jsonl`; document ids are
/// `{session}-{n}`. Stands in for the deployment database with the same
/// insert interface.
pub struct JsonDocumentStore {
    writer: BufWriter<File>,
    session: String,
    next_id: u64,
}

impl JsonDocumentStore {
    pub fn create(dir: &Path, session: &str) -> Result<Self, TelemetryError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{session}.jsonl"));
        let writer = BufWriter::new(File::create(path)?);
        Ok(Self {
            writer,
            session: session.to_string(),
            next_id: 0,
        })
    }
}

impl TelemetryStore for JsonDocumentStore {
    fn insert(&mut self, record: &CycleRecord) -> Result<String, TelemetryError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        let id = format!("{}-{}", self.session, self.next_id);
        self.next_id += 1;
        Ok(id)
    }
}

/// Append-only CSV session log.
///
/// Header `time,lat,long,speed,cam0,cam1,estimate,average,pwm` is written
/// once at session start; one row follows per cycle. The cam columns hold
/// the first two cameras' raw offsets and are left empty when a camera
/// contributed no sample.
pub struct SessionLog {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl SessionLog {
    pub const HEADER: [&'static str; 9] = [
        "time", "lat", "long", "speed", "cam0", "cam1", "estimate", "average", "pwm",
    ];

    pub fn create(dir: &Path, session: &str) -> Result<Self, TelemetryError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{session}.csv"));
        let mut writer = csv::Writer::from_writer(File::create(&path)?);
        writer.write_record(Self::HEADER)?;
        writer.flush()?;
        Ok(Self { writer, path })
    }

    pub fn append(&mut self, record: &CycleRecord) -> Result<(), TelemetryError> {
        let cam = |index: usize| {
            record
                .offsets
                .get(index)
                .map(|offset| offset.to_string())
                .unwrap_or_default()
        };
        self.writer.write_record([
            record.time.clone(),
            record.lat.to_string(),
            record.long.to_string(),
            record.speed.to_string(),
            cam(0),
            cam(1),
            record.estimated.to_string(),
            record.average.to_string(),
            record.pwm.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Session name from the configured timestamp format.
pub fn session_name(format: &str) -> String {
    chrono::Local::now().format(format).to_string()
}
