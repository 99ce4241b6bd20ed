//! gpsd client.
//!
//! Maintains a TCP connection to a gpsd daemon on a background thread,
//! parsing the JSON watch stream and keeping only the most recent
//! position/speed fix in a shared cell. The control loop reads the latest
//! fix without blocking; staleness of a cycle or two is acceptable. An
//! absent or crashed gpsd degrades to a zeroed fix, never to a loop stall.

use serde::Deserialize;
use shared::GpsFix;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true};\n";
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// TPV (time-position-velocity) report from gpsd. Other classes in the
/// stream are ignored.
#[derive(Debug, Deserialize)]
struct TpvReport {
    class: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
}

/// Handle to the background GPS reader.
pub struct GpsMonitor {
    fix: Arc<Mutex<GpsFix>>,
    running: Arc<AtomicBool>,
}

impl GpsMonitor {
    /// Start the reader thread against a gpsd address (host:port).
    ///
    /// Always succeeds; if gpsd is unreachable the thread retries in the
    /// background and `fix()` reports zeros until a fix arrives.
    pub fn connect(addr: &str) -> Self {
        let fix = Arc::new(Mutex::new(GpsFix::default()));
        let running = Arc::new(AtomicBool::new(true));

        let addr = addr.to_string();
        let fix_clone = fix.clone();
        let running_clone = running.clone();
        thread::spawn(move || {
            Self::reader_thread(&addr, &fix_clone, &running_clone);
        });

        Self { fix, running }
    }

    /// A monitor that never connects; always reports a zeroed fix.
    pub fn disabled() -> Self {
        Self {
            fix: Arc::new(Mutex::new(GpsFix::default())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Latest fix; zeroed until the first TPV report arrives.
    pub fn fix(&self) -> GpsFix {
        match self.fix.lock() {
            Ok(fix) => *fix,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Stop the reader thread after its current blocking read returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn reader_thread(addr: &str, fix: &Arc<Mutex<GpsFix>>, running: &Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            match Self::watch_stream(addr, fix, running) {
                Ok(()) => info!("gpsd stream closed"),
                Err(error) => warn!(%error, "gpsd unavailable; position will read zero"),
            }
            if running.load(Ordering::SeqCst) {
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }

    fn watch_stream(
        addr: &str,
        fix: &Arc<Mutex<GpsFix>>,
        running: &Arc<AtomicBool>,
    ) -> std::io::Result<()> {
        let mut stream = TcpStream::connect(addr)?;
        stream.write_all(WATCH_COMMAND.as_bytes())?;
        info!(addr, "gpsd watch enabled");

        let reader = BufReader::new(stream);
        for line in reader.lines() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let line = line?;
            let Ok(report) = serde_json::from_str::<TpvReport>(&line) else {
                continue;
            };
            if report.class != "TPV" {
                continue;
            }
            let update = GpsFix::new(
                report.lat.unwrap_or(0.0),
                report.lon.unwrap_or(0.0),
                report.speed.unwrap_or(0.0),
            );
            debug!(lat = update.latitude, lon = update.longitude, "gps fix");
            if let Ok(mut current) = fix.lock() {
                *current = update;
            }
        }
        Ok(())
    }
}
