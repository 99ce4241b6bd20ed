use anyhow::{Context, Result};
use clap::Parser;
use field_software::{
    session_name, DisplaySink, DisplayTask, GuidanceLoop, JsonDocumentStore, LogSink, OverlaySink,
    SessionLog, TelemetryStore,
};
use hardware::{GpsMonitor, HydraulicLink, SyntheticRowCamera};
use shared::{CameraInterface, GuidanceConfig, SnapshotCell};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use vision::AcquisitionMonitor;

#[derive(Parser, Debug)]
#[command(author, version, about = "Vision-guided row steering", long_about = None)]
struct Args {
    /// Path to the JSON guidance configuration.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Run with synthetic cameras and no serial link.
    #[arg(long)]
    mock: bool,
}

fn build_cameras(config: &GuidanceConfig, mock: bool) -> Result<Vec<Box<dyn CameraInterface>>> {
    let mut cameras: Vec<Box<dyn CameraInterface>> = Vec::with_capacity(config.cameras);
    for index in 0..config.cameras {
        let settings = config.camera_settings(index);
        if mock {
            cameras.push(Box::new(SyntheticRowCamera::new(settings)));
            continue;
        }
        #[cfg(all(target_os = "linux", feature = "v4l2"))]
        {
            let camera = hardware::V4l2Camera::open(settings)
                .with_context(|| format!("failed to open camera {index}"))?;
            cameras.push(Box::new(camera));
        }
        #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
        anyhow::bail!("built without v4l2 support; run with --mock or enable the v4l2 feature");
    }
    Ok(cameras)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Arc::new(
        GuidanceConfig::load(&args.config)
            .with_context(|| format!("failed to load config from {}", args.config.display()))?,
    );
    let session = session_name(&config.session_format);
    info!(%session, config = %args.config.display(), mock = args.mock, "rowpilot starting");

    let cameras = build_cameras(&config, args.mock)?;
    let monitor = AcquisitionMonitor::new(cameras);

    // Actuator and gpsd failures are soft: guidance still runs and logs
    // what it would have commanded.
    let actuator = if args.mock {
        None
    } else {
        match HydraulicLink::open(&config.serial_device, config.serial_baud) {
            Ok(link) => Some(link),
            Err(error) => {
                warn!(%error, device = %config.serial_device, "actuator unavailable; commands will be dropped");
                None
            }
        }
    };
    let gps = if args.mock {
        GpsMonitor::disabled()
    } else {
        GpsMonitor::connect(&config.gpsd_addr)
    };

    let log_dir = PathBuf::from(&config.log_dir);
    let store: Option<Box<dyn TelemetryStore>> = if config.telemetry_on {
        let store = JsonDocumentStore::create(&log_dir, &session)
            .context("failed to create telemetry store")?;
        Some(Box::new(store))
    } else {
        None
    };
    let session_log = if config.logfile_on {
        let log = SessionLog::create(&log_dir, &session).context("failed to create session log")?;
        info!(path = %log.path().display(), "session log open");
        Some(log)
    } else {
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let cell = SnapshotCell::new();

    let display_handle = if config.display_on {
        let sink: Box<dyn DisplaySink> = if config.highlight {
            Box::new(OverlaySink::new(&config, log_dir.join(&session), 10))
        } else {
            Box::new(LogSink::new(&config))
        };
        let task = DisplayTask::new(cell.clone(), sink);
        Some(task.spawn(shutdown.clone(), Duration::from_millis(200)))
    } else {
        None
    };

    let mut guidance = GuidanceLoop::new(
        config,
        monitor,
        actuator,
        gps,
        cell,
        store,
        session_log,
        shutdown.clone(),
    );
    let loop_handle = thread::spawn(move || {
        guidance.run();
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("failed to build signal runtime")?;
    runtime.block_on(async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "signal listener failed; shutting down");
        }
    });
    info!("interrupt received; stopping guidance");
    shutdown.store(true, Ordering::SeqCst);

    if loop_handle.join().is_err() {
        warn!("guidance loop thread panicked");
    }
    if let Some(handle) = display_handle {
        if handle.join().is_err() {
            warn!("display thread panicked");
        }
    }
    info!("rowpilot stopped");
    Ok(())
}
