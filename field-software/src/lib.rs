//! Row guidance control loop and its field collaborators.
//!
//! The binary (`rowpilot`) wires cameras, the hydraulic actuator, GPS and
//! the collaborators defined here around the `vision` core, then runs the
//! cycle loop until interrupted.

pub mod control_loop;
pub mod display;
pub mod telemetry;

pub use control_loop::GuidanceLoop;
pub use display::{DisplayError, DisplaySink, DisplayTask, LogSink, OverlaySink};
pub use telemetry::{
    session_name, CycleRecord, JsonDocumentStore, SessionLog, TelemetryError, TelemetryStore,
};
