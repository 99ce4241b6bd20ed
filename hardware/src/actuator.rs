//! Serial link to the hydraulic actuator controller.
//!
//! The controller speaks a one-token line protocol: each steering command
//! is written as a newline-terminated decimal PWM value. The link carries
//! no state between writes; a failed write costs one cycle's command and
//! the next cycle retries independently.

use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const WRITE_TIMEOUT: Duration = Duration::from_millis(250);

/// Errors raised by the actuator link.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: serialport::Error,
    },

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Open serial connection to the hydraulic controller.
pub struct HydraulicLink {
    port: Box<dyn SerialPort>,
    device: String,
}

impl HydraulicLink {
    /// Open the configured serial device.
    pub fn open(device: &str, baud: u32) -> Result<Self, ActuatorError> {
        let port = serialport::new(device, baud)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|source| ActuatorError::Open {
                device: device.to_string(),
                source,
            })?;
        info!(device, baud, "hydraulic controller link open");
        Ok(Self {
            port,
            device: device.to_string(),
        })
    }

    /// Write one PWM-equivalent command as a newline-terminated token.
    pub fn send_command(&mut self, command: i32) -> Result<(), ActuatorError> {
        let token = format!("{command}\n");
        self.port.write_all(token.as_bytes())?;
        self.port.flush()?;
        debug!(command, "actuator command written");
        Ok(())
    }

    /// Device path this link was opened with.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Release the serial handle.
    ///
    /// Dropping the link closes the port either way; this exists so the
    /// shutdown path can log the release explicitly.
    pub fn close(self) {
        info!(device = %self.device, "hydraulic controller link closed");
    }
}
