//! Steering control law.
//!
//! Maps the fused (estimate, average, differential) triple to a clamped
//! PWM-equivalent command around the neutral center command, and reports
//! the corresponding actuator voltage. The command is clamped exactly once,
//! before the voltage is computed from it.

use shared::{GuidanceConfig, RowEstimate, SteeringOutput};
use tracing::warn;

/// PID-style steering law with a fixed actuator range.
#[derive(Debug, Clone)]
pub struct SteeringLaw {
    kp: f64,
    ki: f64,
    kd: f64,
    pwm_min: i32,
    pwm_max: i32,
    center_command: i32,
    min_voltage: f64,
    max_voltage: f64,
}

impl SteeringLaw {
    pub fn new(config: &GuidanceConfig) -> Self {
        Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            pwm_min: config.pwm_min,
            pwm_max: config.pwm_max,
            center_command: config.center_command(),
            min_voltage: config.min_voltage,
            max_voltage: config.max_voltage,
        }
    }

    /// Compute the actuator command for one cycle.
    ///
    /// `command = round(estimate*kp + average*ki + differential*kd) +
    /// center`, clamped to the actuator range. A non-finite correction
    /// (bad gains, overflowing inputs) fails soft to the neutral center
    /// command with a zero voltage; the loop must keep running.
    pub fn compute(&self, row: &RowEstimate) -> SteeringOutput {
        let correction = row.estimate * self.kp + row.average * self.ki + row.differential * self.kd;
        if !correction.is_finite() {
            warn!(correction, "non-finite steering correction; holding center");
            return SteeringOutput {
                command: self.center_command,
                voltage: 0.0,
            };
        }

        let command = (correction.round() as i64 + self.center_command as i64)
            .clamp(self.pwm_min as i64, self.pwm_max as i64) as i32;

        SteeringOutput {
            command,
            voltage: self.voltage_for(command),
        }
    }

    /// Affine command-to-voltage map anchored at
    /// (pwm_min, min_voltage) and (pwm_max, max_voltage), two decimals.
    pub fn voltage_for(&self, command: i32) -> f64 {
        let span = (self.pwm_max - self.pwm_min) as f64;
        let volts = (command - self.pwm_min) as f64 * (self.max_voltage - self.min_voltage) / span
            + self.min_voltage;
        (volts * 100.0).round() / 100.0
    }

    pub fn center_command(&self) -> i32 {
        self.center_command
    }
}
