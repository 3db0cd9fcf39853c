// Timing, ranges, ports and the on-disk robot configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drive::DriveMode;
use crate::error::ConfigError;

// Minimum delay between control cycles (controller refresh + yield to other tasks)
pub const CYCLE_DELAY: Duration = Duration::from_millis(2);

// Motor command range accepted by the actuators
pub const VOLTAGE_MIN: i32 = -127;
pub const VOLTAGE_MAX: i32 = 127;

// Analog stick reporting range
pub const AXIS_MIN: i32 = -127;
pub const AXIS_MAX: i32 = 127;

// Smart port range on the brain
pub const PORT_MIN: u8 = 1;
pub const PORT_MAX: u8 = 21;

// Serial port for the motor bus
pub const MOTOR_BUS_PORT: &str = "/dev/ttyUSB0";

// Driver control period of a match
pub const TELEOP_PERIOD: Duration = Duration::from_secs(105);

/// Hardware port identifier
pub type Port = u8;

/// Robot configuration, supplied as plain data at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub left_ports: Vec<Port>,
    pub right_ports: Vec<Port>,
    pub initial_mode: DriveMode,
    pub cycle_delay_ms: u64,
    pub serial_port: String,
    /// Use in-memory actuators instead of the motor bus
    pub simulate: bool,
    /// Ports whose simulated actuator rejects every command
    pub simulated_faults: Vec<Port>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            left_ports: vec![1, 2, 3],
            right_ports: vec![4, 5, 6],
            initial_mode: DriveMode::Tank,
            cycle_delay_ms: CYCLE_DELAY.as_millis() as u64,
            serial_port: MOTOR_BUS_PORT.to_string(),
            simulate: false,
            simulated_faults: Vec::new(),
        }
    }
}

impl RobotConfig {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    /// Check both port lists, that no port is wired to both sides, and the cycle delay
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_delay() < CYCLE_DELAY {
            return Err(ConfigError::CycleDelayTooShort {
                ms: self.cycle_delay_ms,
            });
        }
        validate_ports(&self.left_ports)?;
        validate_ports(&self.right_ports)?;

        if let Some(&port) = self
            .left_ports
            .iter()
            .find(|port| self.right_ports.contains(port))
        {
            return Err(ConfigError::SharedPort { port });
        }
        Ok(())
    }
}

/// Validate the port list of a single motor group
pub fn validate_ports(ports: &[Port]) -> Result<(), ConfigError> {
    if ports.is_empty() {
        return Err(ConfigError::EmptyGroup);
    }

    for (i, &port) in ports.iter().enumerate() {
        if !(PORT_MIN..=PORT_MAX).contains(&port) {
            return Err(ConfigError::PortOutOfRange { port });
        }
        if ports[..i].contains(&port) {
            return Err(ConfigError::DuplicatePort { port });
        }
    }
    Ok(())
}
