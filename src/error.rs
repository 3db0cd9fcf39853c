// Error types for configuration, actuation and controller input

use serde::{Deserialize, Serialize};

use crate::config::{CYCLE_DELAY, PORT_MAX, PORT_MIN, Port};
use crate::motor::FeetechError;

/// Startup configuration errors. Fatal: nothing is actuated.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Motor group has no ports")]
    EmptyGroup,

    #[error("Port {port} is outside the supported range {min}..={max}", min = PORT_MIN, max = PORT_MAX)]
    PortOutOfRange { port: Port },

    #[error("Port {port} is listed more than once in a motor group")]
    DuplicatePort { port: Port },

    #[error("Port {port} is assigned to both drivetrain sides")]
    SharedPort { port: Port },

    #[error("Cycle delay {ms}ms is below the {min}ms minimum", min = CYCLE_DELAY.as_millis())]
    CycleDelayTooShort { ms: u64 },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Motor bus error: {0}")]
    Bus(#[from] FeetechError),
}

/// A single actuator rejected a command. Reported, never fatal to the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Actuator on port {port} faulted: {reason}")]
pub struct ActuatorFault {
    pub port: Port,
    pub reason: String,
}

impl ActuatorFault {
    pub fn new(port: Port, reason: impl Into<String>) -> Self {
        Self {
            port,
            reason: reason.into(),
        }
    }
}

/// Controller input could not be read. Callers treat this as a neutral reading.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Controller disconnected")]
    Disconnected,

    #[error("Controller IO error: {0}")]
    Io(#[from] std::io::Error),
}
