// Snapshots published by the drive loop to observers (display, logs)

use serde::{Deserialize, Serialize};

use crate::drive::DriveMode;
use crate::error::ActuatorFault;
use crate::motor::Voltage;

/// What the drivetrain was commanded on the last cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveStatus {
    pub mode: DriveMode,
    pub left: Voltage,
    pub right: Voltage,
    pub faults: Vec<ActuatorFault>,
}

impl DriveStatus {
    /// Nothing commanded yet, or the drivetrain was stopped
    pub fn neutral(mode: DriveMode) -> Self {
        Self {
            mode,
            left: Voltage::ZERO,
            right: Voltage::ZERO,
            faults: Vec::new(),
        }
    }
}

/// Lifecycle phase of the teleop runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    Teleop,
    Stopped,
}
