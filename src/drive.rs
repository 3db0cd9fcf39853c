//! Joystick-to-drivetrain mapping.
//!
//! [`DriveController`] owns both motor groups and the controller. Each cycle
//! it reads two axes, maps them to per-side voltages under the active
//! [`DriveMode`], and drives the groups.
//!
//! - **Tank**: left stick Y drives the left side, right stick Y the right side.
//! - **Arcade**: left stick Y is power, right stick X is turn;
//!   `left = power + turn`, `right = power - turn`.
//!
//! Arcade sums are clamped per side to the voltage range. The other side is
//! not rescaled, so a hard turn at full power pins the outer side at
//! [`Voltage::MAX`] while the inner side keeps its own value.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CYCLE_DELAY;
use crate::error::ActuatorFault;
use crate::input::{Axis, AxisReading, InputSource};
use crate::messages::DriveStatus;
use crate::motor::{Actuator, MotorGroup, Voltage};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    #[default]
    Tank,
    Arcade,
}

impl DriveMode {
    pub fn toggled(self) -> Self {
        match self {
            DriveMode::Tank => DriveMode::Arcade,
            DriveMode::Arcade => DriveMode::Tank,
        }
    }
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveMode::Tank => f.write_str("tank"),
            DriveMode::Arcade => f.write_str("arcade"),
        }
    }
}

/// Commands for the two drivetrain sides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideVoltages {
    pub left: Voltage,
    pub right: Voltage,
}

/// Each stick drives its own side directly
pub fn tank(left: AxisReading, right: AxisReading) -> SideVoltages {
    SideVoltages {
        left: Voltage::saturating(left),
        right: Voltage::saturating(right),
    }
}

/// Power plus/minus turn, clamped per side
pub fn arcade(power: AxisReading, turn: AxisReading) -> SideVoltages {
    SideVoltages {
        left: Voltage::saturating(power.saturating_add(turn)),
        right: Voltage::saturating(power.saturating_sub(turn)),
    }
}

/// Teleop drive loop body for a differential drivetrain
pub struct DriveController<A: Actuator, I> {
    left: MotorGroup<A>,
    right: MotorGroup<A>,
    input: I,
    mode: DriveMode,
    cycle_delay: Duration,
    status: DriveStatus,
}

impl<A: Actuator, I: InputSource> DriveController<A, I> {
    pub fn new(left: MotorGroup<A>, right: MotorGroup<A>, input: I, mode: DriveMode) -> Self {
        info!("Drive controller started in {} mode", mode);
        Self {
            left,
            right,
            input,
            mode,
            cycle_delay: CYCLE_DELAY,
            status: DriveStatus::neutral(mode),
        }
    }

    /// Override the minimum delay between cycles
    pub fn with_cycle_delay(mut self, cycle_delay: Duration) -> Self {
        self.cycle_delay = cycle_delay;
        self
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn cycle_delay(&self) -> Duration {
        self.cycle_delay
    }

    /// Select the mapping used from the next cycle on
    pub fn switch_mode(&mut self, mode: DriveMode) {
        if mode != self.mode {
            info!("Drive mode: {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn toggle_mode(&mut self) -> DriveMode {
        self.switch_mode(self.mode.toggled());
        self.mode
    }

    /// One read -> map -> apply pass, without the inter-cycle delay
    pub fn step(&mut self) -> &DriveStatus {
        let mode = self.mode;
        let out = match mode {
            DriveMode::Tank => {
                let left = self.input.read_axis(Axis::LeftY);
                let right = self.input.read_axis(Axis::RightY);
                tank(left, right)
            }
            DriveMode::Arcade => {
                let power = self.input.read_axis(Axis::LeftY);
                let turn = self.input.read_axis(Axis::RightX);
                arcade(power, turn)
            }
        };

        debug!(
            "{} cycle: left={}, right={}",
            mode,
            out.left.get(),
            out.right.get()
        );
        self.left.drive(out.left);
        self.right.drive(out.right);

        self.status = DriveStatus {
            mode,
            left: out.left,
            right: out.right,
            faults: self.collect_faults(),
        };
        &self.status
    }

    /// Run one cycle, then wait out the minimum cycle delay
    pub async fn run_cycle(&mut self) -> DriveStatus {
        let status = self.step().clone();
        tokio::time::sleep(self.cycle_delay).await;
        status
    }

    /// Command neutral on both sides
    pub fn stop(&mut self) {
        info!("Stopping drivetrain");
        self.left.stop();
        self.right.stop();
        self.status = DriveStatus {
            faults: self.collect_faults(),
            ..DriveStatus::neutral(self.mode)
        };
    }

    /// Snapshot of the most recent cycle
    pub fn status(&self) -> &DriveStatus {
        &self.status
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn left(&self) -> &MotorGroup<A> {
        &self.left
    }

    pub fn right(&self) -> &MotorGroup<A> {
        &self.right
    }

    fn collect_faults(&self) -> Vec<ActuatorFault> {
        self.left
            .faults()
            .iter()
            .chain(self.right.faults())
            .cloned()
            .collect()
    }
}
