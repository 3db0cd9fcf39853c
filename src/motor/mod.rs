// Drivetrain actuation
//
// Provides:
// - Motor groups that fan one command out to every motor on a side
// - Feetech STS serial bus motors driven in PWM mode
// - In-memory motors for simulation and tests

pub mod feetech;
mod group;
mod sim;

pub use feetech::{FeetechBus, FeetechError, FeetechMotor, SharedBus};
pub use group::{Actuator, MotorGroup, Voltage};
pub use sim::{SimMotor, SimProbe};
