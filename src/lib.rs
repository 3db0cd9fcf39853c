//! Teleop drive loop for a differential-drive robot.
//!
//! Two joystick axes are read each cycle and mapped to left/right motor
//! group voltages, in either tank or arcade mode. See [`drive`] for the
//! mapping and [`runtime`] for the lifecycle around it.

pub mod config;
pub mod display;
pub mod drive;
pub mod error;
pub mod input;
pub mod messages;
pub mod motor;
pub mod runtime;
