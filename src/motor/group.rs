// Motor groups: one drivetrain side, commanded as a unit
//
// Every actuator in a group receives the same voltage in index order.
// A faulting actuator is skipped for that command and reported; its
// siblings are still driven.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Port, VOLTAGE_MAX, VOLTAGE_MIN, validate_ports};
use crate::error::{ActuatorFault, ConfigError};

/// Signed motor command, always within [VOLTAGE_MIN, VOLTAGE_MAX]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "i32", into = "i32")]
pub struct Voltage(i32);

impl Voltage {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(VOLTAGE_MAX);
    pub const MIN: Self = Self(VOLTAGE_MIN);

    /// Clamp any integer into the valid command range
    pub fn saturating(raw: i32) -> Self {
        Self(raw.clamp(VOLTAGE_MIN, VOLTAGE_MAX))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for Voltage {
    fn from(raw: i32) -> Self {
        Self::saturating(raw)
    }
}

impl From<Voltage> for i32 {
    fn from(voltage: Voltage) -> Self {
        voltage.0
    }
}

/// A single motor handle bound to one hardware port
pub trait Actuator {
    fn port(&self) -> Port;

    /// Command the motor. Errors are per-actuator and never abort the group.
    fn apply_voltage(&mut self, voltage: Voltage) -> Result<(), ActuatorFault>;
}

/// The motors mechanically coupled to one side of the drivetrain
pub struct MotorGroup<A: Actuator> {
    actuators: Vec<A>,
    last_voltage: Voltage,
    faults: Vec<ActuatorFault>,
}

impl<A: Actuator> MotorGroup<A> {
    /// Validate `ports` and bind one actuator per port, in order
    ///
    /// `bind` is only called once every port has passed validation, so a bad
    /// port list never acquires any hardware.
    pub fn new<F>(ports: &[Port], mut bind: F) -> Result<Self, ConfigError>
    where
        F: FnMut(Port) -> Result<A, ConfigError>,
    {
        validate_ports(ports)?;

        let actuators = ports
            .iter()
            .map(|&port| bind(port))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Motor group bound to ports {:?}", ports);
        Ok(Self {
            actuators,
            last_voltage: Voltage::ZERO,
            faults: Vec::new(),
        })
    }

    /// Apply `voltage` to every actuator in the group
    pub fn drive(&mut self, voltage: Voltage) {
        let mut faults = Vec::new();

        for actuator in &mut self.actuators {
            if let Err(fault) = actuator.apply_voltage(voltage) {
                // Only log on the transition into a fault, not every cycle
                if self.faults.iter().any(|f| f.port == fault.port) {
                    debug!("{}", fault);
                } else {
                    warn!("{}", fault);
                }
                faults.push(fault);
            }
        }

        for recovered in self
            .faults
            .iter()
            .filter(|old| !faults.iter().any(|f| f.port == old.port))
        {
            info!("Actuator on port {} recovered", recovered.port);
        }

        self.faults = faults;
        self.last_voltage = voltage;
    }

    /// Drive the group to neutral
    pub fn stop(&mut self) {
        self.drive(Voltage::ZERO);
    }

    /// Faults raised by the most recent `drive`
    pub fn faults(&self) -> &[ActuatorFault] {
        &self.faults
    }

    pub fn last_voltage(&self) -> Voltage {
        self.last_voltage
    }

    pub fn ports(&self) -> Vec<Port> {
        self.actuators.iter().map(|a| a.port()).collect()
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }
}

impl<A: Actuator> Drop for MotorGroup<A> {
    fn drop(&mut self) {
        // Leave the motors neutral when the group is torn down mid-motion
        if self.last_voltage != Voltage::ZERO {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{SimMotor, SimProbe};
    use std::sync::Arc;

    fn sim_group(ports: &[Port]) -> (MotorGroup<SimMotor>, Vec<Arc<SimProbe>>) {
        let mut probes = Vec::new();
        let group = MotorGroup::new(ports, |port| {
            let motor = SimMotor::new(port);
            probes.push(motor.probe());
            Ok(motor)
        })
        .unwrap();
        (group, probes)
    }

    #[test]
    fn test_voltage_saturates() {
        assert_eq!(Voltage::saturating(0), Voltage::ZERO);
        assert_eq!(Voltage::saturating(50).get(), 50);
        assert_eq!(Voltage::saturating(254), Voltage::MAX);
        assert_eq!(Voltage::saturating(i32::MIN), Voltage::MIN);
        assert_eq!(Voltage::from(-128), Voltage::MIN);
    }

    #[test]
    fn test_voltage_deserialize_clamps() {
        let v: Voltage = serde_json::from_str("500").unwrap();
        assert_eq!(v, Voltage::MAX);
        assert_eq!(serde_json::to_string(&Voltage::saturating(-12)).unwrap(), "-12");
    }

    #[test]
    fn test_drive_applies_same_voltage_to_all() {
        for n in 1..=6u8 {
            let ports: Vec<Port> = (1..=n).collect();
            let (mut group, probes) = sim_group(&ports);
            assert_eq!(group.len(), n as usize);

            for raw in [VOLTAGE_MIN, -64, -1, 0, 1, 77, VOLTAGE_MAX] {
                group.drive(Voltage::saturating(raw));
                for probe in &probes {
                    assert_eq!(probe.voltage().get(), raw);
                }
            }
            assert!(group.faults().is_empty());
        }
    }

    #[test]
    fn test_ports_kept_in_order() {
        let (group, _) = sim_group(&[9, 3, 14]);
        assert_eq!(group.ports(), vec![9, 3, 14]);
    }

    #[test]
    fn test_invalid_ports_bind_nothing() {
        let cases: [&[Port]; 4] = [&[], &[1, 1], &[0, 2], &[5, 22]];
        for ports in cases {
            let mut bound = 0;
            let result = MotorGroup::new(ports, |port| {
                bound += 1;
                Ok(SimMotor::new(port))
            });
            assert!(result.is_err(), "ports {:?} should be rejected", ports);
            assert_eq!(bound, 0);
        }
    }

    #[test]
    fn test_bind_failure_propagates() {
        let result = MotorGroup::<SimMotor>::new(&[1, 2], |port| {
            if port == 2 {
                Err(ConfigError::PortOutOfRange { port })
            } else {
                Ok(SimMotor::new(port))
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_faulting_actuator_does_not_block_siblings() {
        let mut probes = Vec::new();
        let mut group = MotorGroup::new(&[1, 2, 3], |port| {
            let motor = if port == 2 {
                SimMotor::faulted(port)
            } else {
                SimMotor::new(port)
            };
            probes.push(motor.probe());
            Ok(motor)
        })
        .unwrap();

        group.drive(Voltage::saturating(90));

        assert_eq!(probes[0].voltage().get(), 90);
        assert_eq!(probes[1].commands(), 0);
        assert_eq!(probes[2].voltage().get(), 90);
        assert_eq!(group.faults().len(), 1);
        assert_eq!(group.faults()[0].port, 2);
        assert_eq!(group.last_voltage().get(), 90);
    }

    #[test]
    fn test_drop_stops_moving_group() {
        let (mut group, probes) = sim_group(&[1, 2]);
        group.drive(Voltage::saturating(40));
        drop(group);
        for probe in &probes {
            assert_eq!(probe.voltage(), Voltage::ZERO);
            assert_eq!(probe.commands(), 2);
        }
    }

    #[test]
    fn test_drop_after_stop_sends_nothing() {
        let (mut group, probes) = sim_group(&[1]);
        group.drive(Voltage::saturating(40));
        group.stop();
        drop(group);
        assert_eq!(probes[0].commands(), 2);
    }
}
