// In-memory actuator for simulation and tests

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use tracing::trace;

use super::group::{Actuator, Voltage};
use crate::config::Port;
use crate::error::ActuatorFault;

/// Read side of a simulated motor
#[derive(Debug, Default)]
pub struct SimProbe {
    voltage: AtomicI32,
    commands: AtomicUsize,
}

impl SimProbe {
    /// Last accepted voltage
    pub fn voltage(&self) -> Voltage {
        Voltage::saturating(self.voltage.load(Ordering::Relaxed))
    }

    /// Number of accepted commands
    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::Relaxed)
    }
}

pub struct SimMotor {
    port: Port,
    probe: Arc<SimProbe>,
    faulted: bool,
}

impl SimMotor {
    pub fn new(port: Port) -> Self {
        Self {
            port,
            probe: Arc::default(),
            faulted: false,
        }
    }

    /// A motor that rejects every command, as if unplugged
    pub fn faulted(port: Port) -> Self {
        Self {
            faulted: true,
            ..Self::new(port)
        }
    }

    pub fn probe(&self) -> Arc<SimProbe> {
        Arc::clone(&self.probe)
    }
}

impl Actuator for SimMotor {
    fn port(&self) -> Port {
        self.port
    }

    fn apply_voltage(&mut self, voltage: Voltage) -> Result<(), ActuatorFault> {
        if self.faulted {
            return Err(ActuatorFault::new(self.port, "disconnected"));
        }
        trace!("sim motor {} <- {}", self.port, voltage.get());
        self.probe.voltage.store(voltage.get(), Ordering::Relaxed);
        self.probe.commands.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
