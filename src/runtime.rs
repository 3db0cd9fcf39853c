// Teleop lifecycle: initialize -> fixed-rate drive cycles -> stop
//
// The drivetrain is inert until initialize() and after stop(). The loop ends on
// Ctrl-C, an operator quit, or when the teleop period runs out, and always
// leaves the motors neutral.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Port, RobotConfig};
use crate::display::StatusDisplay;
use crate::drive::DriveController;
use crate::error::ConfigError;
use crate::input::{Button, InputSource};
use crate::messages::{DriveStatus, Phase};
use crate::motor::{Actuator, FeetechBus, FeetechMotor, MotorGroup, SimMotor};

pub struct Runtime<A: Actuator, I> {
    controller: DriveController<A, I>,
    display: StatusDisplay,
    phase: Phase,
    status_tx: watch::Sender<DriveStatus>,
}

impl<A: Actuator, I: InputSource> Runtime<A, I> {
    pub fn new(controller: DriveController<A, I>) -> Self {
        let (status_tx, _) = watch::channel(controller.status().clone());
        Self {
            controller,
            display: StatusDisplay::new(),
            phase: Phase::Initializing,
            status_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn display(&self) -> &StatusDisplay {
        &self.display
    }

    pub fn controller(&self) -> &DriveController<A, I> {
        &self.controller
    }

    /// Latest cycle snapshot, for observers outside the drive loop
    pub fn subscribe(&self) -> watch::Receiver<DriveStatus> {
        self.status_tx.subscribe()
    }

    pub fn initialize(&mut self) {
        if self.phase != Phase::Initializing {
            return;
        }
        self.display.greet();
        self.display.render_status(self.controller.status());
        self.phase = Phase::Teleop;
        info!("Teleop started");
    }

    /// Run one drive cycle. Returns false once the operator asks to quit.
    ///
    /// Outside teleop this only waits, so a scheduler can call it freely.
    pub async fn tick(&mut self) -> bool {
        if self.phase != Phase::Teleop {
            tokio::time::sleep(self.controller.cycle_delay()).await;
            return self.phase != Phase::Stopped;
        }

        // Button handling happens between cycles, never inside one
        let input = self.controller.input_mut();
        if input.take_press(Button::Quit) {
            return false;
        }
        let toggle = input.take_press(Button::ToggleMode);
        let center = input.take_press(Button::Center);
        if toggle {
            self.controller.toggle_mode();
        }
        if center {
            self.display.on_center_button();
        }

        let status = self.controller.run_cycle().await;
        self.display.render_status(&status);
        self.status_tx.send_replace(status);
        true
    }

    /// Neutral the drivetrain once and go inert
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        self.controller.stop();
        self.display.render_status(self.controller.status());
        self.status_tx.send_replace(self.controller.status().clone());
        self.phase = Phase::Stopped;
        info!("Teleop stopped");
    }
}

/// Build the drivetrain described by `config` and run teleop on it
pub async fn run<I: InputSource>(
    config: &RobotConfig,
    input: I,
    period: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;

    if config.simulate {
        info!("Using simulated motors");
        let (left, right) = sim_groups(config)?;
        let controller = DriveController::new(left, right, input, config.initial_mode)
            .with_cycle_delay(config.cycle_delay());
        teleop(controller, period).await
    } else {
        info!("Opening motor bus on {}", config.serial_port);
        let bus = FeetechBus::open(&config.serial_port).map_err(ConfigError::Bus)?;
        let bus = Arc::new(Mutex::new(bus));
        let bind = |port: Port| Ok::<_, ConfigError>(FeetechMotor::bind(&bus, port));
        let left = MotorGroup::new(&config.left_ports, bind)?;
        let right = MotorGroup::new(&config.right_ports, bind)?;
        let controller = DriveController::new(left, right, input, config.initial_mode)
            .with_cycle_delay(config.cycle_delay());
        teleop(controller, period).await
    }
}

fn sim_groups(
    config: &RobotConfig,
) -> Result<(MotorGroup<SimMotor>, MotorGroup<SimMotor>), ConfigError> {
    let bind = |port: Port| {
        Ok::<_, ConfigError>(if config.simulated_faults.contains(&port) {
            SimMotor::faulted(port)
        } else {
            SimMotor::new(port)
        })
    };
    Ok((
        MotorGroup::new(&config.left_ports, bind)?,
        MotorGroup::new(&config.right_ports, bind)?,
    ))
}

/// Drive loop until Ctrl-C, operator quit, or the end of `period`
pub async fn teleop<A: Actuator, I: InputSource>(
    controller: DriveController<A, I>,
    period: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut runtime = Runtime::new(controller);

    let mut status_rx = runtime.subscribe();
    let telemetry = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            match serde_json::to_string(&status) {
                Ok(json) => debug!("status: {}", json),
                Err(e) => warn!("Failed to encode status: {}", e),
            }
        }
    });

    runtime.initialize();
    match period {
        Some(period) => info!("Teleop period: {}s", period.as_secs_f32()),
        None => info!("Teleop until Ctrl-C"),
    }

    let deadline = async {
        match period {
            Some(period) => tokio::time::sleep(period).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                info!("Ctrl-C received");
                break signal.map_err(Into::into);
            }
            _ = &mut deadline => {
                info!("Teleop period elapsed");
                break Ok(());
            }
            running = runtime.tick() => {
                if !running {
                    info!("Operator quit");
                    break Ok(());
                }
            }
        }
    };

    runtime.stop();
    drop(runtime);
    join_telemetry(telemetry).await;
    result
}

/// Wait for the telemetry task; a panic there is logged, not swallowed
async fn join_telemetry(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Telemetry task failed: {}", e);
            false
        }
    }
}
