use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tank_drive_runtime::config::{RobotConfig, TELEOP_PERIOD};
use tank_drive_runtime::drive::DriveMode;
use tank_drive_runtime::input::KeyboardController;
use tank_drive_runtime::motor::FeetechBus;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(version, about = "Tank/arcade teleop for a differential-drive robot")]
struct Cli {
    /// JSON robot config (ports, mode, motor bus)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Motor bus serial device, overrides the config
    #[arg(long, global = true)]
    serial_port: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Drive from the keyboard (default)
    Run {
        /// Initial drive mode, overrides the config
        #[arg(short, long, value_enum)]
        mode: Option<DriveMode>,

        /// Use simulated motors
        #[arg(long)]
        sim: bool,

        /// Teleop period in seconds (0 = until Ctrl-C/quit)
        #[arg(short, long, default_value_t = TELEOP_PERIOD.as_secs())]
        duration: u64,
    },
    /// Ping every configured motor on the bus (read-only)
    Ping,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let mut config = match &cli.config {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };
    if let Some(port) = cli.serial_port {
        config.serial_port = port;
    }

    match cli.command.unwrap_or(Command::Run {
        mode: None,
        sim: false,
        duration: TELEOP_PERIOD.as_secs(),
    }) {
        Command::Run {
            mode,
            sim,
            duration,
        } => {
            if let Some(mode) = mode {
                config.initial_mode = mode;
            }
            config.simulate |= sim;
            let period = (duration > 0).then(|| Duration::from_secs(duration));

            info!("Controls: WASD=left stick, IJKL=right stick, M=mode, C=center, Q=quit");
            enable_raw_mode()?;
            let result =
                tank_drive_runtime::runtime::run(&config, KeyboardController::new(), period).await;
            disable_raw_mode()?;
            result
        }
        Command::Ping => ping(&config),
    }
}

fn ping(config: &RobotConfig) -> Result<(), BoxError> {
    config.validate()?;
    let mut bus = FeetechBus::open(&config.serial_port)?;
    println!("Serial port: {}", config.serial_port);

    let sides = [("left", &config.left_ports), ("right", &config.right_ports)];
    let mut missing = 0;
    for (side, ports) in sides {
        for &port in ports.iter() {
            match bus.identify(port) {
                Ok(Some((model, mode))) => println!(
                    "  ✓ {} motor {}: model {}, mode {}",
                    side, port, model, mode
                ),
                Ok(None) => {
                    missing += 1;
                    println!("  ✗ {} motor {}: no response", side, port);
                }
                Err(e) => {
                    missing += 1;
                    println!("  ✗ {} motor {}: {}", side, port, e);
                }
            }
        }
    }

    if missing > 0 {
        return Err(format!("{} motor(s) not responding", missing).into());
    }
    Ok(())
}
