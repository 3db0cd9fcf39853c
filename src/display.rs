// Operator-facing text display (the brain's LCD)
//
// Lines are kept in memory and every change is logged, so the operator
// sees mode changes and actuator faults without stopping the robot.

use tracing::{info, warn};

use crate::messages::DriveStatus;

pub const LINE_COUNT: usize = 8;

const GREETING_LINE: usize = 1;
const BUTTON_LINE: usize = 2;
const MODE_LINE: usize = 3;
const VOLTAGE_LINE: usize = 4;
const FAULT_LINE: usize = 5;

#[derive(Debug, Default)]
pub struct StatusDisplay {
    lines: [String; LINE_COUNT],
    center_pressed: bool,
}

impl StatusDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, line: usize, text: impl Into<String>) {
        let text = text.into();
        let Some(slot) = self.lines.get_mut(line) else {
            warn!("Display line {} out of range (0..{})", line, LINE_COUNT);
            return;
        };
        if *slot != text {
            info!("lcd[{}]: {}", line, text);
            *slot = text;
        }
    }

    pub fn clear_line(&mut self, line: usize) {
        self.set_text(line, String::new());
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    pub fn greet(&mut self) {
        self.set_text(GREETING_LINE, "Teleop ready");
    }

    /// Toggle the button line between a message and blank
    pub fn on_center_button(&mut self) {
        self.center_pressed = !self.center_pressed;
        if self.center_pressed {
            self.set_text(BUTTON_LINE, "I was pressed!");
        } else {
            self.clear_line(BUTTON_LINE);
        }
    }

    pub fn render_status(&mut self, status: &DriveStatus) {
        self.set_text(MODE_LINE, format!("Mode: {}", status.mode));
        self.set_text(
            VOLTAGE_LINE,
            format!("L: {:4}  R: {:4}", status.left.get(), status.right.get()),
        );
        match status.faults.as_slice() {
            [] => self.clear_line(FAULT_LINE),
            [fault] => self.set_text(FAULT_LINE, format!("FAULT port {}", fault.port)),
            [fault, rest @ ..] => self.set_text(
                FAULT_LINE,
                format!("FAULT port {} (+{})", fault.port, rest.len()),
            ),
        }
    }
}
