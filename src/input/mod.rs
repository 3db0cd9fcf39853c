// Controller input: analog axes and buttons read once per cycle

mod keyboard;

pub use keyboard::KeyboardController;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AXIS_MAX, AXIS_MIN};
use crate::error::InputError;

/// One analog stick reading, within [AXIS_MIN, AXIS_MAX]
pub type AxisReading = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::LeftX, Axis::LeftY, Axis::RightX, Axis::RightY];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    /// Switch between tank and arcade
    ToggleMode,
    /// The display's center button
    Center,
    /// Operator asked to end teleop
    Quit,
}

/// A handheld controller (or anything standing in for one)
pub trait InputSource {
    /// Raw reading, or why none is available
    fn try_read_axis(&mut self, axis: Axis) -> Result<i32, InputError>;

    /// Reading clamped to the stick range; unavailable input reads as neutral
    fn read_axis(&mut self, axis: Axis) -> AxisReading {
        match self.try_read_axis(axis) {
            Ok(raw) => raw.clamp(AXIS_MIN, AXIS_MAX),
            Err(e) => {
                debug!("{:?} unavailable ({}), reading neutral", axis, e);
                0
            }
        }
    }

    /// True once per press of `button`
    fn take_press(&mut self, _button: Button) -> bool {
        false
    }
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn try_read_axis(&mut self, axis: Axis) -> Result<i32, InputError> {
        (**self).try_read_axis(axis)
    }

    fn take_press(&mut self, button: Button) -> bool {
        (**self).take_press(button)
    }
}
