// Keyboard standing in for a two-stick controller
//
// W/S = left Y, A/D = left X, I/K = right Y, J/L = right X
// M = toggle drive mode, C = center button, Q/Esc/Ctrl-C = quit
//
// A held key reports full deflection. Terminals only report key repeats,
// so every axis returns to neutral once no key event has arrived for
// INPUT_TIMEOUT.

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{Axis, Button, InputSource};
use crate::config::AXIS_MAX;
use crate::error::InputError;

const INPUT_TIMEOUT: Duration = Duration::from_millis(100);

pub struct KeyboardController {
    axes: [i32; 4],
    last_input: Instant,
    presses: Vec<Button>,
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardController {
    pub fn new() -> Self {
        Self {
            axes: [0; 4],
            last_input: Instant::now(),
            presses: Vec::new(),
        }
    }

    /// Drain pending terminal events without blocking
    fn poll(&mut self) -> Result<(), InputError> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(KeyEvent {
                code,
                kind,
                modifiers,
                ..
            }) = event::read()?
            {
                // Raw mode swallows SIGINT
                if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
                    self.presses.push(Button::Quit);
                    continue;
                }
                self.handle_key(code, kind, Instant::now());
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode, kind: KeyEventKind, now: Instant) {
        if !matches!(kind, KeyEventKind::Press | KeyEventKind::Repeat) {
            return;
        }

        // Shift and Caps Lock report uppercase chars
        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };

        let deflect = match code {
            KeyCode::Char('w') => Some((Axis::LeftY, AXIS_MAX)),
            KeyCode::Char('s') => Some((Axis::LeftY, -AXIS_MAX)),
            KeyCode::Char('d') => Some((Axis::LeftX, AXIS_MAX)),
            KeyCode::Char('a') => Some((Axis::LeftX, -AXIS_MAX)),
            KeyCode::Char('i') => Some((Axis::RightY, AXIS_MAX)),
            KeyCode::Char('k') => Some((Axis::RightY, -AXIS_MAX)),
            KeyCode::Char('l') => Some((Axis::RightX, AXIS_MAX)),
            KeyCode::Char('j') => Some((Axis::RightX, -AXIS_MAX)),
            _ => None,
        };

        if let Some((axis, value)) = deflect {
            self.axes[axis.index()] = value;
            self.last_input = now;
            return;
        }

        // Buttons only register on the initial press
        if kind != KeyEventKind::Press {
            return;
        }
        match code {
            KeyCode::Char('m') => self.presses.push(Button::ToggleMode),
            KeyCode::Char('c') => self.presses.push(Button::Center),
            KeyCode::Char('q') | KeyCode::Esc => self.presses.push(Button::Quit),
            _ => {}
        }
    }

    fn current(&mut self, axis: Axis, now: Instant) -> i32 {
        if now.duration_since(self.last_input) > INPUT_TIMEOUT {
            self.axes = [0; 4];
        }
        self.axes[axis.index()]
    }
}

impl InputSource for KeyboardController {
    fn try_read_axis(&mut self, axis: Axis) -> Result<i32, InputError> {
        self.poll()?;
        Ok(self.current(axis, Instant::now()))
    }

    fn take_press(&mut self, button: Button) -> bool {
        match self.presses.iter().position(|&b| b == button) {
            Some(i) => {
                self.presses.remove(i);
                true
            }
            None => false,
        }
    }
}
