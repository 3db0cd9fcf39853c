// Feetech STS serial bus, driven in PWM mode as drivetrain actuators
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Each smart port maps to the servo with the same bus ID.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::group::{Actuator, Voltage};
use crate::config::{Port, VOLTAGE_MAX};
use crate::error::ActuatorFault;

/// Default serial configuration for Feetech motors
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 20;

/// Full-scale PWM goal in PWM mode
pub const PWM_MAX: i16 = 1000;

/// Sign bit of the PWM goal register (bits 0-9 hold the magnitude)
const PWM_SIGN_BIT: u16 = 1 << 10;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Register addresses used by the drivetrain
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    ModelNumber = 3,    // 2 bytes, read-only
    OperatingMode = 33, // 1 byte: 0=position, 1=velocity, 2=PWM, 3=step
    TorqueEnable = 40,  // 1 byte: 0=off, 1=on
    GoalPwm = 44,       // 2 bytes, sign bit 10 (PWM mode)
    Lock = 55,          // 1 byte: 0=unlocked, 1=locked
}

/// Operating modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
    Pwm = 2,
    Step = 3,
}

/// Error types for Feetech communication
#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Feetech motor bus - handles serial communication with motors
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    /// Open a new connection to the motor bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Checksum over everything after the header
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);
        packet.push(Self::checksum(&packet[2..]));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        // Drop late replies so they are not read as this command's status
        self.port.clear(serialport::ClearBuffer::Input)?;
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a status packet and return its parameters
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id: expected_id }
            } else {
                FeetechError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let [id, length] = id_length;

        if id != expected_id {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }
        if length < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Length {} too short", length),
            });
        }

        // error + params + checksum
        let mut remaining = vec![0u8; length as usize];
        self.port.read_exact(&mut remaining)?;

        parse_status(id, length, &remaining)
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        let packet = Self::build_packet(id, Instruction::Write, &[register as u8, value]);
        debug!("Write u8 to motor {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;
        self.read_response(id)?;
        Ok(())
    }

    /// Write two bytes, little-endian
    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        let packet = Self::build_packet(id, Instruction::Write, &[register as u8, lo, hi]);
        debug!("Write u16 to motor {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;
        self.read_response(id)?;
        Ok(())
    }

    pub fn read_u8(&mut self, id: u8, register: Register) -> Result<u8> {
        let packet = Self::build_packet(id, Instruction::Read, &[register as u8, 1]);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        response
            .first()
            .copied()
            .ok_or_else(|| FeetechError::InvalidResponse {
                id,
                reason: "Empty response".to_string(),
            })
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let packet = Self::build_packet(id, Instruction::Read, &[register as u8, 2]);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        match response[..] {
            [lo, hi, ..] => Ok(u16::from_le_bytes([lo, hi])),
            _ => Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            }),
        }
    }

    /// Model number and operating mode of `id`, or None if it does not answer a ping
    pub fn identify(&mut self, id: u8) -> Result<Option<(u16, u8)>> {
        if !self.ping(id)? {
            return Ok(None);
        }
        let model = self.read_u16(id, Register::ModelNumber)?;
        let mode = self.read_u8(id, Register::OperatingMode)?;
        Ok(Some((model, mode)))
    }

    /// Disable torque, switch to `mode`, re-enable torque
    pub fn configure_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)?;
        self.write_u8(id, Register::OperatingMode, mode as u8)?;
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    /// Signed PWM goal in [-PWM_MAX, PWM_MAX]
    pub fn set_pwm(&mut self, id: u8, pwm: i16) -> Result<()> {
        self.write_u16(id, Register::GoalPwm, encode_pwm(pwm))
    }
}

/// Validate a status packet body: [error, params..., checksum]
fn parse_status(id: u8, length: u8, body: &[u8]) -> Result<Vec<u8>> {
    let Some((&received_checksum, rest)) = body.split_last() else {
        return Err(FeetechError::InvalidResponse {
            id,
            reason: "Empty status packet".to_string(),
        });
    };

    let mut checksum_data = vec![id, length];
    checksum_data.extend_from_slice(rest);
    if FeetechBus::checksum(&checksum_data) != received_checksum {
        return Err(FeetechError::ChecksumMismatch { id });
    }

    match rest.split_first() {
        Some((&0, params)) => Ok(params.to_vec()),
        Some((&status, _)) => Err(FeetechError::MotorError { id, status }),
        None => Err(FeetechError::InvalidResponse {
            id,
            reason: "Missing status byte".to_string(),
        }),
    }
}

/// Scale a drive voltage linearly onto the PWM range
pub fn voltage_to_pwm(voltage: Voltage) -> i16 {
    (voltage.get() * PWM_MAX as i32 / VOLTAGE_MAX) as i16
}

/// Sign-magnitude with the sign in bit 10
fn encode_pwm(pwm: i16) -> u16 {
    let magnitude = pwm.unsigned_abs().min(PWM_MAX as u16);
    if pwm < 0 {
        PWM_SIGN_BIT | magnitude
    } else {
        magnitude
    }
}

/// Shared handle to the one serial bus all drivetrain motors sit on
pub type SharedBus = Arc<Mutex<FeetechBus>>;

/// One servo on the bus, commanded as a drivetrain motor
pub struct FeetechMotor {
    port: Port,
    bus: SharedBus,
}

impl FeetechMotor {
    /// Bind the servo at `port` and put it in PWM mode
    ///
    /// A servo that does not answer is still bound; it will report a fault
    /// on each command until it comes back.
    pub fn bind(bus: &SharedBus, port: Port) -> Self {
        match bus.lock() {
            Ok(mut guard) => {
                if let Err(e) = guard.configure_mode(port, OperatingMode::Pwm) {
                    warn!("Motor {} not configured for PWM: {}", port, e);
                }
            }
            Err(_) => warn!("Motor bus lock poisoned while binding {}", port),
        }

        Self {
            port,
            bus: Arc::clone(bus),
        }
    }
}

impl Actuator for FeetechMotor {
    fn port(&self) -> Port {
        self.port
    }

    fn apply_voltage(&mut self, voltage: Voltage) -> std::result::Result<(), ActuatorFault> {
        let mut bus = self
            .bus
            .lock()
            .map_err(|_| ActuatorFault::new(self.port, "motor bus lock poisoned"))?;

        bus.set_pwm(self.port, voltage_to_pwm(voltage))
            .map_err(|e| ActuatorFault::new(self.port, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits};
    use std::collections::VecDeque;

    /// Serial line where only `responders` answer, with a shared receive buffer
    struct MockLine {
        responders: Vec<u8>,
        rx: Arc<Mutex<VecDeque<u8>>>,
    }

    fn status_packet(id: u8) -> Vec<u8> {
        vec![0xFF, 0xFF, id, 2, 0, FeetechBus::checksum(&[id, 2, 0])]
    }

    impl Read for MockLine {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut rx = self.rx.lock().unwrap();
            if rx.is_empty() {
                return Err(std::io::ErrorKind::TimedOut.into());
            }
            let n = buf.len().min(rx.len());
            for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for MockLine {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(&id) = buf.get(2) {
                if self.responders.contains(&id) {
                    self.rx.lock().unwrap().extend(status_packet(id));
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SerialPort for MockLine {
        fn name(&self) -> Option<String> {
            Some("mock".to_string())
        }
        fn baud_rate(&self) -> serialport::Result<u32> {
            Ok(DEFAULT_BAUDRATE)
        }
        fn data_bits(&self) -> serialport::Result<DataBits> {
            Ok(DataBits::Eight)
        }
        fn flow_control(&self) -> serialport::Result<FlowControl> {
            Ok(FlowControl::None)
        }
        fn parity(&self) -> serialport::Result<Parity> {
            Ok(Parity::None)
        }
        fn stop_bits(&self) -> serialport::Result<StopBits> {
            Ok(StopBits::One)
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        }
        fn set_baud_rate(&mut self, _: u32) -> serialport::Result<()> {
            Ok(())
        }
        fn set_data_bits(&mut self, _: DataBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_flow_control(&mut self, _: FlowControl) -> serialport::Result<()> {
            Ok(())
        }
        fn set_parity(&mut self, _: Parity) -> serialport::Result<()> {
            Ok(())
        }
        fn set_stop_bits(&mut self, _: StopBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_timeout(&mut self, _: Duration) -> serialport::Result<()> {
            Ok(())
        }
        fn write_request_to_send(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn write_data_terminal_ready(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn bytes_to_read(&self) -> serialport::Result<u32> {
            Ok(self.rx.lock().unwrap().len() as u32)
        }
        fn bytes_to_write(&self) -> serialport::Result<u32> {
            Ok(0)
        }
        fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
            if matches!(buffer_to_clear, ClearBuffer::Input | ClearBuffer::All) {
                self.rx.lock().unwrap().clear();
            }
            Ok(())
        }
        fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
            Ok(Box::new(MockLine {
                responders: self.responders.clone(),
                rx: Arc::clone(&self.rx),
            }))
        }
        fn set_break(&self) -> serialport::Result<()> {
            Ok(())
        }
        fn clear_break(&self) -> serialport::Result<()> {
            Ok(())
        }
    }

    fn mock_bus(responders: &[u8]) -> (SharedBus, Arc<Mutex<VecDeque<u8>>>) {
        let rx = Arc::new(Mutex::new(VecDeque::new()));
        let line = MockLine {
            responders: responders.to_vec(),
            rx: Arc::clone(&rx),
        };
        let bus = FeetechBus {
            port: Box::new(line),
        };
        (Arc::new(Mutex::new(bus)), rx)
    }

    #[test]
    fn test_silent_motor_faults_alone() {
        let (bus, _) = mock_bus(&[1, 3]);
        let mut motors: Vec<FeetechMotor> =
            [1, 2, 3].iter().map(|&port| FeetechMotor::bind(&bus, port)).collect();

        let results: Vec<_> = motors
            .iter_mut()
            .map(|m| m.apply_voltage(Voltage::saturating(64)))
            .collect();

        assert!(results[0].is_ok());
        let fault = results[1].as_ref().unwrap_err();
        assert_eq!(fault.port, 2);
        assert!(fault.reason.contains("Timeout"), "{}", fault.reason);
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_identify_reports_each_motor() {
        let (bus, _) = mock_bus(&[1]);
        let mut bus = bus.lock().unwrap();

        // Motor 1 answers the ping, but its status carries no register bytes
        assert!(matches!(
            bus.identify(1),
            Err(FeetechError::InvalidResponse { id: 1, .. })
        ));
        // The bus stays usable for the next motor
        assert!(matches!(bus.identify(2), Ok(None)));
        assert!(bus.ping(1).unwrap());
    }

    #[test]
    fn test_late_reply_not_blamed_on_siblings() {
        let (bus, rx) = mock_bus(&[1, 2, 3]);
        let mut motors: Vec<FeetechMotor> =
            [1, 2, 3].iter().map(|&port| FeetechMotor::bind(&bus, port)).collect();

        // Motor 2 answered after the timeout on an earlier command
        rx.lock().unwrap().extend(status_packet(2));

        for _ in 0..3 {
            for motor in &mut motors {
                assert_eq!(motor.apply_voltage(Voltage::saturating(-30)), Ok(()));
            }
        }
    }

    #[test]
    fn test_checksum() {
        // ID=1, Length=4, Instruction=WRITE, Addr=30, Data=0, 2
        let data = [1u8, 4, 0x03, 30, 0, 2];
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(FeetechBus::checksum(&data), 215);
    }

    #[test]
    fn test_pwm_encoding() {
        assert_eq!(encode_pwm(0), 0);
        assert_eq!(encode_pwm(500), 500);
        assert_eq!(encode_pwm(-500), 0x400 | 500);
        assert_eq!(encode_pwm(-1), 0x401);
        assert_eq!(encode_pwm(2000), 1000);
        assert_eq!(encode_pwm(i16::MIN), 0x400 | 1000);
    }

    #[test]
    fn test_voltage_to_pwm_full_scale() {
        assert_eq!(voltage_to_pwm(Voltage::ZERO), 0);
        assert_eq!(voltage_to_pwm(Voltage::MAX), PWM_MAX);
        assert_eq!(voltage_to_pwm(Voltage::MIN), -PWM_MAX);
        assert_eq!(voltage_to_pwm(Voltage::saturating(64)), 503);
    }

    #[test]
    fn test_build_write_packet() {
        let packet = FeetechBus::build_packet(4, Instruction::Write, &[44, 0xF4, 0x01]);
        assert_eq!(packet.len(), 9);
        assert_eq!(&packet[..5], &[0xFF, 0xFF, 4, 5, 0x03]);
        assert_eq!(&packet[5..8], &[44, 0xF4, 0x01]);
        assert_eq!(packet[8], FeetechBus::checksum(&packet[2..8]));
    }

    #[test]
    fn test_parse_status() {
        // Status reply carrying two parameter bytes
        let params = [0x00, 0x2C, 0x01];
        let mut sum_data = vec![3u8, 4];
        sum_data.extend_from_slice(&params);
        let mut body = params.to_vec();
        body.push(FeetechBus::checksum(&sum_data));
        assert_eq!(parse_status(3, 4, &body).unwrap(), vec![0x2C, 0x01]);

        let mut bad = body.clone();
        *bad.last_mut().unwrap() ^= 0xFF;
        assert!(matches!(
            parse_status(3, 4, &bad),
            Err(FeetechError::ChecksumMismatch { id: 3 })
        ));

        // Overload bit set in the status byte
        let body = [0x20, FeetechBus::checksum(&[3, 2, 0x20])];
        assert!(matches!(
            parse_status(3, 2, &body),
            Err(FeetechError::MotorError { id: 3, status: 0x20 })
        ));
    }
}
