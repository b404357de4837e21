//! Core data types for robot control and telemetry.
//!
//! Key types for callers:
//! - [`ControlMode`] / [`Alliance`] / [`RobotRequest`]: the three enums
//!   carried in every client packet
//! - [`Joystick`]: a snapshot of one attached input device
//! - [`Event`]: observable robot state changes, delivered through an
//!   [`EventReceiver`]

use crate::protocol;
use serde::Deserialize;

/// Type alias for the observer event channel (station side)
pub type EventSender = crossbeam_channel::Sender<Event>;
/// Type alias for the observer event channel (caller side)
pub type EventReceiver = crossbeam_channel::Receiver<Event>;

/// Robot control mode, as requested by the operator or the FMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    #[default]
    Disabled,
    TeleOperated,
    Autonomous,
    Test,
    EmergencyStop,
}

impl ControlMode {
    /// Wire code carried in client packet byte 3
    pub fn code(self) -> u8 {
        match self {
            ControlMode::Disabled => protocol::MODE_DISABLED,
            ControlMode::TeleOperated => protocol::MODE_TELEOPERATED,
            ControlMode::Autonomous => protocol::MODE_AUTONOMOUS,
            ControlMode::Test => protocol::MODE_TEST,
            ControlMode::EmergencyStop => protocol::MODE_EMERGENCY_STOP,
        }
    }

    /// Parse a wire code, `None` if unrecognized
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            protocol::MODE_DISABLED => Some(ControlMode::Disabled),
            protocol::MODE_TELEOPERATED => Some(ControlMode::TeleOperated),
            protocol::MODE_AUTONOMOUS => Some(ControlMode::Autonomous),
            protocol::MODE_TEST => Some(ControlMode::Test),
            protocol::MODE_EMERGENCY_STOP => Some(ControlMode::EmergencyStop),
            _ => None,
        }
    }

    /// Parse a wire code, substituting `Disabled` for unrecognized values.
    ///
    /// The packet cadence must not stall on one bad value, so the invalid
    /// code is logged and replaced rather than propagated.
    pub fn from_code_lenient(code: u8) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            log::error!("Invalid control mode code 0x{:02X}", code);
            log::debug!("Using Disabled (0x{:02X})", protocol::MODE_DISABLED);
            ControlMode::Disabled
        })
    }
}

/// Alliance station assigned for the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alliance {
    #[default]
    Red1,
    Red2,
    Red3,
    Blue1,
    Blue2,
    Blue3,
}

impl Alliance {
    /// Wire code carried in client packet byte 5
    pub fn code(self) -> u8 {
        match self {
            Alliance::Red1 => protocol::ALLIANCE_RED1,
            Alliance::Red2 => protocol::ALLIANCE_RED2,
            Alliance::Red3 => protocol::ALLIANCE_RED3,
            Alliance::Blue1 => protocol::ALLIANCE_BLUE1,
            Alliance::Blue2 => protocol::ALLIANCE_BLUE2,
            Alliance::Blue3 => protocol::ALLIANCE_BLUE3,
        }
    }

    /// Parse a wire code, `None` if unrecognized
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            protocol::ALLIANCE_RED1 => Some(Alliance::Red1),
            protocol::ALLIANCE_RED2 => Some(Alliance::Red2),
            protocol::ALLIANCE_RED3 => Some(Alliance::Red3),
            protocol::ALLIANCE_BLUE1 => Some(Alliance::Blue1),
            protocol::ALLIANCE_BLUE2 => Some(Alliance::Blue2),
            protocol::ALLIANCE_BLUE3 => Some(Alliance::Blue3),
            _ => None,
        }
    }

    /// Parse a wire code, substituting `Red1` for unrecognized values
    pub fn from_code_lenient(code: u8) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            log::error!("Invalid alliance code 0x{:02X}", code);
            log::debug!("Using Red1 (0x{:02X})", protocol::ALLIANCE_RED1);
            Alliance::Red1
        })
    }
}

/// Pending robot-level request, latched until [`reset`](crate::DriverStation::reset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RobotRequest {
    #[default]
    Normal,
    RebootRobot,
    RestartCode,
}

impl RobotRequest {
    /// Wire code carried in client packet byte 4
    pub fn code(self) -> u8 {
        match self {
            RobotRequest::Normal => protocol::REQUEST_NORMAL,
            RobotRequest::RebootRobot => protocol::REQUEST_REBOOT,
            RobotRequest::RestartCode => protocol::REQUEST_RESTART_CODE,
        }
    }
}

/// Snapshot of one attached joystick.
///
/// Axes are signed fractions in [-1.0, +1.0]. Hats carry the POV angle in
/// degrees (0, 45, ..., 315) or -1 when centered.
#[derive(Debug, Clone, Default)]
pub struct Joystick {
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub hats: Vec<i16>,
}

/// Transport used for one peer class (FMS, radio or robot).
///
/// A closed two-case sum: UDP endpoints send datagrams to explicit
/// destinations, TCP endpoints hold a single connected stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketType {
    #[default]
    Udp,
    Tcp,
}

/// Observable robot state changes.
///
/// Delivered in arrival order through the channel handed out by
/// [`DriverStation::events`](crate::DriverStation::events). Voltage is
/// emitted for every telemetry packet; code and control mode only on edges.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    VoltageChanged(f64),
    CodeChanged(bool),
    ControlModeChanged(ControlMode),
    LibVersionChanged(String),
    PcmVersionChanged(String),
    PdpVersionChanged(String),
    /// Raw FMS datagram, forwarded without interpretation
    FmsPacket(Vec<u8>),
    /// Raw radio datagram, forwarded without interpretation
    RadioPacket(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_code_round_trip() {
        for mode in [
            ControlMode::Disabled,
            ControlMode::TeleOperated,
            ControlMode::Autonomous,
            ControlMode::Test,
            ControlMode::EmergencyStop,
        ] {
            assert_eq!(ControlMode::from_code(mode.code()), Some(mode));
        }
    }

    #[test]
    fn test_invalid_mode_substitutes_disabled() {
        assert_eq!(ControlMode::from_code(0x7F), None);
        assert_eq!(ControlMode::from_code_lenient(0x7F), ControlMode::Disabled);
    }

    #[test]
    fn test_invalid_alliance_substitutes_red1() {
        assert_eq!(Alliance::from_code(0x42), None);
        assert_eq!(Alliance::from_code_lenient(0x42), Alliance::Red1);
    }

    #[test]
    fn test_request_codes() {
        assert_eq!(RobotRequest::Normal.code(), 0x10);
        assert_eq!(RobotRequest::RestartCode.code(), 0x14);
        assert_eq!(RobotRequest::RebootRobot.code(), 0x18);
    }
}
