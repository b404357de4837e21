//! FRC 2015 wire protocol
//!
//! Constants shared by the packet assembly and parsing code. The byte
//! values are fixed by the 2015 roboRIO firmware and must not change.

pub mod frc2015;

pub use frc2015::{ClientPacketBuilder, RobotTelemetry, joystick_section_size, parse_robot_packet};

/// Default port the robot listens on (client to robot)
pub const ROBOT_PORT: u16 = 1110;
/// Default port the client listens on (robot to client)
pub const CLIENT_PORT: u16 = 1150;

/// Header byte of the general section of every client packet
pub const GENERAL_HEADER: u8 = 0x01;
/// Header byte of each joystick section (TeleOperated only)
pub const JOYSTICK_HEADER: u8 = 0x0C;

// Operation mode codes (client packet byte 3)
pub const MODE_DISABLED: u8 = 0x00;
pub const MODE_TELEOPERATED: u8 = 0x04;
pub const MODE_TEST: u8 = 0x05;
pub const MODE_AUTONOMOUS: u8 = 0x06;
pub const MODE_EMERGENCY_STOP: u8 = 0x80;

// Robot request codes (client packet byte 4)
pub const REQUEST_NORMAL: u8 = 0x10;
pub const REQUEST_RESTART_CODE: u8 = 0x14;
pub const REQUEST_REBOOT: u8 = 0x18;

// Alliance station codes (client packet byte 5)
pub const ALLIANCE_RED1: u8 = 0x00;
pub const ALLIANCE_RED2: u8 = 0x01;
pub const ALLIANCE_RED3: u8 = 0x02;
pub const ALLIANCE_BLUE1: u8 = 0x03;
pub const ALLIANCE_BLUE2: u8 = 0x04;
pub const ALLIANCE_BLUE3: u8 = 0x05;

// Robot status packet field offsets
pub const OFFSET_CONTROL_ECHO: usize = 3;
pub const OFFSET_ROBOT_STATUS: usize = 4;
pub const OFFSET_VOLTAGE_MAJOR: usize = 5;
pub const OFFSET_VOLTAGE_MINOR: usize = 6;

/// Robot status byte value meaning no user program is running
pub const STATUS_NO_PROGRAM: u8 = 0x00;

/// Minimum length of a parseable robot status packet
pub const MIN_ROBOT_PACKET_SIZE: usize = 8;
