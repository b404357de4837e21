//! ds-core - Driver station communication core for FRC robots
//!
//! This library implements the client side of the FRC 2015 control
//! protocol: robot discovery over the LAN, the periodic control packet
//! cadence, robot telemetry parsing, and the one-shot firmware version
//! probe.
//!
//! The main entry point is [`DriverStation`], which owns all protocol
//! state and is driven by a caller-supplied periodic tick (canonically
//! every 20 ms).

pub mod config;
pub mod core;
pub mod error;
pub mod net;
pub mod protocol;
pub mod versions;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::core::station::DriverStation;
pub use crate::core::types::{Alliance, ControlMode, Event, Joystick, RobotRequest, SocketType};
pub use crate::error::{Error, Result};
