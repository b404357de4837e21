//! Configuration loading from TOML
//!
//! # Configuration File Format
//!
//! ```toml
//! [station]
//! team = 1234
//! # robot_address = "10.12.34.2"   # optional, overrides discovery
//! # radio_address = "10.12.34.1"   # optional, overrides the derived default
//! tick_interval_ms = 20
//!
//! [network]
//! robot_input_port = 1150
//! robot_output_port = 1110
//! # fms_input_port = 0             # 0 disables the direction
//! # fms_output_port = 0
//! # radio_input_port = 0
//! # radio_output_port = 0
//! robot_socket_type = "udp"        # "udp" or "tcp"
//! socket_count = 0                 # parallel probe pairs, 0 = auto
//! static_addresses = ["10.12.34.2"]
//! ```
//!
//! All fields default to the values shown above, so an empty file (or no
//! file at all) yields a working configuration once a team number is set.

use crate::core::types::SocketType;
use crate::error::{Error, Result};
use crate::net::DISABLED_PORT;
use crate::protocol;
use serde::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// Largest accepted FRC team number
pub const MAX_TEAM_NUMBER: u16 = 9999;

/// Maximum number of parallel probe socket pairs
pub const MAX_SOCKET_COUNT: usize = 128;

const MIN_TICK_INTERVAL_MS: u64 = 5;
const MAX_TICK_INTERVAL_MS: u64 = 100;

/// Station identity and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// FRC team number (1-9999)
    ///
    /// Drives the derived robot hostname `roboRIO-<team>.local` and the
    /// derived radio address `10.TE.AM.1`.
    #[serde(default)]
    pub team: u16,

    /// Explicit robot address, skipping LAN discovery
    #[serde(default)]
    pub robot_address: Option<String>,

    /// Explicit radio address
    #[serde(default)]
    pub radio_address: Option<String>,

    /// Control packet cadence in milliseconds
    ///
    /// **Valid range**: 5-100ms
    /// **Canonical**: 20ms (the robot drops the link on a stalled cadence)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval() -> u64 {
    20
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            team: 0,
            robot_address: None,
            radio_address: None,
            tick_interval_ms: default_tick_interval(),
        }
    }
}

/// Ports, socket types and probe sizing for the socket pool
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Port the client listens on for robot telemetry
    #[serde(default = "default_robot_input_port")]
    pub robot_input_port: u16,

    /// Port the robot listens on for control packets
    #[serde(default = "default_robot_output_port")]
    pub robot_output_port: u16,

    /// FMS inbound port, 0 = disabled
    #[serde(default)]
    pub fms_input_port: u16,

    /// FMS outbound port, 0 = disabled
    #[serde(default)]
    pub fms_output_port: u16,

    /// Radio inbound port, 0 = disabled
    #[serde(default)]
    pub radio_input_port: u16,

    /// Radio outbound port, 0 = disabled
    #[serde(default)]
    pub radio_output_port: u16,

    #[serde(default)]
    pub fms_socket_type: SocketType,

    #[serde(default)]
    pub radio_socket_type: SocketType,

    #[serde(default)]
    pub robot_socket_type: SocketType,

    /// Parallel probe socket pairs, 0 = sized from the address list
    #[serde(default)]
    pub socket_count: usize,

    /// Extra candidate robot addresses appended after the interface sweeps
    #[serde(default)]
    pub static_addresses: Vec<Ipv4Addr>,
}

fn default_robot_input_port() -> u16 {
    protocol::CLIENT_PORT
}

fn default_robot_output_port() -> u16 {
    protocol::ROBOT_PORT
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            robot_input_port: default_robot_input_port(),
            robot_output_port: default_robot_output_port(),
            fms_input_port: DISABLED_PORT,
            fms_output_port: DISABLED_PORT,
            radio_input_port: DISABLED_PORT,
            radio_output_port: DISABLED_PORT,
            fms_socket_type: SocketType::Udp,
            radio_socket_type: SocketType::Udp,
            robot_socket_type: SocketType::Udp,
            socket_count: 0,
            static_addresses: Vec::new(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Validation
    ///
    /// - `team` must be 1-9999 (0 is accepted and means "not set yet")
    /// - `socket_count` must be at most 128
    /// - `tick_interval_ms` must be between 5ms and 100ms
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = basic_toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.station.team > MAX_TEAM_NUMBER {
            return Err(Error::Config(format!(
                "team must be between 1 and {} (got {})",
                MAX_TEAM_NUMBER, self.station.team
            )));
        }

        if self.network.socket_count > MAX_SOCKET_COUNT {
            return Err(Error::Config(format!(
                "socket_count must be at most {} (got {})",
                MAX_SOCKET_COUNT, self.network.socket_count
            )));
        }

        let tick = self.station.tick_interval_ms;
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&tick) {
            return Err(Error::Config(format!(
                "tick_interval_ms must be between {}ms and {}ms (got {}ms). \
                The robot treats a stalled cadence as a lost connection.",
                MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS, tick
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.robot_input_port, 1150);
        assert_eq!(config.network.robot_output_port, 1110);
        assert_eq!(config.network.fms_input_port, DISABLED_PORT);
        assert_eq!(config.network.socket_count, 0);
        assert_eq!(config.station.tick_interval_ms, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [station]
            team = 1234
            robot_address = "10.12.34.2"
            tick_interval_ms = 20

            [network]
            fms_output_port = 1160
            robot_socket_type = "udp"
            socket_count = 8
            static_addresses = ["10.12.34.2", "172.22.11.2"]
        "#;

        let config: Config = basic_toml::from_str(toml).unwrap();
        assert_eq!(config.station.team, 1234);
        assert_eq!(config.station.robot_address.as_deref(), Some("10.12.34.2"));
        assert_eq!(config.network.fms_output_port, 1160);
        assert_eq!(config.network.socket_count, 8);
        assert_eq!(config.network.static_addresses.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut config = Config::default();
        config.station.team = 10000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.socket_count = 129;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.station.tick_interval_ms = 500;
        assert!(config.validate().is_err());
    }
}
