//! Error types for the driver station core
//!
//! The packet paths (tick, inbound telemetry, version probe) never surface
//! errors to callers: malformed input is dropped, failed sends are logged.
//! `Error` is returned only from construction and reconfiguration seams,
//! where the caller can actually do something about it (fix the config,
//! free the port, restart).

use thiserror::Error;

/// Errors that can occur while setting up or reconfiguring the station
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
