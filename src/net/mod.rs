//! Network endpoints: robot discovery and the socket pool

pub mod addresses;
pub mod sockets;

pub use sockets::{DISABLED_PORT, RxEvent, SocketPool};
