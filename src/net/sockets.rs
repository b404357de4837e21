//! Socket pool: named endpoints and the parallel robot probe
//!
//! The pool owns every socket the station talks through:
//!
//! | Endpoint | Direction | Count |
//! |----------|-----------|-------|
//! | FMS sender/receiver | bidirectional | 1 pair |
//! | Radio sender/receiver | bidirectional | 1 pair |
//! | Robot unicast sender | outbound | 1 |
//! | Probe sender/receiver pairs | bidirectional | `socket_count()` |
//!
//! # Parallel probe
//!
//! While the robot address is unknown, every robot-directed send fans out
//! across the probe senders, each slot targeting one candidate from the
//! address list at `cursor + slot`. After the send the cursor advances by
//! `socket_count()`, wrapping to 0 when another full window no longer
//! fits. The scan rate is therefore the packet cadence times the probe
//! width.
//!
//! # Adoption
//!
//! The first non-empty datagram on any probe receiver while the robot
//! address is empty sets the address to the datagram source. From then on
//! all robot sends unicast and the cursor stops moving, until
//! [`SocketPool::reset`] forgets the adoption.
//!
//! All receivers bind the robot input port with address reuse (and port
//! reuse on Unix) so the probe slots can coexist, with multicast loopback
//! disabled. Inbound data is drained by a poller thread over non-blocking
//! sockets and marshalled to the owning task through a crossbeam channel.
//!
//! # Disabled ports
//!
//! A port value of [`DISABLED_PORT`] turns that direction off; sends
//! towards a disabled port are dropped silently.

use crate::config::NetworkConfig;
use crate::core::types::SocketType;
use crate::error::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sentinel port value disabling a send or receive direction
pub const DISABLED_PORT: u16 = 0;

/// Hard ceiling on parallel probe pairs
const MAX_SOCKET_COUNT: usize = 128;
/// Ceiling for the automatically computed probe width
const AUTO_SOCKET_MAX: usize = 72;

/// Largest datagram the poller will accept (robot packets are ~10 bytes)
const RX_BUFFER_SIZE: usize = 4096;
/// Poller sleep when no socket had data
const RX_IDLE_SLEEP: Duration = Duration::from_millis(1);

const TCP_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Inbound traffic, marshalled from the poller thread to the station
#[derive(Debug, Clone)]
pub enum RxEvent {
    Fms(Vec<u8>),
    Radio(Vec<u8>),
    /// Robot datagram with its source address
    Robot(SocketAddr, Vec<u8>),
}

/// Shared robot address slot: written by adoption on the poller thread,
/// read by every robot-directed send
type RobotAddrRegistry = Arc<Mutex<Option<String>>>;

/// Outbound endpoint for one peer class.
///
/// UDP sends datagrams to an explicit destination per send; TCP holds one
/// connected stream, established lazily (or eagerly for the robot).
enum SenderSocket {
    Udp(UdpSocket),
    Tcp(Option<TcpStream>),
}

impl SenderSocket {
    fn udp() -> Result<Self> {
        Ok(SenderSocket::Udp(udp_sender()?))
    }

    /// UDP sender allowed to target the subnet broadcast address (FMS)
    fn udp_broadcast() -> Result<Self> {
        let sock = udp_sender()?;
        sock.set_broadcast(true)?;
        Ok(SenderSocket::Udp(sock))
    }

    fn new(kind: SocketType) -> Result<Self> {
        match kind {
            SocketType::Udp => Self::udp(),
            SocketType::Tcp => Ok(SenderSocket::Tcp(None)),
        }
    }

    /// Send `data` towards `host:port`, connecting first if this is an
    /// unconnected TCP endpoint. A failed TCP stream is dropped so the
    /// next send reconnects.
    fn send(&mut self, data: &[u8], host: &str, port: u16) -> std::io::Result<()> {
        match self {
            SenderSocket::Udp(sock) => sock.send_to(data, (host, port)).map(|_| ()),
            SenderSocket::Tcp(slot) => {
                if slot.is_none() {
                    *slot = Some(tcp_connect(host, port)?);
                }
                let stream = slot.as_mut().expect("stream just connected");
                match stream.write_all(data) {
                    Ok(()) => Ok(()),
                    // The stream is non-blocking (shared with the poller);
                    // a full send buffer drops this packet, the cadence
                    // delivers the next one shortly
                    Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
                    Err(e) => {
                        *slot = None;
                        Err(e)
                    }
                }
            }
        }
    }
}

/// Receive-side sockets, shared with the poller thread
#[derive(Default)]
struct RxSockets {
    fms_udp: Option<UdpSocket>,
    radio_udp: Option<UdpSocket>,
    robot_udp: Vec<UdpSocket>,
    fms_tcp: Option<TcpStream>,
    radio_tcp: Option<TcpStream>,
    robot_tcp: Option<TcpStream>,
}

/// Owns every communication endpoint and the probe scan state
pub struct SocketPool {
    fms_input: u16,
    fms_output: u16,
    radio_input: u16,
    radio_output: u16,
    robot_input: u16,
    robot_output: u16,

    fms_type: SocketType,
    radio_type: SocketType,
    robot_type: SocketType,

    custom_socket_count: usize,
    addresses: Vec<Ipv4Addr>,
    cursor: usize,

    fms_addr: Option<String>,
    radio_addr: Option<String>,
    robot_addr: RobotAddrRegistry,

    fms_sender: SenderSocket,
    radio_sender: SenderSocket,
    robot_sender: SenderSocket,
    probe_senders: Vec<UdpSocket>,

    rx_sockets: Arc<Mutex<RxSockets>>,
    shutdown: Arc<AtomicBool>,
    poller_handle: Option<JoinHandle<()>>,
}

impl SocketPool {
    /// Create the pool and bind the endpoints named by `config`.
    ///
    /// Returns the pool and the channel carrying inbound traffic. The
    /// address list starts empty; call [`set_address_list`](Self::set_address_list)
    /// to start probing.
    pub fn new(config: &NetworkConfig) -> Result<(Self, Receiver<RxEvent>)> {
        let (tx, rx) = unbounded();

        let mut pool = Self {
            fms_input: DISABLED_PORT,
            fms_output: config.fms_output_port,
            radio_input: DISABLED_PORT,
            radio_output: config.radio_output_port,
            robot_input: DISABLED_PORT,
            robot_output: config.robot_output_port,
            fms_type: SocketType::Udp,
            radio_type: SocketType::Udp,
            robot_type: SocketType::Udp,
            custom_socket_count: config.socket_count.min(MAX_SOCKET_COUNT),
            addresses: Vec::new(),
            cursor: 0,
            fms_addr: None,
            radio_addr: None,
            robot_addr: Arc::new(Mutex::new(None)),
            fms_sender: SenderSocket::udp_broadcast()?,
            radio_sender: SenderSocket::udp()?,
            robot_sender: SenderSocket::udp()?,
            probe_senders: Vec::new(),
            rx_sockets: Arc::new(Mutex::new(RxSockets::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
            poller_handle: None,
        };

        pool.set_fms_socket_type(config.fms_socket_type)?;
        pool.set_radio_socket_type(config.radio_socket_type)?;
        pool.set_robot_socket_type(config.robot_socket_type)?;
        pool.set_fms_input_port(config.fms_input_port)?;
        pool.set_radio_input_port(config.radio_input_port)?;
        pool.set_robot_input_port(config.robot_input_port)?;

        let handle = thread::Builder::new()
            .name("socket-rx".to_string())
            .spawn({
                let sockets = Arc::clone(&pool.rx_sockets);
                let robot_addr = Arc::clone(&pool.robot_addr);
                let shutdown = Arc::clone(&pool.shutdown);
                move || rx_loop(sockets, robot_addr, tx, shutdown)
            })
            .map_err(|e| crate::error::Error::Other(format!("Failed to spawn poller: {}", e)))?;
        pool.poller_handle = Some(handle);

        log::info!("Socket pool initialized");
        Ok((pool, rx))
    }

    /// Number of parallel probe socket pairs.
    ///
    /// A custom count takes precedence; otherwise the width is sized from
    /// the address list (one pair per six candidates, between 1 and 72).
    /// Either way the result never exceeds 128.
    pub fn socket_count(&self) -> usize {
        let count = if self.custom_socket_count > 0 {
            self.custom_socket_count
        } else {
            (self.addresses.len() / 6).clamp(1, AUTO_SOCKET_MAX)
        };
        count.min(MAX_SOCKET_COUNT)
    }

    /// Current probe cursor into the address list
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Candidate addresses being probed
    pub fn address_list(&self) -> &[Ipv4Addr] {
        &self.addresses
    }

    /// Robot address, if adopted or explicitly set
    pub fn robot_address(&self) -> Option<String> {
        self.robot_addr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the candidate list and rebuild the probe pool
    pub fn set_address_list(&mut self, list: Vec<Ipv4Addr>) -> Result<()> {
        log::info!("Probing {} candidate robot addresses", list.len());
        self.addresses = list;
        self.rebuild_probe_slots()
    }

    /// Set the parallel probe width (0 = size from the address list)
    pub fn set_custom_socket_count(&mut self, count: usize) -> Result<()> {
        let count = count.min(MAX_SOCKET_COUNT);
        if self.custom_socket_count != count {
            self.custom_socket_count = count;
            log::debug!("Probe socket count set to {}", count);
            self.rebuild_probe_slots()?;
        }
        Ok(())
    }

    /// Pin or clear the robot address. `None` returns to probing.
    pub fn set_robot_address(&mut self, addr: Option<String>) {
        {
            let mut slot = self.robot_addr.lock().unwrap_or_else(|e| e.into_inner());
            if *slot == addr {
                return;
            }
            slot.clone_from(&addr);
        }

        match &addr {
            Some(ip) => log::info!("Robot address set to {}", ip),
            None => log::info!("Robot address cleared, resuming probe"),
        }

        if self.robot_type == SocketType::Tcp {
            self.connect_robot_tcp();
        }
    }

    pub fn set_radio_address(&mut self, addr: Option<String>) {
        if self.radio_addr != addr {
            if let Some(ip) = &addr {
                log::info!("Radio address set to {}", ip);
            }
            self.radio_addr = addr;
        }
    }

    pub fn set_fms_address(&mut self, addr: Option<String>) {
        self.fms_addr = addr;
    }

    /// Forget the adopted robot address and restart the scan
    pub fn reset(&mut self) {
        self.cursor = 0;
        {
            let mut slot = self.robot_addr.lock().unwrap_or_else(|e| e.into_inner());
            *slot = None;
        }
        if let SenderSocket::Tcp(slot) = &mut self.robot_sender {
            *slot = None;
        }
        let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
        rx.robot_tcp = None;
    }

    // Port configuration

    pub fn set_fms_input_port(&mut self, port: u16) -> Result<()> {
        if self.fms_input != port {
            self.fms_input = port;
            log::debug!("FMS input port set to {}", port);
            let sock = self.bind_receiver(self.fms_type, port)?;
            let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
            rx.fms_udp = sock;
        }
        Ok(())
    }

    pub fn set_radio_input_port(&mut self, port: u16) -> Result<()> {
        if self.radio_input != port {
            self.radio_input = port;
            log::debug!("Radio input port set to {}", port);
            let sock = self.bind_receiver(self.radio_type, port)?;
            let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
            rx.radio_udp = sock;
        }
        Ok(())
    }

    pub fn set_robot_input_port(&mut self, port: u16) -> Result<()> {
        if self.robot_input != port {
            self.robot_input = port;
            log::debug!("Robot input port set to {}", port);
            self.rebuild_probe_slots()?;
        }
        Ok(())
    }

    pub fn set_fms_output_port(&mut self, port: u16) {
        if self.fms_output != port {
            self.fms_output = port;
            log::debug!("FMS output port set to {}", port);
        }
    }

    pub fn set_radio_output_port(&mut self, port: u16) {
        if self.radio_output != port {
            self.radio_output = port;
            log::debug!("Radio output port set to {}", port);
        }
    }

    pub fn set_robot_output_port(&mut self, port: u16) {
        if self.robot_output != port {
            self.robot_output = port;
            log::debug!("Robot output port set to {}", port);
            if self.robot_type == SocketType::Tcp {
                self.connect_robot_tcp();
            }
        }
    }

    // Socket type configuration

    /// Change the FMS transport, recreating both endpoints
    pub fn set_fms_socket_type(&mut self, kind: SocketType) -> Result<()> {
        if self.fms_type != kind {
            self.fms_type = kind;
            log::debug!("FMS socket type set to {:?}", kind);
            self.fms_sender = match kind {
                SocketType::Udp => SenderSocket::udp_broadcast()?,
                SocketType::Tcp => SenderSocket::Tcp(None),
            };
            let sock = self.bind_receiver(kind, self.fms_input)?;
            let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
            rx.fms_udp = sock;
            rx.fms_tcp = None;
        }
        Ok(())
    }

    /// Change the radio transport, recreating both endpoints
    pub fn set_radio_socket_type(&mut self, kind: SocketType) -> Result<()> {
        if self.radio_type != kind {
            self.radio_type = kind;
            log::debug!("Radio socket type set to {:?}", kind);
            self.radio_sender = SenderSocket::new(kind)?;
            let sock = self.bind_receiver(kind, self.radio_input)?;
            let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
            rx.radio_udp = sock;
            rx.radio_tcp = None;
        }
        Ok(())
    }

    /// Change the robot transport.
    ///
    /// TCP disables probe fan-out (there is one connected stream, not
    /// many) and connects to the known robot address immediately.
    pub fn set_robot_socket_type(&mut self, kind: SocketType) -> Result<()> {
        if self.robot_type != kind {
            self.robot_type = kind;
            log::debug!("Robot socket type set to {:?}", kind);
            self.robot_sender = SenderSocket::new(kind)?;
            self.rebuild_probe_slots()?;
            if kind == SocketType::Tcp {
                self.connect_robot_tcp();
            }
        }
        Ok(())
    }

    // Send operations

    /// Send a datagram to the FMS. Dropped silently when the FMS output
    /// port is disabled.
    pub fn send_to_fms(&mut self, data: &[u8]) {
        if self.fms_output == DISABLED_PORT {
            return;
        }
        // Without a configured FMS address the datagram goes to the local
        // broadcast address, matching how the field network is laid out
        let dest = self
            .fms_addr
            .clone()
            .unwrap_or_else(|| "255.255.255.255".to_string());
        let port = self.fms_output;
        if let Err(e) = self.fms_sender.send(data, &dest, port) {
            log::warn!("FMS send failed: {}", e);
        } else {
            self.track_tcp_stream(Peer::Fms);
        }
    }

    /// Send a datagram to the robot radio. Dropped silently when the
    /// radio output port is disabled or no radio address is known.
    pub fn send_to_radio(&mut self, data: &[u8]) {
        if self.radio_output == DISABLED_PORT {
            return;
        }
        let Some(dest) = self.radio_addr.clone() else {
            return;
        };
        let port = self.radio_output;
        if let Err(e) = self.radio_sender.send(data, &dest, port) {
            log::warn!("Radio send failed: {}", e);
        } else {
            self.track_tcp_stream(Peer::Radio);
        }
    }

    /// Send a control packet to the robot.
    ///
    /// Unicasts when the robot address is known; otherwise fans the
    /// packet out across the probe window and advances the cursor.
    pub fn send_to_robot(&mut self, data: &[u8]) {
        if self.robot_output == DISABLED_PORT {
            return;
        }

        if let Some(dest) = self.robot_address() {
            let port = self.robot_output;
            if let Err(e) = self.robot_sender.send(data, &dest, port) {
                log::warn!("Robot send failed: {}", e);
            } else {
                self.track_tcp_stream(Peer::Robot);
            }
            return;
        }

        if self.robot_type != SocketType::Udp {
            return;
        }

        for i in 0..self.socket_count() {
            let Some(&ip) = self.addresses.get(self.cursor + i) else {
                break;
            };
            let Some(sender) = self.probe_senders.get(i) else {
                break;
            };
            if let Err(e) = sender.send_to(data, (ip, self.robot_output)) {
                // Most candidates are unreachable hosts; this is routine
                log::trace!("Probe send to {} failed: {}", ip, e);
            }
        }

        self.rotate();
    }

    /// Advance the probe window after a fan-out send
    fn rotate(&mut self) {
        self.cursor = advance_cursor(self.cursor, self.socket_count(), self.addresses.len());
    }

    /// Recreate the probe senders and receivers.
    ///
    /// Called whenever the address list, probe width, robot input port or
    /// robot transport changes. Replacement is atomic with respect to the
    /// poller: the receiver set swaps under the shared lock.
    fn rebuild_probe_slots(&mut self) -> Result<()> {
        self.cursor = 0;
        self.probe_senders.clear();
        let mut receivers = Vec::new();

        if self.robot_type == SocketType::Udp {
            for _ in 0..self.socket_count() {
                self.probe_senders.push(udp_sender()?);
                if self.robot_input != DISABLED_PORT {
                    receivers.push(bind_reuse(self.robot_input)?);
                }
            }
        }

        let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
        rx.robot_udp = receivers;
        Ok(())
    }

    /// Bind a UDP receiver for one peer class, `None` when the port is
    /// disabled or the class runs over TCP (TCP receive shares the
    /// sender's connected stream)
    fn bind_receiver(&self, kind: SocketType, port: u16) -> Result<Option<UdpSocket>> {
        if kind != SocketType::Udp || port == DISABLED_PORT {
            return Ok(None);
        }
        Ok(Some(bind_reuse(port)?))
    }

    /// Establish the robot TCP stream to the known address, if any
    fn connect_robot_tcp(&mut self) {
        let Some(addr) = self.robot_address() else {
            return;
        };
        if self.robot_output == DISABLED_PORT {
            return;
        }
        match tcp_connect(&addr, self.robot_output) {
            Ok(stream) => {
                self.robot_sender = SenderSocket::Tcp(Some(stream));
                self.track_tcp_stream(Peer::Robot);
            }
            Err(e) => {
                log::warn!("Robot TCP connect to {} failed: {}", addr, e);
                self.robot_sender = SenderSocket::Tcp(None);
            }
        }
    }

    /// Share a freshly connected TCP stream with the poller so inbound
    /// data on it is delivered like any other receive event
    fn track_tcp_stream(&mut self, peer: Peer) {
        let sender = match peer {
            Peer::Fms => &self.fms_sender,
            Peer::Radio => &self.radio_sender,
            Peer::Robot => &self.robot_sender,
        };
        let SenderSocket::Tcp(Some(stream)) = sender else {
            return;
        };

        let mut rx = self.rx_sockets.lock().unwrap_or_else(|e| e.into_inner());
        let slot = match peer {
            Peer::Fms => &mut rx.fms_tcp,
            Peer::Radio => &mut rx.radio_tcp,
            Peer::Robot => &mut rx.robot_tcp,
        };
        if slot.is_none() {
            match stream.try_clone() {
                Ok(clone) => {
                    let _ = clone.set_nonblocking(true);
                    *slot = Some(clone);
                }
                Err(e) => log::warn!("Failed to share TCP stream with poller: {}", e),
            }
        }
    }

    /// Stop the poller thread
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.poller_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SocketPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone, Copy)]
enum Peer {
    Fms,
    Radio,
    Robot,
}

/// Cursor advance rule: move one full window forward if another window
/// exists past it, otherwise wrap to the start of the list
fn advance_cursor(cursor: usize, step: usize, len: usize) -> usize {
    if len > cursor + step { cursor + step } else { 0 }
}

fn udp_sender() -> Result<UdpSocket> {
    let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    Ok(sock)
}

/// Bind a non-blocking UDP receiver with address reuse so parallel probe
/// slots (and a restarting client) can share the robot input port
fn bind_reuse(port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_nonblocking(true)?;
    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port);
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

fn tcp_connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(ErrorKind::AddrNotAvailable, format!("cannot resolve {}", host))
    })?;
    let stream = TcpStream::connect_timeout(&addr, TCP_CONNECT_TIMEOUT)?;
    let _ = stream.set_nodelay(true);
    let _ = stream.set_nonblocking(true);
    Ok(stream)
}

/// Record the source of the first robot datagram as the robot address
fn adopt(registry: &RobotAddrRegistry, peer: SocketAddr) {
    let mut slot = registry.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_none() {
        log::info!("Robot found at {}", peer.ip());
        *slot = Some(peer.ip().to_string());
    }
}

/// Poller loop: drain every receive socket, marshal events to the
/// station, sleep briefly when idle.
///
/// Runs on a dedicated thread for the lifetime of the pool. Holding the
/// socket lock only while draining keeps reconfiguration (which swaps
/// sockets under the same lock) atomic with respect to receives.
fn rx_loop(
    sockets: Arc<Mutex<RxSockets>>,
    robot_addr: RobotAddrRegistry,
    events: Sender<RxEvent>,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = [0u8; RX_BUFFER_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        let mut got_any = false;

        {
            let mut s = sockets.lock().unwrap_or_else(|e| e.into_inner());

            if let Some(sock) = &s.fms_udp {
                got_any |= drain_udp(sock, &mut buf, |_, data| {
                    let _ = events.send(RxEvent::Fms(data));
                });
            }

            if let Some(sock) = &s.radio_udp {
                got_any |= drain_udp(sock, &mut buf, |_, data| {
                    let _ = events.send(RxEvent::Radio(data));
                });
            }

            for sock in &s.robot_udp {
                got_any |= drain_udp(sock, &mut buf, |peer, data| {
                    adopt(&robot_addr, peer);
                    let _ = events.send(RxEvent::Robot(peer, data));
                });
            }

            got_any |= drain_tcp(&mut s.fms_tcp, &mut buf, |_, data| {
                let _ = events.send(RxEvent::Fms(data));
            });
            got_any |= drain_tcp(&mut s.radio_tcp, &mut buf, |_, data| {
                let _ = events.send(RxEvent::Radio(data));
            });
            got_any |= drain_tcp(&mut s.robot_tcp, &mut buf, |peer, data| {
                let _ = events.send(RxEvent::Robot(peer, data));
            });
        }

        if !got_any {
            thread::sleep(RX_IDLE_SLEEP);
        }
    }

    log::debug!("Socket poller exiting");
}

/// Drain one non-blocking UDP socket. Empty datagrams are discarded
/// without adoption or delivery.
fn drain_udp(
    sock: &UdpSocket,
    buf: &mut [u8],
    mut deliver: impl FnMut(SocketAddr, Vec<u8>),
) -> bool {
    let mut got_any = false;
    loop {
        match sock.recv_from(buf) {
            Ok((n, peer)) if n > 0 => {
                deliver(peer, buf[..n].to_vec());
                got_any = true;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    got_any
}

/// Drain one non-blocking TCP stream. A closed or failed stream is
/// dropped; the sender side reconnects on its next send.
fn drain_tcp(
    slot: &mut Option<TcpStream>,
    buf: &mut [u8],
    mut deliver: impl FnMut(SocketAddr, Vec<u8>),
) -> bool {
    let Some(stream) = slot else {
        return false;
    };

    match stream.read(buf) {
        Ok(0) => {
            log::info!("TCP peer disconnected");
            *slot = None;
            false
        }
        Ok(n) => {
            let peer = stream
                .peer_addr()
                .unwrap_or_else(|_| SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0));
            deliver(peer, buf[..n].to_vec());
            true
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => false,
        Err(e) => {
            log::debug!("TCP read failed: {}", e);
            *slot = None;
            false
        }
    }
}
