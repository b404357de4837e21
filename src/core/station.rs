//! Driver station engine
//!
//! [`DriverStation`] owns all protocol state and every collaborator: the
//! socket pool, the packet builder and the version probe channel. It is
//! driven by a caller-supplied periodic tick (canonically every 20 ms);
//! each tick drains pending network events, then assembles and sends the
//! next control packet.
//!
//! # Threading
//!
//! All state mutation happens on the caller's thread. Background threads
//! (the socket poller, version probe fetchers) only feed crossbeam
//! channels that are drained here, so observers see events in a single
//! serialized order: per inbound packet, voltage first, then the code and
//! control mode edges.
//!
//! # Connection lifecycle
//!
//! ```text
//! ┌──────────────┐  first parsed telemetry packet   ┌───────────┐
//! │ Disconnected │ ────────────────────────────────▶│ Connected │
//! │              │◀──────────────────────────────── │           │
//! └──────────────┘            reset()               └───────────┘
//! ```
//!
//! The rising edge fires the version probe once per episode. `reset()`
//! clears the observations, restarts the ping sequence and forgets the
//! adopted robot address.

use crate::config::Config;
use crate::core::types::{
    Alliance, ControlMode, Event, EventReceiver, EventSender, Joystick, RobotRequest,
};
use crate::error::Result;
use crate::net::addresses;
use crate::net::sockets::{RxEvent, SocketPool};
use crate::protocol::{self, ClientPacketBuilder, parse_robot_packet};
use crate::versions::{self, VersionKind, VersionReport};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::net::Ipv4Addr;

pub struct DriverStation {
    team: u16,
    control_mode: ControlMode,
    alliance: Alliance,
    request: RobotRequest,
    joysticks: Vec<Joystick>,
    builder: ClientPacketBuilder,

    connected: bool,
    voltage: f64,
    code_present: bool,
    last_control_echo: u8,
    lib_version: String,
    pcm_version: String,
    pdp_version: String,

    explicit_robot_addr: Option<String>,
    explicit_radio_addr: Option<String>,

    /// Connection episode counter; version reports from earlier episodes
    /// are discarded
    episode: u64,

    pool: SocketPool,
    rx: Receiver<RxEvent>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    version_tx: Sender<VersionReport>,
    version_rx: Receiver<VersionReport>,
}

impl DriverStation {
    /// Build a station probing the addresses generated from the host's
    /// network interfaces (plus the configured static addresses)
    pub fn new(config: &Config) -> Result<Self> {
        let list = addresses::generate(&config.network.static_addresses);
        Self::with_addresses(config, list)
    }

    /// Build a station probing exactly `list`, skipping interface
    /// enumeration
    pub fn with_addresses(config: &Config, list: Vec<Ipv4Addr>) -> Result<Self> {
        config.validate()?;

        let (mut pool, rx) = SocketPool::new(&config.network)?;
        pool.set_address_list(list)?;

        let (events_tx, events_rx) = unbounded();
        let (version_tx, version_rx) = unbounded();

        let mut station = Self {
            team: 0,
            control_mode: ControlMode::Disabled,
            alliance: Alliance::Red1,
            request: RobotRequest::Normal,
            joysticks: Vec::new(),
            builder: ClientPacketBuilder::new(),
            connected: false,
            voltage: 0.0,
            code_present: false,
            last_control_echo: protocol::MODE_DISABLED,
            lib_version: String::new(),
            pcm_version: String::new(),
            pdp_version: String::new(),
            explicit_robot_addr: None,
            explicit_radio_addr: None,
            episode: 0,
            pool,
            rx,
            events_tx,
            events_rx,
            version_tx,
            version_rx,
        };

        station.set_team(config.station.team);
        station.set_robot_address(config.station.robot_address.clone());
        station.set_radio_address(config.station.radio_address.clone());

        Ok(station)
    }

    // Identity and addressing

    pub fn team(&self) -> u16 {
        self.team
    }

    pub fn set_team(&mut self, team: u16) {
        self.team = team;
        log::info!("Team number set to {}", team);

        // The derived radio address tracks the team unless overridden
        if self.explicit_radio_addr.is_none() {
            self.pool.set_radio_address(Some(self.radio_address()));
        }
    }

    /// Robot address: the explicit override, or the mDNS hostname derived
    /// from the team number
    pub fn robot_address(&self) -> String {
        self.explicit_robot_addr
            .clone()
            .unwrap_or_else(|| format!("roboRIO-{}.local", self.team))
    }

    /// Radio address: the explicit override, or `10.TE.AM.1`
    pub fn radio_address(&self) -> String {
        self.explicit_radio_addr
            .clone()
            .unwrap_or_else(|| derived_radio_address(self.team))
    }

    /// Pin the robot address, or return to LAN discovery with `None` /
    /// an empty string
    pub fn set_robot_address(&mut self, addr: Option<String>) {
        self.explicit_robot_addr = addr.filter(|a| !a.is_empty());
        self.pool.set_robot_address(self.explicit_robot_addr.clone());
    }

    pub fn set_radio_address(&mut self, addr: Option<String>) {
        self.explicit_radio_addr = addr.filter(|a| !a.is_empty());
        self.pool.set_radio_address(Some(self.radio_address()));
    }

    /// Pin the FMS address. Without one, FMS datagrams go to the local
    /// broadcast address.
    pub fn set_fms_address(&mut self, addr: Option<String>) {
        self.pool.set_fms_address(addr.filter(|a| !a.is_empty()));
    }

    // Control commands

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        if self.control_mode != mode {
            log::info!("Control mode set to {:?}", mode);
            self.control_mode = mode;
        }
    }

    /// Set the control mode from a raw wire code (e.g. forwarded from the
    /// FMS). Unrecognized codes fall back to Disabled.
    pub fn set_control_code(&mut self, code: u8) {
        self.set_control_mode(ControlMode::from_code_lenient(code));
    }

    pub fn set_alliance(&mut self, alliance: Alliance) {
        self.alliance = alliance;
    }

    /// Set the alliance station from a raw wire code. Unrecognized codes
    /// fall back to Red1.
    pub fn set_alliance_code(&mut self, code: u8) {
        self.set_alliance(Alliance::from_code_lenient(code));
    }

    /// Request a robot controller reboot. Latched into every following
    /// packet until [`reset`](Self::reset).
    pub fn reboot(&mut self) {
        log::info!("Reboot requested");
        self.request = RobotRequest::RebootRobot;
    }

    /// Request a restart of the robot-side user code. Latched like
    /// [`reboot`](Self::reboot).
    pub fn restart_code(&mut self) {
        log::info!("Code restart requested");
        self.request = RobotRequest::RestartCode;
    }

    // Joysticks

    /// Append one joystick snapshot to the transmitted set
    pub fn attach_joystick(&mut self, joystick: Joystick) {
        self.joysticks.push(joystick);
    }

    /// Replace the whole transmitted joystick set
    pub fn set_joysticks(&mut self, joysticks: Vec<Joystick>) {
        self.joysticks = joysticks;
    }

    pub fn clear_joysticks(&mut self) {
        self.joysticks.clear();
    }

    // Observables

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn code_present(&self) -> bool {
        self.code_present
    }

    /// Control mode last echoed by the robot, `None` while the echo byte
    /// has not mapped to a known mode
    pub fn echoed_control_mode(&self) -> Option<ControlMode> {
        ControlMode::from_code(self.last_control_echo)
    }

    /// On-robot library version, empty until probed
    pub fn lib_version(&self) -> &str {
        &self.lib_version
    }

    /// Pneumatics Control module firmware version, empty until probed
    pub fn pcm_version(&self) -> &str {
        &self.pcm_version
    }

    /// Power Distribution module firmware version, empty until probed
    pub fn pdp_version(&self) -> &str {
        &self.pdp_version
    }

    /// Channel carrying observable state changes, in delivery order
    pub fn events(&self) -> EventReceiver {
        self.events_rx.clone()
    }

    /// Read access to the socket pool (probe cursor, adopted address)
    pub fn sockets(&self) -> &SocketPool {
        &self.pool
    }

    // Engine

    /// One control cycle: drain pending network events, then send the
    /// next client packet
    pub fn tick(&mut self) {
        self.process_events();
        let packet = self.assemble_packet();
        self.pool.send_to_robot(&packet);
    }

    /// Forward a raw packet to the FMS
    pub fn send_to_fms(&mut self, data: &[u8]) {
        self.pool.send_to_fms(data);
    }

    /// Forward a raw packet to the robot radio
    pub fn send_to_radio(&mut self, data: &[u8]) {
        self.pool.send_to_radio(data);
    }

    /// Drop all robot state and return to Disconnected.
    ///
    /// Clears the observations, the request latch and the ping sequence,
    /// sets the control mode to Disabled and forgets the adopted robot
    /// address. Version probe results still in flight are discarded.
    pub fn reset(&mut self) {
        log::info!("Station reset");
        self.episode += 1;
        self.connected = false;
        self.voltage = 0.0;
        self.code_present = false;
        self.last_control_echo = protocol::MODE_DISABLED;
        self.lib_version.clear();
        self.pcm_version.clear();
        self.pdp_version.clear();
        self.request = RobotRequest::Normal;
        self.control_mode = ControlMode::Disabled;
        self.builder.reset();
        self.pool.reset();

        // An explicit override survives the reset
        self.pool.set_robot_address(self.explicit_robot_addr.clone());
    }

    /// Drain inbound network traffic and completed version fetches.
    ///
    /// Called from [`tick`](Self::tick); callers wanting lower event
    /// latency may also call it between ticks.
    pub fn process_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                RxEvent::Robot(_, data) => self.handle_robot_packet(&data),
                RxEvent::Fms(data) => {
                    let _ = self.events_tx.send(Event::FmsPacket(data));
                }
                RxEvent::Radio(data) => {
                    let _ = self.events_tx.send(Event::RadioPacket(data));
                }
            }
        }

        while let Ok(report) = self.version_rx.try_recv() {
            if report.episode != self.episode {
                log::debug!("Discarding stale version report from episode {}", report.episode);
                continue;
            }
            let event = match report.kind {
                VersionKind::Lib => {
                    self.lib_version = report.version.clone();
                    Event::LibVersionChanged(report.version)
                }
                VersionKind::Pcm => {
                    self.pcm_version = report.version.clone();
                    Event::PcmVersionChanged(report.version)
                }
                VersionKind::Pdp => {
                    self.pdp_version = report.version.clone();
                    Event::PdpVersionChanged(report.version)
                }
            };
            let _ = self.events_tx.send(event);
        }
    }

    fn assemble_packet(&mut self) -> Vec<u8> {
        self.builder
            .assemble(self.control_mode, self.request, self.alliance, &self.joysticks)
    }

    fn handle_robot_packet(&mut self, data: &[u8]) {
        let Some(telemetry) = parse_robot_packet(data) else {
            return;
        };

        self.voltage = telemetry.voltage;
        let _ = self.events_tx.send(Event::VoltageChanged(telemetry.voltage));

        if telemetry.code_present != self.code_present {
            self.code_present = telemetry.code_present;
            let _ = self.events_tx.send(Event::CodeChanged(telemetry.code_present));
        }

        if telemetry.control_echo != self.last_control_echo {
            self.last_control_echo = telemetry.control_echo;
            // Unrecognized echo values are dropped without notification
            if let Some(mode) = ControlMode::from_code(telemetry.control_echo) {
                let _ = self.events_tx.send(Event::ControlModeChanged(mode));
            }
        }

        if !self.connected {
            self.connected = true;
            let host = self
                .pool
                .robot_address()
                .unwrap_or_else(|| self.robot_address());
            log::info!("Robot connected at {}, requesting version information", host);
            versions::spawn_probe(host, self.episode, self.version_tx.clone());
        }
    }
}

/// Radio default `10.TE.AM.1`, TE/AM being the team number split into
/// high and low halves (team 1234 gives 10.12.34.1)
fn derived_radio_address(team: u16) -> String {
    format!("10.{}.{}.1", team / 100, team % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::net::DISABLED_PORT;

    /// Config with receive directions disabled so tests never contend
    /// for real ports
    fn test_config(team: u16) -> Config {
        let mut config = Config::default();
        config.station.team = team;
        config.network.robot_input_port = DISABLED_PORT;
        config.network.socket_count = 2;
        config
    }

    fn test_station(team: u16) -> DriverStation {
        DriverStation::with_addresses(&test_config(team), vec![Ipv4Addr::LOCALHOST; 7]).unwrap()
    }

    fn telemetry_packet(voltage_major: u8, voltage_minor: u8, status: u8, echo: u8) -> Vec<u8> {
        let mut data = vec![0u8; 8];
        data[protocol::OFFSET_CONTROL_ECHO] = echo;
        data[protocol::OFFSET_ROBOT_STATUS] = status;
        data[protocol::OFFSET_VOLTAGE_MAJOR] = voltage_major;
        data[protocol::OFFSET_VOLTAGE_MINOR] = voltage_minor;
        data
    }

    #[test]
    fn test_default_address_derivation() {
        let station = test_station(1234);
        assert_eq!(station.robot_address(), "roboRIO-1234.local");
        assert_eq!(station.radio_address(), "10.12.34.1");
    }

    #[test]
    fn test_explicit_addresses_override_defaults() {
        let mut station = test_station(1234);
        station.set_robot_address(Some("10.12.34.2".to_string()));
        station.set_radio_address(Some("192.168.0.1".to_string()));
        assert_eq!(station.robot_address(), "10.12.34.2");
        assert_eq!(station.radio_address(), "192.168.0.1");

        // Empty string returns to the derived defaults
        station.set_robot_address(Some(String::new()));
        station.set_radio_address(None);
        assert_eq!(station.robot_address(), "roboRIO-1234.local");
        assert_eq!(station.radio_address(), "10.12.34.1");
    }

    #[test]
    fn test_cold_start_probe_cursor() {
        let mut station = test_station(1234);
        assert_eq!(station.sockets().cursor(), 0);

        station.tick();
        assert_eq!(station.sockets().cursor(), 2);
        station.tick();
        assert_eq!(station.sockets().cursor(), 4);
        station.tick();
        assert_eq!(station.sockets().cursor(), 6);
    }

    #[test]
    fn test_reboot_request_latches() {
        let mut station = test_station(1234);
        station.reboot();

        let packet = station.assemble_packet();
        assert_eq!(packet[4], protocol::REQUEST_REBOOT);

        // Level-triggered: every packet carries the request until reset
        let packet = station.assemble_packet();
        assert_eq!(packet[4], protocol::REQUEST_REBOOT);

        station.reset();
        let packet = station.assemble_packet();
        assert_eq!(packet[4], protocol::REQUEST_NORMAL);
    }

    #[test]
    fn test_invalid_control_code_substitutes_disabled() {
        let mut station = test_station(1234);
        station.set_control_mode(ControlMode::Autonomous);
        station.set_control_code(0x7F);

        assert_eq!(station.control_mode(), ControlMode::Disabled);
        let packet = station.assemble_packet();
        assert_eq!(packet[3], protocol::MODE_DISABLED);
    }

    #[test]
    fn test_telemetry_events() {
        let mut station = test_station(1234);
        let events = station.events();

        station.handle_robot_packet(&telemetry_packet(12, 34, 0x30, 0x04));

        let Ok(Event::VoltageChanged(voltage)) = events.try_recv() else {
            panic!("expected voltage event first");
        };
        assert!((voltage - 12.34).abs() < 1e-9);
        assert_eq!(events.try_recv(), Ok(Event::CodeChanged(true)));
        assert_eq!(
            events.try_recv(),
            Ok(Event::ControlModeChanged(ControlMode::TeleOperated))
        );
        assert!(events.try_recv().is_err());
        assert!(station.connected());
        assert!((station.voltage() - 12.34).abs() < 1e-9);
    }

    #[test]
    fn test_edges_fire_once() {
        let mut station = test_station(1234);
        let events = station.events();

        station.handle_robot_packet(&telemetry_packet(12, 0, 0x30, 0x04));
        station.handle_robot_packet(&telemetry_packet(12, 50, 0x30, 0x04));

        // Voltage every packet, code and mode edges only once
        let collected: Vec<Event> = events.try_iter().collect();
        assert_eq!(
            collected,
            vec![
                Event::VoltageChanged(12.0),
                Event::CodeChanged(true),
                Event::ControlModeChanged(ControlMode::TeleOperated),
                Event::VoltageChanged(12.5),
            ]
        );
    }

    #[test]
    fn test_short_packet_ignored() {
        let mut station = test_station(1234);
        let events = station.events();

        station.handle_robot_packet(&[0u8; 7]);
        assert!(events.try_recv().is_err());
        assert!(!station.connected());
    }

    #[test]
    fn test_reset_restarts_ping_and_state() {
        let mut station = test_station(1234);
        station.handle_robot_packet(&telemetry_packet(12, 34, 0x30, 0x04));
        let _ = station.assemble_packet();
        let _ = station.assemble_packet();

        station.reset();

        assert!(!station.connected());
        assert_eq!(station.voltage(), 0.0);
        assert!(!station.code_present());
        assert_eq!(station.control_mode(), ControlMode::Disabled);

        let packet = station.assemble_packet();
        assert_eq!(&packet[0..2], &[0x00, 0x01]);
    }

    #[test]
    fn test_stale_version_reports_dropped() {
        let mut station = test_station(1234);
        let events = station.events();

        // Report from the previous episode arrives after a reset
        station.reset();
        station
            .version_tx
            .send(VersionReport {
                episode: 0,
                kind: VersionKind::Pcm,
                version: "1.23".to_string(),
            })
            .unwrap();
        station.process_events();
        assert!(events.try_recv().is_err());
        assert_eq!(station.pcm_version(), "");

        // Current-episode report is delivered
        station
            .version_tx
            .send(VersionReport {
                episode: 1,
                kind: VersionKind::Pcm,
                version: "1.23".to_string(),
            })
            .unwrap();
        station.process_events();
        assert_eq!(
            events.try_recv(),
            Ok(Event::PcmVersionChanged("1.23".to_string()))
        );
        assert_eq!(station.pcm_version(), "1.23");
    }

    #[test]
    fn test_fms_address_override() {
        use std::net::UdpSocket;
        use std::time::Duration;

        let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut config = test_config(1234);
        config.network.fms_output_port = port;
        let mut station =
            DriverStation::with_addresses(&config, vec![Ipv4Addr::LOCALHOST]).unwrap();

        // With the override set, the datagram unicasts to the listener
        // instead of going to the broadcast default
        station.set_fms_address(Some("127.0.0.1".to_string()));
        station.send_to_fms(&[0x01, 0x02, 0x03]);

        let mut buf = [0u8; 16];
        let (n, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_teleop_packet_carries_joysticks() {
        let mut station = test_station(1234);
        station.set_control_mode(ControlMode::TeleOperated);
        station.attach_joystick(Joystick {
            axes: vec![0.5, -0.5],
            buttons: vec![true, false, true],
            hats: vec![],
        });

        let packet = station.assemble_packet();
        assert_eq!(
            &packet[6..],
            &[0x08, protocol::JOYSTICK_HEADER, 0x02, 0x3F, 0xC0, 0x03, 0x05, 0x00]
        );
    }
}
