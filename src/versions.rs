//! Robot firmware version probe
//!
//! The roboRIO exposes three small text files over anonymous FTP. On the
//! first telemetry packet of a connection the station fetches all three
//! and reports the Power Distribution, Pneumatics Control and robot
//! library versions.
//!
//! Fetches run on background threads, one per file, and never block the
//! packet cadence. Results carry the episode number they were started
//! under so reports that land after a reset are discarded by the station.
//! Any failed fetch is dropped silently and the version stays empty; the
//! probe is not retried within an episode.

use crossbeam_channel::Sender;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Version file of the on-robot library (whole body is the version)
pub const LIB_VERSION_FILE: &str = "/tmp/frc_versions/FRC_Lib_Version.ini";
/// Version file of the Pneumatics Control module
pub const PCM_VERSION_FILE: &str = "/tmp/frc_versions/PCM-0-versions.ini";
/// Version file of the Power Distribution module
pub const PDP_VERSION_FILE: &str = "/tmp/frc_versions/PDP-0-versions.ini";

/// Key preceding the four-character version field in the PCM/PDP files
const VERSION_KEY: &str = "currentVersion";

const FTP_PORT: u16 = 21;
const FTP_TIMEOUT: Duration = Duration::from_secs(2);

/// Which component a version string belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Lib,
    Pcm,
    Pdp,
}

/// One completed fetch, tagged with the connection episode it belongs to
#[derive(Debug, Clone)]
pub struct VersionReport {
    pub episode: u64,
    pub kind: VersionKind,
    pub version: String,
}

/// Fetch the three version files from `host`, delivering results on `tx`.
///
/// Returns immediately; each file is fetched on its own thread.
pub fn spawn_probe(host: String, episode: u64, tx: Sender<VersionReport>) {
    let files = [
        (VersionKind::Lib, LIB_VERSION_FILE),
        (VersionKind::Pcm, PCM_VERSION_FILE),
        (VersionKind::Pdp, PDP_VERSION_FILE),
    ];

    for (kind, path) in files {
        let host = host.clone();
        let tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("version-probe".to_string())
            .spawn(move || {
                let Some(body) = fetch_file(&host, path) else {
                    log::debug!("Version fetch of {} from {} failed", path, host);
                    return;
                };

                let version = match kind {
                    VersionKind::Lib => Some(body.trim_end().to_string()),
                    VersionKind::Pcm | VersionKind::Pdp => parse_current_version(&body),
                };

                if let Some(version) = version {
                    let _ = tx.send(VersionReport {
                        episode,
                        kind,
                        version,
                    });
                }
            });

        if let Err(e) = spawned {
            log::warn!("Failed to spawn version probe thread: {}", e);
        }
    }
}

/// Extract the four characters following `currentVersion` plus its
/// delimiter, e.g. `currentVersion=1.23` yields `1.23`
pub fn parse_current_version(body: &str) -> Option<String> {
    let start = body.find(VERSION_KEY)? + VERSION_KEY.len() + 1;
    let version: String = body.get(start..)?.chars().take(4).collect();
    if version.chars().count() == 4 {
        Some(version)
    } else {
        None
    }
}

/// Download one file over anonymous FTP. `None` on any failure.
fn fetch_file(host: &str, path: &str) -> Option<String> {
    match ftp_retrieve(host, path) {
        Ok(body) => Some(body),
        Err(e) => {
            log::debug!("FTP {}{}: {}", host, path, e);
            None
        }
    }
}

fn ftp_retrieve(host: &str, path: &str) -> std::io::Result<String> {
    ftp_retrieve_at(host, FTP_PORT, path)
}

/// Minimal anonymous-FTP RETR: USER/PASS, binary type, passive mode,
/// then read the data connection to EOF.
fn ftp_retrieve_at(host: &str, port: u16, path: &str) -> std::io::Result<String> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io_error(format!("cannot resolve {}", host)))?;

    let control = TcpStream::connect_timeout(&addr, FTP_TIMEOUT)?;
    control.set_read_timeout(Some(FTP_TIMEOUT))?;
    control.set_write_timeout(Some(FTP_TIMEOUT))?;

    let mut reader = BufReader::new(control.try_clone()?);
    let mut control = control;

    expect_reply(&mut reader, 220)?;

    send_command(&mut control, "USER anonymous")?;
    let code = read_reply(&mut reader)?;
    if code == 331 {
        send_command(&mut control, "PASS anonymous")?;
        expect_reply(&mut reader, 230)?;
    } else if code != 230 {
        return Err(io_error(format!("login rejected ({})", code)));
    }

    send_command(&mut control, "TYPE I")?;
    expect_reply(&mut reader, 200)?;

    send_command(&mut control, "PASV")?;
    let reply = read_reply_line(&mut reader)?;
    if !reply.starts_with("227") {
        return Err(io_error(format!("PASV rejected: {}", reply.trim())));
    }
    let data_addr = parse_pasv(&reply).ok_or_else(|| io_error("bad PASV reply".to_string()))?;

    let mut data = TcpStream::connect_timeout(&data_addr.into(), FTP_TIMEOUT)?;
    data.set_read_timeout(Some(FTP_TIMEOUT))?;

    send_command(&mut control, &format!("RETR {}", path))?;
    let code = read_reply(&mut reader)?;
    if code != 150 && code != 125 {
        return Err(io_error(format!("RETR rejected ({})", code)));
    }

    let mut body = String::new();
    data.read_to_string(&mut body)?;
    drop(data);

    // Transfer-complete reply; errors here don't invalidate the body
    let _ = read_reply(&mut reader);
    let _ = send_command(&mut control, "QUIT");

    Ok(body)
}

fn send_command(stream: &mut TcpStream, command: &str) -> std::io::Result<()> {
    stream.write_all(command.as_bytes())?;
    stream.write_all(b"\r\n")
}

/// Read one (possibly multi-line) FTP reply and return its code
fn read_reply(reader: &mut BufReader<TcpStream>) -> std::io::Result<u16> {
    let line = read_reply_line(reader)?;
    line.get(..3)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| io_error(format!("malformed FTP reply: {}", line.trim())))
}

/// Read lines until the final line of a reply (3 digits followed by a
/// space, per RFC 959 multi-line replies) and return it
fn read_reply_line(reader: &mut BufReader<TcpStream>) -> std::io::Result<String> {
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(io_error("control connection closed".to_string()));
        }
        let bytes = line.as_bytes();
        if bytes.len() >= 4 && bytes[..3].iter().all(u8::is_ascii_digit) && bytes[3] == b' ' {
            return Ok(line);
        }
    }
}

fn expect_reply(reader: &mut BufReader<TcpStream>, expected: u16) -> std::io::Result<()> {
    let code = read_reply(reader)?;
    if code != expected {
        return Err(io_error(format!("expected {}, got {}", expected, code)));
    }
    Ok(())
}

/// Parse `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
fn parse_pasv(reply: &str) -> Option<std::net::SocketAddrV4> {
    let open = reply.find('(')?;
    let close = reply[open..].find(')')? + open;
    let mut parts = reply[open + 1..close].split(',');

    let mut octet = || parts.next()?.trim().parse::<u8>().ok();
    let ip = std::net::Ipv4Addr::new(octet()?, octet()?, octet()?, octet()?);
    let port = u16::from(octet()?) << 8 | u16::from(octet()?);
    Some(std::net::SocketAddrV4::new(ip, port))
}

fn io_error(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_current_version() {
        let body = "[header]\ncurrentVersion=1.23\nother=4\n";
        assert_eq!(parse_current_version(body), Some("1.23".to_string()));
    }

    #[test]
    fn test_parse_current_version_space_delimiter() {
        let body = "currentVersion 2.05";
        assert_eq!(parse_current_version(body), Some("2.05".to_string()));
    }

    #[test]
    fn test_parse_missing_or_truncated() {
        assert_eq!(parse_current_version("no key here"), None);
        assert_eq!(parse_current_version("currentVersion=1."), None);
    }

    #[test]
    fn test_parse_pasv() {
        let addr = parse_pasv("227 Entering Passive Mode (10,12,34,2,4,1)\r\n").unwrap();
        assert_eq!(addr.ip(), &std::net::Ipv4Addr::new(10, 12, 34, 2));
        assert_eq!(addr.port(), 4 * 256 + 1);

        assert!(parse_pasv("227 nonsense").is_none());
        assert!(parse_pasv("227 (1,2,3)").is_none());
    }

    /// Single-session FTP server serving one canned file body
    fn mock_ftp_server(body: &'static str) -> u16 {
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            let (control, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(control.try_clone().unwrap());
            let mut control = control;
            let mut line = String::new();

            let mut read_command = |reader: &mut BufReader<TcpStream>, line: &mut String| {
                line.clear();
                reader.read_line(line).unwrap();
            };

            control.write_all(b"220 mock ftp ready\r\n").unwrap();

            read_command(&mut reader, &mut line); // USER
            control.write_all(b"331 need password\r\n").unwrap();
            read_command(&mut reader, &mut line); // PASS
            control.write_all(b"230 logged in\r\n").unwrap();
            read_command(&mut reader, &mut line); // TYPE I
            control.write_all(b"200 ok\r\n").unwrap();

            read_command(&mut reader, &mut line); // PASV
            let data_listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let data_port = data_listener.local_addr().unwrap().port();
            let reply = format!(
                "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                data_port >> 8,
                data_port & 0xFF
            );
            control.write_all(reply.as_bytes()).unwrap();

            read_command(&mut reader, &mut line); // RETR
            assert!(line.starts_with("RETR /tmp/frc_versions/"));
            control.write_all(b"150 opening data connection\r\n").unwrap();

            let (mut data, _) = data_listener.accept().unwrap();
            data.write_all(body.as_bytes()).unwrap();
            drop(data);

            control.write_all(b"226 transfer complete\r\n").unwrap();
        });

        port
    }

    #[test]
    fn test_ftp_retrieve_round_trip() {
        let port = mock_ftp_server("[version]\ncurrentVersion=1.23\n");

        let body = ftp_retrieve_at("127.0.0.1", port, PCM_VERSION_FILE).unwrap();
        assert_eq!(body, "[version]\ncurrentVersion=1.23\n");
        assert_eq!(parse_current_version(&body), Some("1.23".to_string()));
    }

    #[test]
    fn test_fetch_failure_is_silent() {
        // Unresolvable host; the fetch must swallow the error
        assert!(fetch_file("ftp.host.invalid", LIB_VERSION_FILE).is_none());
    }
}
