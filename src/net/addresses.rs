//! Candidate robot address generation
//!
//! The robot is located by brute force: for every LAN the client machine
//! is attached to, every host address of that /24 is a candidate, probed
//! in parallel by the socket pool. This is more reliable than trusting
//! mDNS or the default gateway, and the probe parallelism bounds the scan
//! cost.
//!
//! Only interfaces that are both up and running contribute a sweep; a
//! down interface still carrying a stale address (unplugged cable,
//! expired lease) must not inflate the probe list.
//!
//! List order defines probe order: interface sweeps first, then any
//! caller-supplied static addresses, then loopback as the final fallback.

use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Generate the candidate address list from the host's interfaces.
///
/// Enumeration failure is not fatal: the list falls back to the static
/// extras plus loopback.
pub fn generate(extras: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
    let mut interface_ips = Vec::new();

    match interface_addresses() {
        Ok(entries) => {
            for (name, ip) in entries {
                if ip.is_loopback() || ip.is_unspecified() {
                    continue;
                }
                log::debug!("Client IP detected on {}: {}", name, ip);
                interface_ips.push(ip);
            }
        }
        Err(e) => {
            log::warn!("Interface enumeration failed: {}", e);
        }
    }

    sweep(&interface_ips, extras)
}

/// IPv4 addresses of interfaces that are both up and running.
///
/// Walks the `getifaddrs` list directly so the interface flags can be
/// checked; a stale address on a down interface is skipped.
#[cfg(unix)]
fn interface_addresses() -> std::io::Result<Vec<(String, Ipv4Addr)>> {
    use std::ffi::CStr;

    let mut list = Vec::new();
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: getifaddrs allocates the list and freeifaddrs releases it;
    // every pointer dereferenced below is checked for null first
    unsafe {
        if libc::getifaddrs(&mut ifap) != 0 {
            return Err(std::io::Error::last_os_error());
        }

        let mut cursor = ifap;
        while !cursor.is_null() {
            let entry = &*cursor;
            cursor = entry.ifa_next;

            let required = (libc::IFF_UP | libc::IFF_RUNNING) as libc::c_uint;
            if entry.ifa_flags & required != required {
                continue;
            }
            if entry.ifa_addr.is_null() {
                continue;
            }
            if (*entry.ifa_addr).sa_family != libc::AF_INET as libc::sa_family_t {
                continue;
            }

            let addr = &*(entry.ifa_addr as *const libc::sockaddr_in);
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            let name = CStr::from_ptr(entry.ifa_name).to_string_lossy().into_owned();
            list.push((name, ip));
        }

        libc::freeifaddrs(ifap);
    }

    Ok(list)
}

/// Fallback enumeration where `getifaddrs` is unavailable. Interface
/// flags cannot be checked on this path, so a stale address on a down
/// interface may slip into the sweep.
#[cfg(not(unix))]
fn interface_addresses() -> std::io::Result<Vec<(String, Ipv4Addr)>> {
    use std::net::IpAddr;

    let netifas = local_ip_address::list_afinet_netifas()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    Ok(netifas
        .into_iter()
        .filter_map(|(name, ip)| match ip {
            IpAddr::V4(v4) => Some((name, v4)),
            IpAddr::V6(_) => None,
        })
        .collect())
}

/// Build the candidate list from known interface addresses.
///
/// Each interface address contributes its full /24 host range (.1 through
/// .254). Duplicates are removed preserving first occurrence.
pub fn sweep(interface_ips: &[Ipv4Addr], extras: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
    let mut list = Vec::new();
    let mut seen = HashSet::new();

    let mut push = |ip: Ipv4Addr, list: &mut Vec<Ipv4Addr>| {
        if seen.insert(ip) {
            list.push(ip);
        }
    };

    for ip in interface_ips {
        if ip.is_loopback() || ip.is_unspecified() {
            continue;
        }
        let [a, b, c, _] = ip.octets();
        for host in 1..255 {
            push(Ipv4Addr::new(a, b, c, host), &mut list);
        }
    }

    for &ip in extras {
        push(ip, &mut list);
    }

    push(Ipv4Addr::LOCALHOST, &mut list);

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_interface_sweep() {
        let list = sweep(&[Ipv4Addr::new(192, 168, 1, 64)], &[]);

        assert_eq!(list.len(), 255);
        assert_eq!(list[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(list[253], Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(list[254], Ipv4Addr::LOCALHOST);
        // .0 and .255 are never probed
        assert!(!list.contains(&Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!list.contains(&Ipv4Addr::new(192, 168, 1, 255)));
    }

    #[test]
    fn test_loopback_only_yields_localhost() {
        let list = sweep(&[Ipv4Addr::LOCALHOST], &[]);
        assert_eq!(list, vec![Ipv4Addr::LOCALHOST]);

        let list = sweep(&[], &[]);
        assert_eq!(list, vec![Ipv4Addr::LOCALHOST]);
    }

    #[test]
    fn test_extras_precede_loopback() {
        let static_ip = Ipv4Addr::new(10, 12, 34, 2);
        let list = sweep(&[], &[static_ip]);
        assert_eq!(list, vec![static_ip, Ipv4Addr::LOCALHOST]);
    }

    #[test]
    fn test_two_interfaces_dedup() {
        let list = sweep(
            &[
                Ipv4Addr::new(192, 168, 1, 64),
                Ipv4Addr::new(192, 168, 1, 99),
                Ipv4Addr::new(10, 0, 0, 5),
            ],
            &[Ipv4Addr::new(192, 168, 1, 20)],
        );

        // Two distinct /24 sweeps plus loopback; the duplicate subnet and
        // the already-present static address collapse
        assert_eq!(list.len(), 254 + 254 + 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_interface_enumeration() {
        // A down interface can't be fabricated in a test; at minimum the
        // getifaddrs walk must succeed and yield named IPv4 entries
        let entries = interface_addresses().unwrap();
        for (name, _ip) in entries {
            assert!(!name.is_empty());
        }
    }
}
