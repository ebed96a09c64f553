//! Best-effort mapping from a local address to the interface carrying it.

use std::net::IpAddr;

use nix::ifaddrs::getifaddrs;

/// Snapshot of the host's interface addresses, built once per poll.
pub struct InterfaceTable {
    entries: Vec<(IpAddr, String)>,
}

impl InterfaceTable {
    /// Enumerate local interfaces. Enumeration failure degrades to an
    /// empty table; every lookup then falls through to "unknown".
    pub fn load() -> Self {
        let mut entries = Vec::new();
        if let Ok(addrs) = getifaddrs() {
            for ifaddr in addrs {
                let Some(address) = ifaddr.address else {
                    continue;
                };
                if let Some(sin) = address.as_sockaddr_in() {
                    entries.push((IpAddr::V4(sin.ip()), ifaddr.interface_name));
                } else if let Some(sin6) = address.as_sockaddr_in6() {
                    entries.push((IpAddr::V6(sin6.ip()), ifaddr.interface_name));
                }
            }
        }
        Self { entries }
    }

    /// Interface name whose address equals `addr`, or empty when the
    /// address is a wildcard, a unix path, or simply not local.
    pub fn name_for(&self, addr: &str) -> String {
        let Ok(ip) = addr.parse::<IpAddr>() else {
            return String::new();
        };
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == ip)
            .map(|(_, name)| name.clone())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
