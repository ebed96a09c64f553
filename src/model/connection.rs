use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::Serialize;

/// Wildcard marker for an unspecified address (0.0.0.0 / ::).
pub const WILDCARD_ADDR: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Tcp6,
    Udp,
    Udp6,
    Unix,
}

impl Protocol {
    pub fn is_udp(&self) -> bool {
        matches!(self, Protocol::Udp | Protocol::Udp6)
    }

    /// IP version implied by the protocol; `None` for unix sockets.
    pub fn ip_version(&self) -> Option<IpVersion> {
        match self {
            Protocol::Tcp | Protocol::Udp => Some(IpVersion::V4),
            Protocol::Tcp6 | Protocol::Udp6 => Some(IpVersion::V6),
            Protocol::Unix => None,
        }
    }

    /// Protocol family name used for service-name lookups ("tcp" or "udp").
    pub fn service_proto(&self) -> &'static str {
        match self {
            Protocol::Tcp | Protocol::Tcp6 => "tcp",
            Protocol::Udp | Protocol::Udp6 => "udp",
            Protocol::Unix => "unix",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Tcp6 => write!(f, "tcp6"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Udp6 => write!(f, "udp6"),
            Protocol::Unix => write!(f, "unix"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "tcp6" => Ok(Protocol::Tcp6),
            "udp" => Ok(Protocol::Udp),
            "udp6" => Ok(Protocol::Udp6),
            "unix" => Ok(Protocol::Unix),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpVersion {
    #[serde(rename = "IPv4")]
    V4,
    #[serde(rename = "IPv6")]
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "IPv4"),
            IpVersion::V6 => write!(f, "IPv6"),
        }
    }
}

/// One observed socket at the time of the poll.
///
/// Records are created fresh each poll and never mutated afterwards; the
/// attribution fields stay `None` when the owning process could not be
/// determined (orphaned connection).
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub timestamp: SystemTime,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<IpVersion>,
    pub state: String,
    /// Textual IP for inet sockets, bound path for unix sockets.
    pub local_addr: String,
    pub local_port: u16,
    pub remote_addr: String,
    pub remote_port: u16,
    /// Kernel socket inode; the join key into the process index. Zero when
    /// the table line carried no usable inode.
    pub inode: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Best-effort local interface name, "unix" for domain sockets.
    pub interface: String,
}

impl Connection {
    pub fn is_listening(&self) -> bool {
        self.state == "LISTEN"
    }

    /// True when the socket has no remote peer (listening/unconnected).
    #[allow(dead_code)]
    pub fn has_remote_peer(&self) -> bool {
        !(self.remote_addr == WILDCARD_ADDR && self.remote_port == 0)
            && !self.remote_addr.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
