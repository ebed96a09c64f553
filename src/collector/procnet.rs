//! Parsers for the kernel's textual socket tables under /proc/net.
//!
//! Each table is decoded into plain [`Connection`] records with no process
//! attribution; the join against the inode index happens in the assembler.
//! Malformed lines are skipped individually and an unreadable table
//! contributes nothing, so a host without e.g. IPv6 support degrades to an
//! emptier snapshot instead of an error.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::SystemTime;

use log::debug;

use crate::model::connection::WILDCARD_ADDR;
use crate::model::{Connection, Protocol};

/// The four inet socket tables, in the order they are collected.
pub const NET_TABLES: [(&str, Protocol); 4] = [
    ("/proc/net/tcp", Protocol::Tcp),
    ("/proc/net/tcp6", Protocol::Tcp6),
    ("/proc/net/udp", Protocol::Udp),
    ("/proc/net/udp6", Protocol::Udp6),
];

pub const UNIX_TABLE: &str = "/proc/net/unix";

/// Parse all four inet tables. A missing or unreadable table contributes
/// zero connections.
pub fn parse_all() -> Vec<Connection> {
    let mut connections = Vec::new();
    for (path, protocol) in NET_TABLES {
        connections.extend(read_table(path, protocol));
    }
    connections
}

/// Read and parse one inet table file.
pub fn read_table(path: &str, protocol: Protocol) -> Vec<Connection> {
    match fs::read_to_string(path) {
        Ok(content) => parse_table(&content, protocol),
        Err(err) => {
            debug!("skipping {}: {}", path, err);
            Vec::new()
        }
    }
}

/// Parse the contents of one inet table. The first line is the column
/// header; every following line describes one socket.
pub fn parse_table(content: &str, protocol: Protocol) -> Vec<Connection> {
    let now = SystemTime::now();
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_line(line.trim(), protocol, now))
        .collect()
}

fn parse_line(line: &str, protocol: Protocol, now: SystemTime) -> Option<Connection> {
    if line.is_empty() {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }

    let (local_addr, local_port) = parse_hex_addr(fields[1])?;
    let (remote_addr, remote_port) = parse_hex_addr(fields[2])?;

    // A bad state code yields an empty state but keeps the line.
    let mut state = socket_state(fields[3], protocol);

    // Likewise a bad inode keeps the line; the record stays orphaned.
    let inode = fields[9].parse::<u64>().unwrap_or(0);

    // The kernel reports an unconnected-but-bound UDP socket as CLOSE;
    // with no remote peer that is in practice a listening socket.
    if protocol.is_udp()
        && state == "UNCONNECTED"
        && remote_addr == WILDCARD_ADDR
        && remote_port == 0
    {
        state = "LISTEN";
    }

    Some(Connection {
        timestamp: now,
        protocol,
        ip_version: protocol.ip_version(),
        state: state.to_string(),
        local_addr,
        local_port,
        remote_addr,
        remote_port,
        inode,
        pid: None,
        process: None,
        uid: None,
        user: None,
        interface: String::new(),
    })
}

/// Decode a `hexaddr:hexport` field into a textual address and port.
///
/// Returns `None` when the field is structurally unparsable; the wildcard
/// (unspecified) address normalizes to `"*"`.
pub fn parse_hex_addr(field: &str) -> Option<(String, u16)> {
    let (ip_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let ip = decode_hex_ip(ip_hex)?;

    let addr = if ip.is_unspecified() {
        WILDCARD_ADDR.to_string()
    } else {
        ip.to_string()
    };
    Some((addr, port))
}

/// Decode the kernel's hex address encoding.
///
/// IPv4 is 8 hex digits holding the four octets in reversed byte order.
/// IPv6 is 32 hex digits holding four 32-bit words, each stored
/// little-endian, so every 4-byte group is reversed independently.
/// Formatting goes through the std address types, which also gives
/// canonical zero-run compression for IPv6.
fn decode_hex_ip(hex: &str) -> Option<IpAddr> {
    let bytes = hex_bytes(hex)?;
    match bytes.len() {
        4 => Some(IpAddr::V4(Ipv4Addr::new(
            bytes[3], bytes[2], bytes[1], bytes[0],
        ))),
        16 => {
            let mut octets = [0u8; 16];
            for group in 0..4 {
                for i in 0..4 {
                    octets[group * 4 + i] = bytes[group * 4 + (3 - i)];
                }
            }
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn hex_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Map a hex state code to its textual state.
///
/// UDP reuses TCP's numeric space with different meanings: 0x01 is a
/// connected socket and 0x07 an unconnected one. Unknown codes map to
/// the empty state.
pub fn socket_state(hex_code: &str, protocol: Protocol) -> &'static str {
    let Ok(code) = u32::from_str_radix(hex_code, 16) else {
        return "";
    };

    match protocol {
        Protocol::Tcp | Protocol::Tcp6 => match code {
            0x01 => "ESTABLISHED",
            0x02 => "SYN_SENT",
            0x03 => "SYN_RECV",
            0x04 => "FIN_WAIT1",
            0x05 => "FIN_WAIT2",
            0x06 => "TIME_WAIT",
            0x07 => "CLOSE",
            0x08 => "CLOSE_WAIT",
            0x09 => "LAST_ACK",
            0x0A => "LISTEN",
            0x0B => "CLOSING",
            _ => "",
        },
        Protocol::Udp | Protocol::Udp6 => match code {
            0x01 => "ESTABLISHED",
            0x07 => "UNCONNECTED",
            _ => "",
        },
        Protocol::Unix => "CONNECTED",
    }
}

/// Read the unix domain socket table. Optional enrichment: an unreadable
/// table yields an empty result, never an error.
pub fn read_unix_table(path: &str) -> Vec<Connection> {
    match fs::read_to_string(path) {
        Ok(content) => parse_unix_table(&content),
        Err(err) => {
            debug!("skipping {}: {}", path, err);
            Vec::new()
        }
    }
}

/// Parse /proc/net/unix. Field 6 is the inode, field 7 the bound path
/// when present. Unix sockets carry no address/port and are never
/// attributed to a process here.
pub fn parse_unix_table(content: &str) -> Vec<Connection> {
    let now = SystemTime::now();
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim().split_whitespace().collect();
            if fields.len() < 7 {
                return None;
            }

            let inode = fields[6].parse::<u64>().unwrap_or(0);
            let path = fields.get(7).copied().unwrap_or_default().to_string();

            Some(Connection {
                timestamp: now,
                protocol: Protocol::Unix,
                ip_version: None,
                state: "CONNECTED".to_string(),
                local_addr: path,
                local_port: 0,
                remote_addr: String::new(),
                remote_port: 0,
                inode,
                pid: None,
                process: None,
                uid: None,
                user: None,
                interface: "unix".to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

    fn tcp_line(local: &str, remote: &str, state: &str, inode: u64) -> String {
        format!(
            "   0: {} {} {} 00000000:00000000 00:00000000 00000000  1000        0 {} 1 0000000000000000 100 0 0 10 0",
            local, remote, state, inode,
        )
    }

    // -- Address decoding --

    #[test]
    fn test_decode_ipv4_loopback() {
        let (addr, port) = parse_hex_addr("0100007F:0050").unwrap();
        assert_eq!(addr, "127.0.0.1");
        assert_eq!(port, 80);
    }

    #[test]
    fn test_decode_ipv4_wildcard() {
        let (addr, port) = parse_hex_addr("00000000:0000").unwrap();
        assert_eq!(addr, "*");
        assert_eq!(port, 0);
    }

    #[test]
    fn test_decode_ipv4_byte_order() {
        // 10.0.2.15 is stored reversed as 0F02000A.
        let (addr, _) = parse_hex_addr("0F02000A:0016").unwrap();
        assert_eq!(addr, "10.0.2.15");
    }

    #[test]
    fn test_decode_ipv6_unspecified() {
        let (addr, port) =
            parse_hex_addr("00000000000000000000000000000000:0016").unwrap();
        assert_eq!(addr, "*");
        assert_eq!(port, 22);
    }

    #[test]
    fn test_decode_ipv6_loopback() {
        // ::1 -- the last 32-bit word is stored little-endian.
        let (addr, port) =
            parse_hex_addr("00000000000000000000000001000000:1F90").unwrap();
        assert_eq!(addr, "::1");
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_decode_ipv6_mapped_v4() {
        let (addr, _) =
            parse_hex_addr("0000000000000000FFFF00000100007F:0050").unwrap();
        assert_eq!(addr, "::ffff:127.0.0.1");
    }

    #[test]
    fn test_decode_rejects_bad_hex() {
        assert!(parse_hex_addr("0100007G:0050").is_none());
        assert!(parse_hex_addr("0100007F").is_none());
        assert!(parse_hex_addr("0100:0050").is_none());
    }

    // -- State mapping --

    #[test]
    fn test_tcp_states() {
        assert_eq!(socket_state("01", Protocol::Tcp), "ESTABLISHED");
        assert_eq!(socket_state("0A", Protocol::Tcp), "LISTEN");
        assert_eq!(socket_state("0B", Protocol::Tcp6), "CLOSING");
        assert_eq!(socket_state("0C", Protocol::Tcp), "");
        assert_eq!(socket_state("zz", Protocol::Tcp), "");
    }

    #[test]
    fn test_udp_states() {
        assert_eq!(socket_state("01", Protocol::Udp), "ESTABLISHED");
        assert_eq!(socket_state("07", Protocol::Udp6), "UNCONNECTED");
        assert_eq!(socket_state("0A", Protocol::Udp), "");
    }

    // -- Table parsing --

    #[test]
    fn test_parse_table_listen_socket() {
        let content = format!(
            "{}\n{}\n",
            TCP_HEADER,
            tcp_line("0100007F:1538", "00000000:0000", "0A", 98765),
        );
        let conns = parse_table(&content, Protocol::Tcp);
        assert_eq!(conns.len(), 1);

        let conn = &conns[0];
        assert_eq!(conn.protocol, Protocol::Tcp);
        assert_eq!(conn.state, "LISTEN");
        assert_eq!(conn.local_addr, "127.0.0.1");
        assert_eq!(conn.local_port, 5432);
        assert_eq!(conn.remote_addr, "*");
        assert_eq!(conn.remote_port, 0);
        assert_eq!(conn.inode, 98765);
        assert!(conn.pid.is_none());
    }

    #[test]
    fn test_parse_table_skips_malformed_lines() {
        let content = format!(
            "{}\n{}\nnot a socket line\n{}\n{}\n",
            TCP_HEADER,
            tcp_line("0100007F:0050", "00000000:0000", "0A", 1),
            tcp_line("XXYYZZQQ:0050", "00000000:0000", "0A", 2),
            tcp_line("0100007F:01BB", "0F02000A:C350", "01", 3),
        );
        let conns = parse_table(&content, Protocol::Tcp);

        // Lines before and after the malformed ones survive, in order.
        assert_eq!(conns.len(), 2);
        assert_eq!(conns[0].inode, 1);
        assert_eq!(conns[1].inode, 3);
        assert_eq!(conns[1].state, "ESTABLISHED");
        assert_eq!(conns[1].remote_addr, "10.0.2.15");
        assert_eq!(conns[1].remote_port, 50000);
    }

    #[test]
    fn test_parse_table_bad_state_keeps_line() {
        let content = format!(
            "{}\n{}\n",
            TCP_HEADER,
            tcp_line("0100007F:0050", "00000000:0000", "FF", 7),
        );
        let conns = parse_table(&content, Protocol::Tcp);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].state, "");
    }

    #[test]
    fn test_udp_unconnected_wildcard_becomes_listen() {
        let content = format!(
            "{}\n{}\n",
            TCP_HEADER,
            tcp_line("00000000:0035", "00000000:0000", "07", 11),
        );
        let conns = parse_table(&content, Protocol::Udp);
        assert_eq!(conns[0].state, "LISTEN");
        assert_eq!(conns[0].local_port, 53);
    }

    #[test]
    fn test_udp_unconnected_with_peer_stays_unconnected() {
        let content = format!(
            "{}\n{}\n",
            TCP_HEADER,
            tcp_line("00000000:0035", "0100007F:0035", "07", 12),
        );
        let conns = parse_table(&content, Protocol::Udp);
        assert_eq!(conns[0].state, "UNCONNECTED");
    }

    #[test]
    fn test_read_table_missing_file_is_empty() {
        let conns = read_table("/proc/net/definitely-not-a-table", Protocol::Tcp);
        assert!(conns.is_empty());
    }

    #[test]
    fn test_read_table_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}\n{}\n",
            TCP_HEADER,
            tcp_line("0100007F:0050", "00000000:0000", "0A", 314),
        )
        .unwrap();

        let conns = read_table(file.path().to_str().unwrap(), Protocol::Tcp);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].inode, 314);
    }

    // -- Unix table --

    #[test]
    fn test_parse_unix_table() {
        let content = "\
Num       RefCount Protocol Flags    Type St Inode Path
0000000000000000: 00000002 00000000 00010000 0001 01 23456 /run/systemd/private
0000000000000000: 00000002 00000000 00010000 0001 01 23457
short line
";
        let conns = parse_unix_table(content);
        assert_eq!(conns.len(), 2);

        assert_eq!(conns[0].protocol, Protocol::Unix);
        assert_eq!(conns[0].state, "CONNECTED");
        assert_eq!(conns[0].inode, 23456);
        assert_eq!(conns[0].local_addr, "/run/systemd/private");
        assert_eq!(conns[0].interface, "unix");
        assert_eq!(conns[0].ip_version, None);

        // Pathless socket: empty address, inode still recorded.
        assert_eq!(conns[1].inode, 23457);
        assert_eq!(conns[1].local_addr, "");
    }

    #[test]
    fn test_read_unix_table_missing_file_is_empty() {
        assert!(read_unix_table("/proc/net/no-such-unix").is_empty());
    }
}
