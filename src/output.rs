use std::sync::Arc;

use crate::cli::CliArgs;
use crate::error::Result;
use crate::model::{Connection, Protocol};
use crate::resolver::Resolver;

const PROTO_WIDTH: usize = 6;
const STATE_WIDTH: usize = 12;
const ADDR_WIDTH: usize = 28;
const PROCESS_WIDTH: usize = 18;
const USER_WIDTH: usize = 10;

/// Renders one snapshot to stdout, either as an aligned table (with
/// optional name resolution) or as raw JSON records.
pub struct OutputFormatter {
    pub json: bool,
    pub resolve_hosts: bool,
    pub resolve_ports: bool,
}

impl OutputFormatter {
    pub fn from_cli(args: &CliArgs) -> Self {
        Self {
            json: args.json,
            resolve_hosts: !args.no_hostname,
            resolve_ports: !args.no_portname,
        }
    }

    /// Print the snapshot. The table view pre-warms the resolver cache
    /// for every address first, so per-row resolution is cache-hot.
    /// JSON output is the raw data contract and never resolves.
    pub async fn print(&self, connections: &[Connection], resolver: &Arc<Resolver>) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(connections)?);
            return Ok(());
        }

        if self.resolve_hosts {
            let addrs: Vec<String> = connections
                .iter()
                .filter(|c| c.protocol != Protocol::Unix)
                .flat_map(|c| [c.local_addr.clone(), c.remote_addr.clone()])
                .collect();
            resolver.resolve_many_addrs(&addrs).await;
        }

        self.print_header();
        for conn in connections {
            println!("{}", self.format_row(conn, resolver).await);
        }
        Ok(())
    }

    fn print_header(&self) {
        println!(
            "{} {} {} {} {:>7} {} {} {}",
            fit_str("PROTO", PROTO_WIDTH),
            fit_str("STATE", STATE_WIDTH),
            fit_str("LOCAL", ADDR_WIDTH),
            fit_str("REMOTE", ADDR_WIDTH),
            "PID",
            fit_str("PROCESS", PROCESS_WIDTH),
            fit_str("USER", USER_WIDTH),
            "IFACE",
        );
    }

    async fn format_row(&self, conn: &Connection, resolver: &Arc<Resolver>) -> String {
        let (local, remote) = if conn.protocol == Protocol::Unix {
            let path = if conn.local_addr.is_empty() {
                format!("[inode:{}]", conn.inode)
            } else {
                conn.local_addr.clone()
            };
            (path, "-".to_string())
        } else {
            (
                self.endpoint(&conn.local_addr, conn.local_port, conn, resolver)
                    .await,
                self.endpoint(&conn.remote_addr, conn.remote_port, conn, resolver)
                    .await,
            )
        };

        let pid = conn
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{} {} {} {} {:>7} {} {} {}",
            fit_str(&conn.protocol.to_string(), PROTO_WIDTH),
            fit_str(&conn.state, STATE_WIDTH),
            fit_str(&local, ADDR_WIDTH),
            fit_str(&remote, ADDR_WIDTH),
            pid,
            fit_str(conn.process.as_deref().unwrap_or("-"), PROCESS_WIDTH),
            fit_str(conn.user.as_deref().unwrap_or("-"), USER_WIDTH),
            conn.interface,
        )
    }

    /// Format one side of an inet connection as `host:service`. The
    /// wildcard peer collapses to a bare `*`; wildcard hosts are never
    /// sent to the resolver.
    async fn endpoint(
        &self,
        addr: &str,
        port: u16,
        conn: &Connection,
        resolver: &Arc<Resolver>,
    ) -> String {
        if addr == "*" && port == 0 {
            return "*".to_string();
        }

        let host = if self.resolve_hosts && addr != "*" {
            resolver.resolve_addr(addr).await
        } else {
            addr.to_string()
        };

        let service = if self.resolve_ports {
            resolver.resolve_port(port, conn.protocol.service_proto())
        } else {
            port.to_string()
        };

        format!("{}:{}", host, service)
    }
}

/// Truncate or pad a string to exactly `width` columns.
fn fit_str(s: &str, width: usize) -> String {
    if s.len() > width {
        s.chars().take(width).collect()
    } else {
        format!("{:<width$}", s, width = width)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn formatter() -> OutputFormatter {
        OutputFormatter {
            json: false,
            resolve_hosts: false,
            resolve_ports: false,
        }
    }

    fn resolver() -> Arc<Resolver> {
        Arc::new(Resolver::new(Duration::from_millis(50)))
    }

    fn conn(protocol: Protocol) -> Connection {
        Connection {
            timestamp: SystemTime::now(),
            protocol,
            ip_version: protocol.ip_version(),
            state: "LISTEN".to_string(),
            local_addr: "127.0.0.1".to_string(),
            local_port: 80,
            remote_addr: "*".to_string(),
            remote_port: 0,
            inode: 42,
            pid: Some(1234),
            process: Some("nginx".to_string()),
            uid: Some(0),
            user: Some("root".to_string()),
            interface: "lo".to_string(),
        }
    }

    #[test]
    fn test_fit_str_truncate() {
        assert_eq!(fit_str("verylongprocessname", 9), "verylongp");
    }

    #[test]
    fn test_fit_str_pad() {
        assert_eq!(fit_str("tcp", 6), "tcp   ");
    }

    #[tokio::test]
    async fn test_row_without_resolution() {
        let fmt = formatter();
        let row = fmt.format_row(&conn(Protocol::Tcp), &resolver()).await;

        assert!(row.starts_with("tcp "));
        assert!(row.contains("127.0.0.1:80"));
        assert!(row.contains("nginx"));
        assert!(row.contains("1234"));
        // The wildcard remote collapses to a bare marker.
        assert!(row.contains(" *  "));
    }

    #[tokio::test]
    async fn test_row_with_port_resolution() {
        let fmt = OutputFormatter {
            json: false,
            resolve_hosts: false,
            resolve_ports: true,
        };
        let row = fmt.format_row(&conn(Protocol::Tcp), &resolver()).await;
        assert!(row.contains("127.0.0.1:http"));
    }

    #[tokio::test]
    async fn test_unix_row_uses_path() {
        let mut c = conn(Protocol::Unix);
        c.ip_version = None;
        c.local_addr = "/run/netpeek.sock".to_string();
        c.local_port = 0;
        c.remote_addr = String::new();
        c.state = "CONNECTED".to_string();
        c.interface = "unix".to_string();
        c.pid = None;
        c.process = None;
        c.user = None;

        let row = fmt_row(&c).await;
        assert!(row.contains("/run/netpeek.sock"));
        assert!(row.contains(" - "));
    }

    #[tokio::test]
    async fn test_unix_row_pathless_shows_inode() {
        let mut c = conn(Protocol::Unix);
        c.local_addr = String::new();
        let row = fmt_row(&c).await;
        assert!(row.contains("[inode:42]"));
    }

    async fn fmt_row(c: &Connection) -> String {
        formatter().format_row(c, &resolver()).await
    }
}
