use std::str::FromStr;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::cli::CliArgs;
use crate::error::{NetpeekError, Result};
use crate::model::{Connection, Protocol};

/// Snapshot filter built from CLI arguments. All active criteria must
/// match (AND semantics); list-valued criteria use the `^`-prefix
/// exclude convention.
#[derive(Debug, Default)]
pub struct FilterConfig {
    pub protocols: Option<ProtocolFilter>,
    pub states: Option<StateFilter>,
    pub pids: Option<PidFilter>,
    pub users: Option<UserFilter>,
    pub port: Option<u16>,
    pub listening_only: bool,
    pub search: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProtocolFilter {
    pub include: Vec<Protocol>,
    pub exclude: Vec<Protocol>,
}

#[derive(Debug, Default)]
pub struct StateFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PidFilter {
    pub include: Vec<u32>,
    pub exclude: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse a protocol filter string.
///
/// Format: comma-separated protocol names, prefix `^` to exclude.
/// Examples: "tcp,udp", "^unix", "tcp,^tcp6"
fn parse_protocol_filter(s: &str) -> Result<ProtocolFilter> {
    let mut filter = ProtocolFilter::default();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(rest) = token.strip_prefix('^') {
            filter.exclude.push(parse_protocol(rest)?);
        } else {
            filter.include.push(parse_protocol(token)?);
        }
    }
    Ok(filter)
}

fn parse_protocol(s: &str) -> Result<Protocol> {
    s.parse::<Protocol>().map_err(NetpeekError::Parse)
}

/// Parse a state filter string. States compare case-insensitively.
fn parse_state_filter(s: &str) -> StateFilter {
    let mut filter = StateFilter::default();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(rest) = token.strip_prefix('^') {
            filter.exclude.push(rest.to_uppercase());
        } else {
            filter.include.push(token.to_uppercase());
        }
    }
    filter
}

/// Parse a PID filter string.
///
/// Format: comma-separated PIDs, prefix `^` to exclude.
fn parse_pid_filter(s: &str) -> Result<PidFilter> {
    let mut filter = PidFilter::default();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(rest) = token.strip_prefix('^') {
            let pid: u32 = rest
                .parse()
                .map_err(|_| NetpeekError::Parse(format!("invalid PID: {}", rest)))?;
            filter.exclude.push(pid);
        } else {
            let pid: u32 = token
                .parse()
                .map_err(|_| NetpeekError::Parse(format!("invalid PID: {}", token)))?;
            filter.include.push(pid);
        }
    }
    Ok(filter)
}

fn parse_user_filter(s: &str) -> UserFilter {
    let mut filter = UserFilter::default();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(rest) = token.strip_prefix('^') {
            filter.exclude.push(rest.to_string());
        } else {
            filter.include.push(token.to_string());
        }
    }
    filter
}

// ---------------------------------------------------------------------------
// FilterConfig
// ---------------------------------------------------------------------------

impl FilterConfig {
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = FilterConfig {
            port: args.port,
            listening_only: args.listening,
            search: args.search.clone(),
            ..Default::default()
        };
        if let Some(ref spec) = args.proto {
            config.protocols = Some(parse_protocol_filter(spec)?);
        }
        if let Some(ref spec) = args.state {
            config.states = Some(parse_state_filter(spec));
        }
        if let Some(ref spec) = args.pid {
            config.pids = Some(parse_pid_filter(spec)?);
        }
        if let Some(ref spec) = args.user {
            config.users = Some(parse_user_filter(spec));
        }
        Ok(config)
    }

    /// Apply all active criteria, keeping the snapshot's record order.
    pub fn apply(&self, connections: Vec<Connection>) -> Vec<Connection> {
        let matcher = SkimMatcherV2::default();
        connections
            .into_iter()
            .filter(|conn| self.matches(conn, &matcher))
            .collect()
    }

    fn matches(&self, conn: &Connection, matcher: &SkimMatcherV2) -> bool {
        if let Some(ref filter) = self.protocols {
            if filter.exclude.contains(&conn.protocol) {
                return false;
            }
            if !filter.include.is_empty() && !filter.include.contains(&conn.protocol) {
                return false;
            }
        }

        if let Some(ref filter) = self.states {
            let state = conn.state.to_uppercase();
            if filter.exclude.contains(&state) {
                return false;
            }
            if !filter.include.is_empty() && !filter.include.contains(&state) {
                return false;
            }
        }

        if let Some(ref filter) = self.pids {
            match conn.pid {
                Some(pid) => {
                    if filter.exclude.contains(&pid) {
                        return false;
                    }
                    if !filter.include.is_empty() && !filter.include.contains(&pid) {
                        return false;
                    }
                }
                // Orphaned connections only pass a pure exclude filter.
                None => {
                    if !filter.include.is_empty() {
                        return false;
                    }
                }
            }
        }

        if let Some(ref filter) = self.users {
            let user = conn.user.as_deref().unwrap_or("");
            if filter.exclude.iter().any(|u| u == user) {
                return false;
            }
            if !filter.include.is_empty() && !filter.include.iter().any(|u| u == user) {
                return false;
            }
        }

        if let Some(port) = self.port {
            if conn.local_port != port && conn.remote_port != port {
                return false;
            }
        }

        if self.listening_only && !conn.is_listening() {
            return false;
        }

        if let Some(ref query) = self.search {
            let haystack = format!(
                "{} {} {} {}",
                conn.process.as_deref().unwrap_or(""),
                conn.local_addr,
                conn.remote_addr,
                conn.user.as_deref().unwrap_or(""),
            );
            if matcher.fuzzy_match(&haystack, query).is_none() {
                return false;
            }
        }

        true
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Proto,
    State,
    Local,
    Remote,
    Pid,
    Process,
    User,
}

impl FromStr for SortKey {
    type Err = NetpeekError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "proto" => Ok(SortKey::Proto),
            "state" => Ok(SortKey::State),
            "local" => Ok(SortKey::Local),
            "remote" => Ok(SortKey::Remote),
            "pid" => Ok(SortKey::Pid),
            "process" => Ok(SortKey::Process),
            "user" => Ok(SortKey::User),
            other => Err(NetpeekError::Parse(format!("unknown sort key: {}", other))),
        }
    }
}

/// Stable ascending sort of a snapshot; ties keep the collection order.
pub fn sort_connections(connections: &mut [Connection], key: SortKey) {
    match key {
        SortKey::Proto => {
            connections.sort_by_key(|c| c.protocol.to_string());
        }
        SortKey::State => connections.sort_by(|a, b| a.state.cmp(&b.state)),
        SortKey::Local => connections
            .sort_by(|a, b| (&a.local_addr, a.local_port).cmp(&(&b.local_addr, b.local_port))),
        SortKey::Remote => connections
            .sort_by(|a, b| (&a.remote_addr, a.remote_port).cmp(&(&b.remote_addr, b.remote_port))),
        SortKey::Pid => connections.sort_by_key(|c| c.pid.unwrap_or(0)),
        SortKey::Process => {
            connections.sort_by(|a, b| a.process.cmp(&b.process));
        }
        SortKey::User => connections.sort_by(|a, b| a.user.cmp(&b.user)),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
