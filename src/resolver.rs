//! Caching name resolution for addresses and ports.
//!
//! Reverse DNS is slow and unreliable, so every lookup is bounded by a
//! timeout and the outcome -- success or not -- is cached. A failed lookup
//! caches "resolved to self", which keeps one dead address from stalling
//! every subsequent poll. Hostname and service entries share one map keyed
//! by the raw address or by `"<port>/<proto>"`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Timeout used by the shared resolver instance.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Ceiling on concurrent in-flight reverse lookups during pre-warming.
const PREWARM_CONCURRENCY: usize = 32;

pub struct Resolver {
    timeout: Duration,
    cache: RwLock<HashMap<String, String>>,
    no_cache: AtomicBool,
}

impl Resolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cache: RwLock::new(HashMap::new()),
            no_cache: AtomicBool::new(false),
        }
    }

    /// Disable (or re-enable) the cache. While disabled every call skips
    /// both the read and the write path and performs a fresh lookup.
    pub fn set_no_cache(&self, no_cache: bool) {
        self.no_cache.store(no_cache, Ordering::Relaxed);
    }

    fn no_cache(&self) -> bool {
        self.no_cache.load(Ordering::Relaxed)
    }

    /// Resolve an IP address to a hostname.
    ///
    /// Inputs that don't parse as an IP literal (wildcards, unix paths,
    /// already-resolved names) pass through unchanged. On timeout, error,
    /// or an empty answer the address resolves to itself.
    pub async fn resolve_addr(&self, addr: &str) -> String {
        if !self.no_cache() {
            if let Some(hit) = self.cache.read().unwrap().get(addr).cloned() {
                return hit;
            }
        }

        let resolved = match addr.parse::<IpAddr>() {
            Ok(ip) => self
                .reverse_lookup(ip)
                .await
                .unwrap_or_else(|| addr.to_string()),
            Err(_) => addr.to_string(),
        };

        if !self.no_cache() {
            self.cache
                .write()
                .unwrap()
                .insert(addr.to_string(), resolved.clone());
        }
        resolved
    }

    /// Reverse lookup bounded by the resolver timeout. The blocking call
    /// is not interrupted at the deadline; its result is simply ignored.
    async fn reverse_lookup(&self, ip: IpAddr) -> Option<String> {
        let start = Instant::now();
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip));

        let name = match timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(name))) => {
                let name = name.strip_suffix('.').unwrap_or(&name).to_string();
                if name.is_empty() {
                    None
                } else {
                    Some(name)
                }
            }
            _ => None,
        };

        if start.elapsed() > Duration::from_millis(50) {
            debug!("slow reverse lookup for {}: {:?}", ip, start.elapsed());
        }
        name
    }

    /// Resolve a port to a service name via the built-in well-known
    /// table, falling back to the port number itself. Port 0 has no
    /// service semantics and short-circuits without touching the cache.
    pub fn resolve_port(&self, port: u16, proto: &str) -> String {
        if port == 0 {
            return "0".to_string();
        }

        let key = format!("{}/{}", port, proto);
        if !self.no_cache() {
            if let Some(hit) = self.cache.read().unwrap().get(&key).cloned() {
                return hit;
            }
        }

        let resolved = well_known_service(port, proto)
            .map(str::to_string)
            .unwrap_or_else(|| port.to_string());

        if !self.no_cache() {
            self.cache.write().unwrap().insert(key, resolved.clone());
        }
        resolved
    }

    /// Pre-warm the cache for a batch of addresses so a subsequent render
    /// pass only ever hits the cache.
    ///
    /// Deduplicates, drops blank/wildcard entries and anything already
    /// cached, then fans out with bounded concurrency and waits for every
    /// dispatched lookup. Each lookup is individually timeout-bound, so
    /// the whole call finishes within roughly one timeout period.
    pub async fn resolve_many_addrs(self: &Arc<Self>, addrs: &[String]) {
        let mut unique: Vec<String> = Vec::new();
        {
            let cache = self.cache.read().unwrap();
            for addr in addrs {
                if addr.is_empty() || addr == "*" {
                    continue;
                }
                if cache.contains_key(addr) || unique.iter().any(|a| a == addr) {
                    continue;
                }
                unique.push(addr.clone());
            }
        }
        if unique.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(PREWARM_CONCURRENCY));
        let mut tasks = JoinSet::new();
        for addr in unique {
            let resolver = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                resolver.resolve_addr(&addr).await;
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().unwrap().clear();
    }
}

/// Process-wide resolver for callers that don't want to thread an
/// instance through every layer. Lazily created on first use with
/// [`DEFAULT_TIMEOUT`]; semantics are identical to an explicitly
/// constructed instance.
#[allow(dead_code)]
pub fn shared() -> &'static Arc<Resolver> {
    static SHARED: OnceLock<Arc<Resolver>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(Resolver::new(DEFAULT_TIMEOUT)))
}

/// Static fallback table of well-known service names.
fn well_known_service(port: u16, proto: &str) -> Option<&'static str> {
    match (port, proto) {
        (21, "tcp") => Some("ftp"),
        (22, "tcp") => Some("ssh"),
        (23, "tcp") => Some("telnet"),
        (25, "tcp") => Some("smtp"),
        (53, "tcp") | (53, "udp") => Some("domain"),
        (67, "udp") => Some("bootps"),
        (68, "udp") => Some("bootpc"),
        (69, "udp") => Some("tftp"),
        (80, "tcp") => Some("http"),
        (110, "tcp") => Some("pop3"),
        (123, "udp") => Some("ntp"),
        (143, "tcp") => Some("imap"),
        (161, "udp") => Some("snmp"),
        (443, "tcp") => Some("https"),
        (514, "udp") => Some("syslog"),
        (993, "tcp") => Some("imaps"),
        (995, "tcp") => Some("pop3s"),
        (3306, "tcp") => Some("mysql"),
        (3389, "tcp") => Some("rdp"),
        (5432, "tcp") => Some("postgresql"),
        (5900, "tcp") => Some("vnc"),
        (6379, "tcp") => Some("redis"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
