use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "netpeek",
    version,
    about = "Live network connection inspector with process attribution"
)]
pub struct CliArgs {
    /// Filter by protocol (comma-separated: tcp,tcp6,udp,udp6,unix; prefix ^ to exclude)
    #[arg(long, value_name = "PROTO")]
    pub proto: Option<String>,

    /// Filter by state, e.g. LISTEN,ESTABLISHED (comma-separated, prefix ^ to exclude)
    #[arg(long, value_name = "STATE")]
    pub state: Option<String>,

    /// Filter by PID (comma-separated, prefix ^ to exclude)
    #[arg(short = 'p', long, value_name = "PID")]
    pub pid: Option<String>,

    /// Filter by user name (comma-separated, prefix ^ to exclude)
    #[arg(short = 'u', long, value_name = "USER")]
    pub user: Option<String>,

    /// Filter by local or remote port
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Show listening sockets only
    #[arg(short = 'l', long)]
    pub listening: bool,

    /// Fuzzy search over process names, addresses and users
    #[arg(short = 's', long, value_name = "QUERY")]
    pub search: Option<String>,

    /// Sort column: proto, state, local, remote, pid, process, user
    #[arg(long, value_name = "KEY")]
    pub sort: Option<String>,

    /// No hostname resolution
    #[arg(short = 'n')]
    pub no_hostname: bool,

    /// No port/service name resolution
    #[arg(short = 'P')]
    pub no_portname: bool,

    /// Reverse-DNS timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 200)]
    pub resolve_timeout_ms: u64,

    /// Perform fresh lookups instead of caching resolution results
    #[arg(long)]
    pub no_resolve_cache: bool,

    /// Print raw connection records as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Refresh every SECONDS until interrupted
    #[arg(short = 'w', long, value_name = "SECONDS")]
    pub watch: Option<u64>,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
