/// Attribution for one scanned process, built while constructing the
/// inode index and discarded once the index is merged into a snapshot.
///
/// `uid`/`username` are `None` when the status file could not be read;
/// the socket attributions for the pid are kept regardless.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Short command name (comm, falling back to argv[0] basename).
    pub command: String,
    pub uid: Option<u32>,
    pub username: Option<String>,
}
