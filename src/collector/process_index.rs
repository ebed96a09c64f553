//! Inode-to-process index built once per poll.
//!
//! A fixed pool of worker threads pulls pids from a queue and scans each
//! process's fd directory for socket descriptors; the calling thread folds
//! the per-pid batches into one map. PIDs routinely vanish between
//! enumeration and inspection, so every per-pid failure silently drops that
//! process from the index.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;
use log::debug;
use procfs::process::{FDTarget, Process};

use crate::error::{NetpeekError, Result};
use crate::model::ProcessRecord;

/// Size of the worker pool for the process scan. The cost is dominated by
/// many independent short filesystem calls, which parallelize well.
pub const INDEX_WORKERS: usize = 8;

/// Maps a socket inode to the process holding a descriptor to it. When
/// descriptors across processes share an inode, the last writer during
/// aggregation wins.
pub type InodeIndex = HashMap<u64, Arc<ProcessRecord>>;

/// Cache of uid -> username translations.
///
/// The mapping space is small and bounded, so entries are never evicted;
/// `clear` exists as an operational knob and for cold-cache testing. An
/// unresolved uid caches its numeric string so repeated misses don't
/// re-trigger the system lookup.
pub struct UserCache {
    map: RwLock<HashMap<u32, String>>,
}

impl UserCache {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn username(&self, uid: u32) -> String {
        if let Some(name) = self.map.read().unwrap().get(&uid) {
            return name.clone();
        }

        let name = users::get_user_by_uid(uid)
            .map(|user| user.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| uid.to_string());

        self.map.write().unwrap().insert(uid, name.clone());
        name
    }

    pub fn clear(&self) {
        self.map.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the inode index for one poll.
///
/// Only a failure to enumerate the process namespace itself is an error;
/// everything below that degrades per pid.
pub fn build(user_cache: &UserCache) -> Result<InodeIndex> {
    let start = Instant::now();
    let pids = list_pids()?;

    let (pid_tx, pid_rx) = channel::unbounded::<u32>();
    let (batch_tx, batch_rx) = channel::unbounded::<Vec<(u64, Arc<ProcessRecord>)>>();

    for pid in &pids {
        let _ = pid_tx.send(*pid);
    }
    drop(pid_tx);

    let index = thread::scope(|scope| {
        for _ in 0..INDEX_WORKERS {
            let pid_rx = pid_rx.clone();
            let batch_tx = batch_tx.clone();
            scope.spawn(move || {
                for pid in pid_rx.iter() {
                    let batch = scan_process_sockets(pid, user_cache);
                    if !batch.is_empty() {
                        let _ = batch_tx.send(batch);
                    }
                }
            });
        }
        // The aggregator owns the map exclusively; workers only ever touch
        // their output channel. Receiving ends once all senders are gone.
        drop(batch_tx);

        let mut index = InodeIndex::new();
        for batch in batch_rx.iter() {
            for (inode, record) in batch {
                index.insert(inode, record);
            }
        }
        index
    });

    debug!(
        "inode index: {} pids scanned, {} inodes in {:?}",
        pids.len(),
        index.len(),
        start.elapsed(),
    );
    Ok(index)
}

/// Candidate pid set: numeric directory names under /proc.
fn list_pids() -> Result<Vec<u32>> {
    let entries = fs::read_dir("/proc").map_err(NetpeekError::ProcScan)?;

    let mut pids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(NetpeekError::ProcScan)?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() {
            pids.push(pid);
        }
    }
    Ok(pids)
}

/// Scan one process: read its attribution record, then collect an
/// `(inode, record)` pair for every socket descriptor it holds open.
/// Any failure yields an empty batch.
fn scan_process_sockets(pid: u32, user_cache: &UserCache) -> Vec<(u64, Arc<ProcessRecord>)> {
    let process = match Process::new(pid as i32) {
        Ok(process) => process,
        Err(_) => return Vec::new(),
    };

    let record = match read_process_record(&process, user_cache) {
        Some(record) => Arc::new(record),
        None => return Vec::new(),
    };

    let fds = match process.fd() {
        Ok(fds) => fds,
        Err(_) => return Vec::new(),
    };

    let mut batch = Vec::new();
    for fd in fds {
        let fd = match fd {
            Ok(fd) => fd,
            Err(_) => continue,
        };
        if let FDTarget::Socket(inode) = fd.target {
            batch.push((inode, Arc::clone(&record)));
        }
    }
    batch
}

/// Read one process's attribution record.
///
/// The short name comes from the status file, falling back to the first
/// argv element's basename. A process whose name cannot be determined at
/// all contributes nothing; a missing status alone only loses uid/user.
fn read_process_record(process: &Process, user_cache: &UserCache) -> Option<ProcessRecord> {
    let status = process.status().ok();

    let mut command = status
        .as_ref()
        .map(|s| s.name.trim().to_string())
        .unwrap_or_default();
    if command.is_empty() {
        command = command_from_cmdline(process)?;
    }

    let uid = status.as_ref().map(|s| s.ruid);
    let username = uid.map(|uid| user_cache.username(uid));

    Some(ProcessRecord {
        pid: process.pid as u32,
        command,
        uid,
        username,
    })
}

fn command_from_cmdline(process: &Process) -> Option<String> {
    let args = process.cmdline().ok()?;
    let first = args.first()?;
    let base = Path::new(first).file_name()?.to_string_lossy();
    // Some argv[0] values embed a full invocation; keep the first token.
    let token = base.split_whitespace().next()?;
    Some(token.to_string())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
