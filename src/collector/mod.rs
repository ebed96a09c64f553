//! Connection discovery: socket table parsing, process attribution, and
//! the per-poll assembler tying them together.

mod interface;
pub mod procnet;
pub mod process_index;

use std::time::Instant;

use log::debug;

use crate::error::Result;
use crate::model::Connection;
use interface::InterfaceTable;
use process_index::{InodeIndex, UserCache};

/// Produces one combined snapshot of the host's sockets per [`collect`]
/// call. The uid->username cache is the only state carried across polls.
///
/// [`collect`]: Collector::collect
pub struct Collector {
    user_cache: UserCache,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            user_cache: UserCache::new(),
        }
    }

    /// One full poll: build the inode index, parse the four inet tables,
    /// merge attribution by inode, tag local interfaces, and append the
    /// unix domain sockets.
    ///
    /// A missing table degrades to an emptier snapshot; only a failure to
    /// enumerate the process namespace is an error, since without it no
    /// attribution is possible.
    pub fn collect(&self) -> Result<Vec<Connection>> {
        let start = Instant::now();

        let index = process_index::build(&self.user_cache)?;

        let mut connections = procnet::parse_all();
        attribute(&mut connections, &index);

        let interfaces = InterfaceTable::load();
        for conn in &mut connections {
            conn.interface = interfaces.name_for(&conn.local_addr);
        }

        connections.extend(procnet::read_unix_table(procnet::UNIX_TABLE));

        debug!(
            "collect: {} connections in {:?}",
            connections.len(),
            start.elapsed(),
        );
        Ok(connections)
    }

    /// Drop all cached uid->username entries. Operational knob; the cache
    /// refills on the next poll.
    #[allow(dead_code)]
    pub fn clear_user_cache(&self) {
        self.user_cache.clear();
    }

    #[allow(dead_code)]
    pub fn user_cache_size(&self) -> usize {
        self.user_cache.len()
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge process attribution into the parsed connections. Records whose
/// inode is absent from the index stay orphaned.
fn attribute(connections: &mut [Connection], index: &InodeIndex) {
    for conn in connections {
        if conn.inode == 0 {
            continue;
        }
        if let Some(record) = index.get(&conn.inode) {
            conn.pid = Some(record.pid);
            conn.process = Some(record.command.clone());
            conn.uid = record.uid;
            conn.user = record.username.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
