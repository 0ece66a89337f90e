//! # Bitcask - log-structured key-value store
//!
//! An embeddable, persistent key-value store on the Bitcask model: values
//! are appended to immutable data files on disk while an in-memory key
//! directory maps each key to the location of its latest value.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                  BITCASK                      │
//! │                                               │
//! │ write.rs → encode record → active file append │
//! │              |                                │
//! │              |  (file would exceed max size?) │
//! │              |            yes                 │
//! │              v                                │
//! │           rotate → new active file            │
//! │                                               │
//! │ read.rs  → key directory → positional read    │
//! │                                               │
//! │ merge.rs → rewrite live keys into compact     │
//! │            (data, hint) file pairs            │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                                |
//! |---------------|--------------------------------------------------------|
//! | [`lib.rs`]    | `Bitcask` struct, options, accessors, `Debug`, `Drop`  |
//! | [`open`]      | lock check, directory rebuild, snapshot fast path      |
//! | [`write`]     | `put()`, `delete()`, `sync()`, rotation                |
//! | [`read`]      | `get()`, `list_keys()`, `fold()`                       |
//! | [`merge`]     | compaction into fresh data + hint file pairs           |
//! | [`locks`]     | cooperative `.readlock`/`.writelock` marker files      |
//! | [`snapshot`]  | reader-private key-directory snapshot files            |
//! | [`datafile`]  | active-file lifecycle, positional reads, listing       |
//! | [`clock`]     | per-handle monotonic microsecond clock                 |
//!
//! ## Crash Safety
//!
//! Every record is appended before the key directory is updated, so a
//! failed append leaves the directory untouched. A crash mid-append leaves
//! a partial record at the file tail; the rebuild replays complete records
//! and drops the tail. The lock protocol is advisory and cooperative:
//! marker files left behind by a crashed process are not cleaned up
//! automatically.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bitcask::{Bitcask, ConfigOpt};
//!
//! let mut store = Bitcask::open("/tmp/db", &[ConfigOpt::ReadWrite]).unwrap();
//! store.put(b"key", b"value").unwrap();
//! assert_eq!(store.get(b"key").unwrap(), b"value");
//! store.close().unwrap();
//! ```
mod clock;
mod datafile;
mod error;
mod locks;
mod merge;
mod open;
mod read;
mod snapshot;
mod write;

pub use codec::{MAX_KEY_SIZE, MAX_VALUE_SIZE, TOMBSTONE};
pub use error::BitcaskError;

use clock::MicroClock;
use datafile::ActiveFile;
use keydir::KeyDir;
use std::path::PathBuf;

/// Default cap on a data file's size in bytes. Tune per handle with
/// [`Bitcask::set_max_file_size`]; the cap affects file count, not
/// correctness.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024;

/// Options accepted by [`Bitcask::open`].
///
/// `ReadOnly`/`ReadWrite` and `SyncOnPut`/`SyncOnDemand` are two
/// independent pairs; within each pair the last option given wins.
/// Defaults are `ReadOnly` and `SyncOnDemand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOpt {
    /// Open for reading only. Mutating operations fail with
    /// [`BitcaskError::WriteDenied`].
    ReadOnly,
    /// Open for reading and writing. At most one writer per store.
    ReadWrite,
    /// Flush the active file after every put.
    SyncOnPut,
    /// Defer flushes until an explicit [`Bitcask::sync`].
    SyncOnDemand,
}

/// A handle onto a bitcask store directory.
///
/// # Write Path
///
/// 1. Assign a microsecond timestamp from the handle clock.
/// 2. Encode the record; rotate the active file first if the append would
///    push it past the size cap.
/// 3. Append, then point the key directory at the new value.
/// 4. Flush if opened with `SyncOnPut`.
///
/// # Read Path
///
/// Look up the locator, open the identified data file, read exactly
/// `value_size` bytes at `value_pos`, close the file.
///
/// # Recovery
///
/// On open the key directory is rebuilt from hint files where present and
/// data files otherwise; a read-only handle that finds another reader's
/// snapshot loads it instead of scanning.
pub struct Bitcask {
    pub(crate) dir: PathBuf,
    pub(crate) keydir: KeyDir,
    /// `Some` only on a writer handle; rotation swaps in a fresh file.
    pub(crate) active: Option<ActiveFile>,
    /// Name of this handle's lock marker file.
    pub(crate) lock_name: String,
    /// Name of this handle's snapshot file (readers only).
    pub(crate) snapshot_name: Option<String>,
    pub(crate) clock: MicroClock,
    pub(crate) read_write: bool,
    pub(crate) sync_on_put: bool,
    pub(crate) max_file_size: u64,
    pub(crate) closed: bool,
}

impl std::fmt::Debug for Bitcask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitcask")
            .field("dir", &self.dir)
            .field("read_write", &self.read_write)
            .field("sync_on_put", &self.sync_on_put)
            .field("max_file_size", &self.max_file_size)
            .field("keys", &self.keydir.len())
            .field("active_file_id", &self.active.as_ref().map(|a| a.id))
            .finish()
    }
}

impl Bitcask {
    /// Returns the number of keys currently mapped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keydir.len()
    }

    /// Returns `true` when no keys are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keydir.is_empty()
    }

    /// Returns the current data-file size cap in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Updates the data-file size cap. Affects subsequent appends and
    /// merges; already-written files are left as they are.
    pub fn set_max_file_size(&mut self, max: u64) {
        self.max_file_size = max;
    }

    /// Flushes pending writes, releases this handle's lock, and for a
    /// reader removes its snapshot file.
    ///
    /// Consumes the handle: a closed store cannot be used again.
    pub fn close(mut self) -> Result<(), BitcaskError> {
        self.teardown()
    }

    pub(crate) fn teardown(&mut self) -> Result<(), BitcaskError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.read_write {
            self.sync_active()?;
            // drop the handle before removing the lock
            self.active = None;
        } else if let Some(name) = self.snapshot_name.take() {
            // a writer's merge may have removed the snapshot already
            match std::fs::remove_file(self.dir.join(name)) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        // empty when open failed before its lock was installed
        if self.lock_name.is_empty() {
            return Ok(());
        }
        match locks::remove(&self.dir, &self.lock_name) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Best-effort teardown on drop.
///
/// A handle that goes out of scope without [`Bitcask::close`] still
/// flushes and releases its lock and snapshot. Errors are ignored because
/// Drop cannot propagate them; a lock left behind by a hard crash is the
/// documented limitation of the cooperative protocol.
impl Drop for Bitcask {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod tests;
