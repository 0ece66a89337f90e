//! The cold-start path: lock check, key-directory rebuild, lock install,
//! and active-file creation.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use codec::{CodecError, LogReader, TOMBSTONE};
use keydir::{KeyDir, KeyDirBuilder, Locator};

use crate::clock::MicroClock;
use crate::datafile::{self, HINT_PREFIX, SNAPSHOT_PREFIX};
use crate::error::BitcaskError;
use crate::locks::{self, LockState, READ_LOCK, WRITE_LOCK};
use crate::snapshot;
use crate::{Bitcask, ConfigOpt, DEFAULT_MAX_FILE_SIZE};

impl Bitcask {
    /// Opens (or, with `ReadWrite`, creates) the store at `path`.
    ///
    /// # Options
    ///
    /// See [`ConfigOpt`]; defaults are `ReadOnly` + `SyncOnDemand`.
    ///
    /// # Errors
    ///
    /// - [`BitcaskError::WriterExists`] - another writer holds the store.
    /// - [`BitcaskError::CannotCreate`] - read-only open of a path that
    ///   does not exist.
    /// - [`BitcaskError::CannotOpen`] - the path exists but cannot be
    ///   listed.
    /// - [`BitcaskError::BadFormat`] - a corrupt record or foreign file
    ///   encountered during the rebuild scan.
    pub fn open<P: AsRef<Path>>(path: P, opts: &[ConfigOpt]) -> Result<Self, BitcaskError> {
        let dir = path.as_ref().to_path_buf();

        let mut read_write = false;
        let mut sync_on_put = false;
        for opt in opts {
            match opt {
                ConfigOpt::ReadWrite => read_write = true,
                ConfigOpt::ReadOnly => read_write = false,
                ConfigOpt::SyncOnPut => sync_on_put = true,
                ConfigOpt::SyncOnDemand => sync_on_put = false,
            }
        }

        match datafile::list_entries(&dir) {
            Ok(names) => Self::open_existing(dir, names, read_write, sync_on_put),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !read_write {
                    return Err(BitcaskError::CannotCreate);
                }
                Self::create_new(dir, sync_on_put)
            }
            Err(_) => Err(BitcaskError::CannotOpen(dir.display().to_string())),
        }
    }

    fn open_existing(
        dir: PathBuf,
        names: Vec<String>,
        read_write: bool,
        sync_on_put: bool,
    ) -> Result<Self, BitcaskError> {
        let lock_state = locks::check(&names);
        if lock_state == LockState::Writer {
            return Err(BitcaskError::WriterExists);
        }

        let mut clock = MicroClock::new();

        // Reader fast path: another reader has already prepared a snapshot.
        // A readlock without a snapshot (crashed reader) falls back to the
        // full scan.
        let prior_snapshot = names
            .iter()
            .find(|n| n.starts_with(SNAPSHOT_PREFIX))
            .cloned();
        let keydir = match prior_snapshot {
            Some(ref snap) if !read_write && lock_state == LockState::Reader => {
                snapshot::read_snapshot(&dir, snap)?
            }
            _ => scan_store(&dir, &names, &mut clock)?,
        };

        let mut cask = Bitcask {
            dir,
            keydir,
            active: None,
            lock_name: String::new(),
            snapshot_name: None,
            clock,
            read_write,
            sync_on_put,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            closed: false,
        };

        if read_write {
            let ts = cask.clock.tick();
            cask.lock_name = locks::install(&cask.dir, WRITE_LOCK, ts)?;
            cask.roll_active_file()?;
        } else {
            let ts = cask.clock.tick();
            cask.snapshot_name = Some(snapshot::write_snapshot(&cask.dir, &cask.keydir, ts)?);
            let ts = cask.clock.tick();
            cask.lock_name = locks::install(&cask.dir, READ_LOCK, ts)?;
        }
        Ok(cask)
    }

    fn create_new(dir: PathBuf, sync_on_put: bool) -> Result<Self, BitcaskError> {
        datafile::create_store_dir(&dir)?;

        let mut cask = Bitcask {
            dir,
            keydir: KeyDir::new(),
            active: None,
            lock_name: String::new(),
            snapshot_name: None,
            clock: MicroClock::new(),
            read_write: true,
            sync_on_put,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            closed: false,
        };

        cask.roll_active_file()?;
        let ts = cask.clock.tick();
        cask.lock_name = locks::install(&cask.dir, WRITE_LOCK, ts)?;
        Ok(cask)
    }

    /// Opens a fresh active data file named by the next clock tick.
    pub(crate) fn roll_active_file(&mut self) -> Result<(), BitcaskError> {
        let id = self.clock.tick();
        self.active = Some(datafile::ActiveFile::create(&self.dir, id)?);
        Ok(())
    }
}

/// Rebuilds the key directory from hint and data files.
///
/// Files are walked in ascending id order; where a hint file exists only
/// the hint is read. Conflicts across files resolve by record timestamp
/// (the builder keeps the newest event per key), which stays correct even
/// when a merge file with a higher id holds records older than those in a
/// lower-id file that was active while the merge ran.
///
/// The clock is seeded past every file id and record timestamp observed,
/// so later writes always compare newer.
fn scan_store(
    dir: &Path,
    names: &[String],
    clock: &mut MicroClock,
) -> Result<KeyDir, BitcaskError> {
    let mut hint_names: HashMap<u64, String> = HashMap::new();
    let mut data_ids: BTreeSet<u64> = BTreeSet::new();

    for name in names {
        // Lock markers and reader snapshots are not data.
        if name.starts_with('.') || name.starts_with(SNAPSHOT_PREFIX) {
            continue;
        }
        if let Some(id_str) = name.strip_prefix(HINT_PREFIX) {
            let id = parse_file_id(id_str)?;
            hint_names.insert(id, name.clone());
        } else {
            data_ids.insert(parse_file_id(name)?);
        }
    }

    let mut builder = KeyDirBuilder::new();
    let mut max_id = 0u64;

    for &id in &data_ids {
        max_id = max_id.max(id);
        match hint_names.get(&id) {
            Some(hint) => scan_hint_file(dir, hint, id, &mut builder)?,
            None => scan_data_file(dir, id, &mut builder)?,
        }
    }

    clock.advance_past(max_id);
    clock.advance_past(builder.max_tstamp());
    Ok(builder.finish())
}

fn parse_file_id(name: &str) -> Result<u64, BitcaskError> {
    name.parse::<u64>()
        .map_err(|_| BitcaskError::BadFormat(CodecError::BadFormat))
}

fn scan_hint_file(
    dir: &Path,
    name: &str,
    file_id: u64,
    builder: &mut KeyDirBuilder,
) -> Result<(), BitcaskError> {
    let data = std::fs::read(dir.join(name))?;
    // only complete lines; a crash mid-merge may have cut the last one short
    for line in datafile::complete_lines(&data) {
        let entry = codec::decode_hint(line)?;
        builder.apply_put(
            &entry.key,
            Locator {
                file_id,
                value_size: entry.value_size,
                value_pos: entry.value_pos,
                tstamp: entry.tstamp,
            },
        );
    }
    Ok(())
}

fn scan_data_file(dir: &Path, file_id: u64, builder: &mut KeyDirBuilder) -> Result<(), BitcaskError> {
    let mut reader = LogReader::open(dir.join(datafile::file_name(file_id)))?;
    reader.replay(|offset, rec| {
        if rec.value == TOMBSTONE {
            builder.apply_delete(&rec.key, rec.tstamp);
        } else {
            builder.apply_put(
                &rec.key,
                Locator {
                    file_id,
                    value_size: rec.value.len() as u64,
                    value_pos: codec::value_pos(offset, rec.key.len()),
                    tstamp: rec.tstamp,
                },
            );
        }
    })?;
    Ok(())
}
