//! Merge: rewrites the live key set into compact (data, hint) file pairs
//! and removes the files they replace.
//!
//! Tombstones and shadowed values are never rewritten because the merge
//! walks the key directory, which holds only live keys. Keys whose latest
//! value sits in the active file keep their locators unchanged; the active
//! file itself is never touched.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use keydir::{KeyDir, Locator};

use crate::datafile::{self, HINT_PREFIX};
use crate::error::BitcaskError;
use crate::Bitcask;

impl Bitcask {
    /// Compacts the store into fresh data files with hint companions.
    ///
    /// # Algorithm
    ///
    /// 1. Sync the active file.
    /// 2. Snapshot the set of existing files, excluding the active file;
    ///    these are removed at the end.
    /// 3. For every key whose value is outside the active file: read the
    ///    value, re-encode it with a fresh timestamp, and append it to the
    ///    merge file (rotating to a new pair under the usual size cap),
    ///    mirroring each record with a hint line.
    /// 4. Copy active-file locators unchanged.
    /// 5. Swap in the new directory, then delete the old files (hidden
    ///    lock markers excepted).
    ///
    /// A merge that fails midway leaves partial pairs behind; they are
    /// never referenced and a later merge removes them.
    ///
    /// # Errors
    ///
    /// [`BitcaskError::WriteDenied`] on a read-only handle;
    /// [`BitcaskError::Io`] on any read or write failure.
    pub fn merge(&mut self) -> Result<(), BitcaskError> {
        if !self.read_write {
            return Err(BitcaskError::WriteDenied);
        }
        self.sync_active()?;

        let active_id = match &self.active {
            Some(active) => active.id,
            None => return Err(BitcaskError::WriteDenied),
        };
        let active_name = datafile::file_name(active_id);

        // Snapshot before creating merge outputs so they are not listed.
        let old_files: Vec<String> = datafile::list_entries(&self.dir)?
            .into_iter()
            .filter(|name| *name != active_name)
            .collect();

        let mut out = MergePair::create(&self.dir, self.clock.tick())?;
        let mut new_keydir = KeyDir::new();

        let entries: Vec<(Vec<u8>, Locator)> = self
            .keydir
            .iter()
            .map(|(key, loc)| (key.clone(), *loc))
            .collect();

        for (key, loc) in entries {
            if loc.file_id == active_id {
                new_keydir.insert(key, loc);
                continue;
            }

            let value = datafile::read_value(&self.dir, loc.file_id, loc.value_pos, loc.value_size)?;
            let tstamp = self.clock.tick();
            let record = codec::encode_record(&key, &value, tstamp);

            if out.size + record.len() as u64 + 1 > self.max_file_size {
                out.finish()?;
                out = MergePair::create(&self.dir, self.clock.tick())?;
            }

            let new_loc = Locator {
                file_id: out.id,
                value_size: value.len() as u64,
                value_pos: codec::value_pos(out.pos, key.len()),
                tstamp,
            };
            out.append(
                &record,
                &codec::encode_hint(&key, tstamp, new_loc.value_size, new_loc.value_pos),
            )?;
            new_keydir.insert(key, new_loc);
        }

        out.finish()?;
        self.keydir = new_keydir;

        for name in &old_files {
            if !name.starts_with('.') {
                // a concurrent reader may already have removed its snapshot
                let _ = fs::remove_file(self.dir.join(name));
            }
        }
        Ok(())
    }
}

/// A (data, hint) output pair under construction during a merge.
struct MergePair {
    data: File,
    hint: File,
    data_path: PathBuf,
    hint_path: PathBuf,
    id: u64,
    /// Start offset of the next record in the data file.
    pos: u64,
    size: u64,
}

impl MergePair {
    fn create(dir: &Path, id: u64) -> io::Result<Self> {
        let data_path = dir.join(datafile::file_name(id));
        let hint_path = dir.join(format!("{}{}", HINT_PREFIX, datafile::file_name(id)));
        Ok(Self {
            data: datafile::open_append(&data_path)?,
            hint: datafile::open_append(&hint_path)?,
            data_path,
            hint_path,
            id,
            pos: 0,
            size: 0,
        })
    }

    fn append(&mut self, record: &[u8], hint_line: &[u8]) -> io::Result<()> {
        self.data.write_all(record)?;
        self.data.write_all(b"\n")?;
        self.hint.write_all(hint_line)?;
        self.hint.write_all(b"\n")?;
        let written = record.len() as u64 + 1;
        self.pos += written;
        self.size += written;
        Ok(())
    }

    /// Seals the pair. An empty pair (nothing was merged into it) is
    /// deleted instead of leaving zero-length files around.
    fn finish(self) -> io::Result<()> {
        if self.size == 0 {
            drop(self.data);
            drop(self.hint);
            fs::remove_file(&self.data_path)?;
            fs::remove_file(&self.hint_path)?;
            return Ok(());
        }
        self.data.sync_all()?;
        self.hint.sync_all()?;
        Ok(())
    }
}
