//! Reader-private key-directory snapshot files.
//!
//! After building its directory a reader serializes it to a fresh
//! `keydir<ts>` file so that the next read-only open can skip the data
//! files entirely. The file is transient: each reader removes its own on
//! close. Writers never create or consume snapshots.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use keydir::{KeyDir, Locator};

use crate::datafile::{self, SNAPSHOT_PREFIX};
use crate::error::BitcaskError;

/// Serializes the directory to `keydir<tstamp>`, returning the file name.
pub(crate) fn write_snapshot(
    dir: &Path,
    keydir: &KeyDir,
    tstamp: u64,
) -> Result<String, BitcaskError> {
    let name = format!("{}{}", SNAPSHOT_PREFIX, datafile::file_name(tstamp));
    let file = datafile::open_append(&dir.join(&name))?;
    let mut w = BufWriter::new(file);
    for (key, loc) in keydir.iter() {
        let line = codec::encode_snapshot(key, loc.file_id, loc.value_size, loc.value_pos, loc.tstamp);
        w.write_all(&line)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(name)
}

/// Rebuilds a directory from a snapshot file written by another reader.
pub(crate) fn read_snapshot(dir: &Path, name: &str) -> Result<KeyDir, BitcaskError> {
    let data = fs::read(dir.join(name))?;
    let mut keydir = KeyDir::new();
    for line in datafile::complete_lines(&data) {
        let entry = codec::decode_snapshot(line)?;
        keydir.insert(
            entry.key,
            Locator {
                file_id: entry.file_id,
                value_size: entry.value_size,
                value_pos: entry.value_pos,
                tstamp: entry.tstamp,
            },
        );
    }
    Ok(keydir)
}
