//! Active-file lifecycle, positional value reads, and directory listing.
//!
//! Data files are named by their id rendered as a 19-digit zero-padded
//! decimal. Hint files prepend `hintfile` to the paired data file's name,
//! snapshots prepend `keydir`. Everything beginning with `.` is a lock
//! marker and never data.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Prefix of a hint file's name; the remainder is the paired data file id.
pub(crate) const HINT_PREFIX: &str = "hintfile";

/// Prefix of a reader's key-directory snapshot file.
pub(crate) const SNAPSHOT_PREFIX: &str = "keydir";

/// Renders a file id as its on-disk file name.
pub(crate) fn file_name(id: u64) -> String {
    format!("{:019}", id)
}

/// Opens (or creates) a store file for appending, mode 0666 on Unix.
pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o666);
    }
    opts.open(path)
}

/// Creates the store directory (and parents), mode 0777 on Unix.
#[cfg(unix)]
pub(crate) fn create_store_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o777).create(path)
}

#[cfg(not(unix))]
pub(crate) fn create_store_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Lists the store directory's entry names. Entries whose names are not
/// valid UTF-8 cannot be store files and are skipped.
pub(crate) fn list_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    Ok(names)
}

/// Splits `data` into newline-terminated lines, dropping empty lines and a
/// partial tail left by a crash mid-write.
pub(crate) fn complete_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let end = data
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    data[..end].split(|&b| b == b'\n').filter(|l| !l.is_empty())
}

/// Reads exactly `len` bytes at `pos` from the identified data file. The
/// file is opened for the read and closed when this returns.
pub(crate) fn read_value(dir: &Path, file_id: u64, pos: u64, len: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(dir.join(file_name(file_id)))?;
    file.seek(SeekFrom::Start(pos))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// The single data file a writer appends to.
///
/// Created on open and on rotation, written only by its creator, sealed
/// (dropped) on rotation and close.
#[derive(Debug)]
pub(crate) struct ActiveFile {
    file: File,
    pub id: u64,
    /// Byte offset at which the next record will start.
    pub pos: u64,
    /// Bytes written so far; rotation compares this against the cap.
    pub size: u64,
}

impl ActiveFile {
    pub fn create(dir: &Path, id: u64) -> io::Result<Self> {
        let file = open_append(&dir.join(file_name(id)))?;
        Ok(Self {
            file,
            id,
            pos: 0,
            size: 0,
        })
    }

    /// Appends `record` plus the terminating newline, returning the number
    /// of bytes written.
    pub fn append(&mut self, record: &[u8]) -> io::Result<u64> {
        self.file.write_all(record)?;
        self.file.write_all(b"\n")?;
        let written = record.len() as u64 + 1;
        self.pos += written;
        self.size += written;
        Ok(written)
    }

    /// Forces appended records to disk via `sync_all` (fsync).
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}
