//! # Codec - on-disk record formats
//!
//! Every file the store writes is a sequence of newline-terminated records
//! whose integer fields are zero-padded 19-character decimals, so a record is
//! plain ASCII up to the key/value payload and can be inspected with any
//! text tool.
//!
//! ## Data-file record
//!
//! ```text
//! [tstamp:19][key_size:19][value_size:19][key bytes][value bytes]\n
//! ```
//!
//! ## Hint-file record
//!
//! ```text
//! [tstamp:19][key_size:19][value_size:19][value_pos:19][key bytes]\n
//! ```
//!
//! ## Key-directory snapshot record
//!
//! ```text
//! [file_id:19][value_size:19][value_pos:19][tstamp:19][key_size:19][key bytes]\n
//! ```
//!
//! Values may contain any byte including `\n`; replay is length-directed, so
//! the embedded newline never terminates a record early. Keys must not
//! contain `\n` (hint and snapshot lines carry the key last and are parsed
//! by length as well, but the constraint keeps every file splittable by eye).
//!
//! ## Example
//!
//! ```rust,no_run
//! use codec::{encode_record, LogReader};
//!
//! let bytes = encode_record(b"hello", b"world", 1);
//! let mut r = LogReader::open("0000000000000000001").unwrap();
//! r.replay(|offset, rec| println!("{} {:?}", offset, rec.key)).unwrap();
//! ```

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use thiserror::Error;

/// Width of every encoded integer field, in characters.
pub const FIELD_WIDTH: usize = 19;

/// Number of fixed fields preceding the key in a data-file record.
pub const STATIC_FIELDS: usize = 3;

/// Byte length of a data-file record header (`tstamp`, `key_size`,
/// `value_size`).
pub const RECORD_HEADER: usize = STATIC_FIELDS * FIELD_WIDTH;

/// Sentinel value marking a logical deletion in the log.
pub const TOMBSTONE: &[u8] = b"DELETE THIS VALUE";

/// Maximum key size accepted by the store (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Maximum value size accepted by the store (10 MiB).
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// A decoded data-file record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    /// Microsecond timestamp assigned at write time.
    pub tstamp: u64,
    /// The lookup key.
    pub key: Vec<u8>,
    /// The payload value.
    pub value: Vec<u8>,
}

/// A decoded hint-file entry. Pairs with one record in the hint's data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintEntry {
    pub tstamp: u64,
    pub value_size: u64,
    pub value_pos: u64,
    pub key: Vec<u8>,
}

/// A decoded key-directory snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub file_id: u64,
    pub value_size: u64,
    pub value_pos: u64,
    pub tstamp: u64,
    pub key: Vec<u8>,
}

/// Errors produced while encoding or decoding records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A field was not a 19-digit decimal, or the record length did not
    /// match its declared sizes.
    #[error("bad record format")]
    BadFormat,

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Byte offset of the value within a record appended at `record_start`.
///
/// The value begins after the three fixed fields and the key bytes.
pub fn value_pos(record_start: u64, key_len: usize) -> u64 {
    record_start + RECORD_HEADER as u64 + key_len as u64
}

fn push_field(buf: &mut Vec<u8>, mut n: u64) {
    let mut field = [b'0'; FIELD_WIDTH];
    let mut i = FIELD_WIDTH;
    loop {
        i -= 1;
        field[i] += (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.extend_from_slice(&field);
}

fn parse_field(bytes: &[u8]) -> Result<u64, CodecError> {
    if bytes.len() != FIELD_WIDTH {
        return Err(CodecError::BadFormat);
    }
    let mut n: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return Err(CodecError::BadFormat);
        }
        // 19 decimal digits always fit in a u64
        n = n * 10 + (b - b'0') as u64;
    }
    Ok(n)
}

/// Encodes a data-file record. The terminating newline is appended by the
/// writer, not here.
pub fn encode_record(key: &[u8], value: &[u8], tstamp: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_HEADER + key.len() + value.len());
    push_field(&mut buf, tstamp);
    push_field(&mut buf, key.len() as u64);
    push_field(&mut buf, value.len() as u64);
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf
}

/// Decodes a data-file record from a line with its trailing newline removed.
pub fn decode_record(line: &[u8]) -> Result<DataRecord, CodecError> {
    if line.len() < RECORD_HEADER {
        return Err(CodecError::BadFormat);
    }
    let tstamp = parse_field(&line[0..FIELD_WIDTH])?;
    let key_size = parse_field(&line[FIELD_WIDTH..2 * FIELD_WIDTH])? as usize;
    let value_size = parse_field(&line[2 * FIELD_WIDTH..RECORD_HEADER])? as usize;

    if line.len() != RECORD_HEADER + key_size + value_size {
        return Err(CodecError::BadFormat);
    }
    Ok(DataRecord {
        tstamp,
        key: line[RECORD_HEADER..RECORD_HEADER + key_size].to_vec(),
        value: line[RECORD_HEADER + key_size..].to_vec(),
    })
}

/// Encodes a hint-file entry (newline appended by the writer).
pub fn encode_hint(key: &[u8], tstamp: u64, value_size: u64, value_pos: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 * FIELD_WIDTH + key.len());
    push_field(&mut buf, tstamp);
    push_field(&mut buf, key.len() as u64);
    push_field(&mut buf, value_size);
    push_field(&mut buf, value_pos);
    buf.extend_from_slice(key);
    buf
}

/// Decodes a hint-file entry from a line with its newline removed.
pub fn decode_hint(line: &[u8]) -> Result<HintEntry, CodecError> {
    const HEADER: usize = 4 * FIELD_WIDTH;
    if line.len() < HEADER {
        return Err(CodecError::BadFormat);
    }
    let tstamp = parse_field(&line[0..FIELD_WIDTH])?;
    let key_size = parse_field(&line[FIELD_WIDTH..2 * FIELD_WIDTH])? as usize;
    let value_size = parse_field(&line[2 * FIELD_WIDTH..3 * FIELD_WIDTH])?;
    let value_pos = parse_field(&line[3 * FIELD_WIDTH..HEADER])?;

    if line.len() != HEADER + key_size {
        return Err(CodecError::BadFormat);
    }
    Ok(HintEntry {
        tstamp,
        value_size,
        value_pos,
        key: line[HEADER..].to_vec(),
    })
}

/// Encodes a key-directory snapshot entry (newline appended by the writer).
pub fn encode_snapshot(
    key: &[u8],
    file_id: u64,
    value_size: u64,
    value_pos: u64,
    tstamp: u64,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 * FIELD_WIDTH + key.len());
    push_field(&mut buf, file_id);
    push_field(&mut buf, value_size);
    push_field(&mut buf, value_pos);
    push_field(&mut buf, tstamp);
    push_field(&mut buf, key.len() as u64);
    buf.extend_from_slice(key);
    buf
}

/// Decodes a key-directory snapshot entry from a line with its newline
/// removed.
pub fn decode_snapshot(line: &[u8]) -> Result<SnapshotEntry, CodecError> {
    const HEADER: usize = 5 * FIELD_WIDTH;
    if line.len() < HEADER {
        return Err(CodecError::BadFormat);
    }
    let file_id = parse_field(&line[0..FIELD_WIDTH])?;
    let value_size = parse_field(&line[FIELD_WIDTH..2 * FIELD_WIDTH])?;
    let value_pos = parse_field(&line[2 * FIELD_WIDTH..3 * FIELD_WIDTH])?;
    let tstamp = parse_field(&line[3 * FIELD_WIDTH..4 * FIELD_WIDTH])?;
    let key_size = parse_field(&line[4 * FIELD_WIDTH..HEADER])? as usize;

    if line.len() != HEADER + key_size {
        return Err(CodecError::BadFormat);
    }
    Ok(SnapshotEntry {
        file_id,
        value_size,
        value_pos,
        tstamp,
        key: line[HEADER..].to_vec(),
    })
}

/// Streaming reader over a data file.
///
/// Generic over any `Read` implementor so tests can replay from in-memory
/// buffers. Replay is length-directed: the 57-byte header declares how many
/// key and value bytes follow, so values containing `\n` are read intact.
///
/// A truncated tail (a crash cut the last record short) is treated as a
/// clean EOF; every complete record before it is still yielded.
pub struct LogReader<R: Read> {
    rdr: BufReader<R>,
    offset: u64,
}

impl LogReader<File> {
    /// Opens a data file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LogReader<File>, CodecError> {
        let f = File::open(path)?;
        Ok(LogReader {
            rdr: BufReader::new(f),
            offset: 0,
        })
    }
}

impl<R: Read> LogReader<R> {
    /// Constructs a reader from any `Read` implementor.
    pub fn from_reader(reader: R) -> Self {
        LogReader {
            rdr: BufReader::new(reader),
            offset: 0,
        }
    }

    /// Replays every complete record, calling `apply` with the byte offset
    /// at which the record starts.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** (no more bytes) -> returns `Ok(())`.
    /// - **Truncated tail** (partial header or body at end) -> returns
    ///   `Ok(())` after yielding all complete records before it.
    /// - **Non-decimal header field** -> `Err(CodecError::BadFormat)`.
    /// - **Declared sizes above the store maxima** -> `Err(CodecError::BadFormat)`.
    /// - **I/O error** -> `Err(CodecError::Io(...))`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), CodecError>
    where
        F: FnMut(u64, DataRecord),
    {
        let mut header = [0u8; RECORD_HEADER];
        // Reusable buffer for key + value + newline
        let mut body = Vec::with_capacity(256);

        loop {
            if !fill(&mut self.rdr, &mut header)? {
                return Ok(());
            }

            let tstamp = parse_field(&header[0..FIELD_WIDTH])?;
            let key_size = parse_field(&header[FIELD_WIDTH..2 * FIELD_WIDTH])? as usize;
            let value_size = parse_field(&header[2 * FIELD_WIDTH..RECORD_HEADER])? as usize;

            // Reject absurd sizes before allocating for them
            if key_size > MAX_KEY_SIZE || value_size > MAX_VALUE_SIZE {
                return Err(CodecError::BadFormat);
            }

            body.clear();
            body.resize(key_size + value_size + 1, 0);
            if !fill(&mut self.rdr, &mut body)? {
                // truncated tail, drop the partial record
                return Ok(());
            }
            if body[key_size + value_size] != b'\n' {
                return Err(CodecError::BadFormat);
            }

            apply(
                self.offset,
                DataRecord {
                    tstamp,
                    key: body[..key_size].to_vec(),
                    value: body[key_size..key_size + value_size].to_vec(),
                },
            );
            self.offset += (RECORD_HEADER + key_size + value_size + 1) as u64;
        }
    }
}

/// Reads exactly `buf.len()` bytes. Returns `Ok(false)` when EOF arrives
/// first (clean or mid-record), `Ok(true)` on a complete fill.
fn fill<R: Read>(rdr: &mut R, buf: &mut [u8]) -> Result<bool, CodecError> {
    let mut read = 0;
    while read < buf.len() {
        match rdr.read(&mut buf[read..]) {
            Ok(0) => return Ok(false),
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(true)
}
