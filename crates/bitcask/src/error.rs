use codec::CodecError;
use std::io;
use thiserror::Error;

/// Errors surfaced by store operations.
///
/// The display strings are a compatibility surface; callers match on them,
/// so they must not change.
#[derive(Debug, Error)]
pub enum BitcaskError {
    /// Lookup or delete on an absent key. Carries the key rendered
    /// lossily for the message prefix.
    #[error("{0}: key does not exist")]
    KeyDoesNotExist(String),

    /// Mutating operation on a read-only handle.
    #[error("write permission denied")]
    WriteDenied,

    /// Read-only open against a directory that does not exist.
    #[error("read only cannot create new bitcask directory")]
    CannotCreate,

    /// Open while another writer holds the store.
    #[error("another writer exists in this bitcask")]
    WriterExists,

    /// The directory exists but cannot be read. Carries the path for the
    /// message prefix.
    #[error("{0}: cannot open this directory")]
    CannotOpen(String),

    /// A key rejected at the API boundary: empty, above
    /// [`MAX_KEY_SIZE`](crate::MAX_KEY_SIZE), or containing the record
    /// delimiter.
    #[error("key must be non-empty, within the key size cap, and must not contain a newline")]
    InvalidKey,

    /// A value larger than [`MAX_VALUE_SIZE`](crate::MAX_VALUE_SIZE).
    #[error("value exceeds the maximum value size")]
    ValueTooLarge,

    /// A corrupt record or file name encountered during a scan.
    #[error("corrupt store: {0}")]
    BadFormat(CodecError),

    /// A lower-level read/write/flush failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for BitcaskError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => BitcaskError::Io(io),
            other => BitcaskError::BadFormat(other),
        }
    }
}

impl BitcaskError {
    pub(crate) fn key_not_found(key: &[u8]) -> Self {
        BitcaskError::KeyDoesNotExist(String::from_utf8_lossy(key).into_owned())
    }
}
