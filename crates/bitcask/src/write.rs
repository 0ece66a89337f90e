//! Write path: `put()`, `delete()`, and `sync()`.
//!
//! All mutations flow through this module. A record is appended to the
//! active file first (rotating when the append would push the file past
//! the size cap); only after the append returns is the key directory
//! updated, so a failed append leaves the directory untouched.

use codec::{MAX_KEY_SIZE, MAX_VALUE_SIZE, TOMBSTONE};
use keydir::Locator;

use crate::error::BitcaskError;
use crate::Bitcask;

impl Bitcask {
    /// Stores `value` under `key`.
    ///
    /// Assigns a microsecond timestamp, appends the encoded record to the
    /// active file, then points the directory at the new value. Flushes
    /// before returning when the handle was opened with `SyncOnPut`.
    ///
    /// # Errors
    ///
    /// [`BitcaskError::WriteDenied`] on a read-only handle;
    /// [`BitcaskError::InvalidKey`] / [`BitcaskError::ValueTooLarge`] for
    /// arguments the on-disk format cannot carry.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), BitcaskError> {
        if !self.read_write {
            return Err(BitcaskError::WriteDenied);
        }
        validate_key(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(BitcaskError::ValueTooLarge);
        }

        let tstamp = self.clock.tick();
        let record = codec::encode_record(key, value, tstamp);
        let (file_id, record_start) = self.append_record(&record)?;

        self.keydir.insert(
            key.to_vec(),
            Locator {
                file_id,
                value_size: value.len() as u64,
                value_pos: codec::value_pos(record_start, key.len()),
                tstamp,
            },
        );

        if self.sync_on_put {
            self.sync_active()?;
        }
        Ok(())
    }

    /// Removes `key` from the store.
    ///
    /// Appends a tombstone record so the deletion survives restart, then
    /// removes the key from the directory. The shadowed records are
    /// reclaimed at the next merge.
    ///
    /// # Errors
    ///
    /// [`BitcaskError::WriteDenied`] on a read-only handle;
    /// [`BitcaskError::KeyDoesNotExist`] if the key is absent.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), BitcaskError> {
        if !self.read_write {
            return Err(BitcaskError::WriteDenied);
        }
        if !self.keydir.contains_key(key) {
            return Err(BitcaskError::key_not_found(key));
        }

        let tstamp = self.clock.tick();
        let record = codec::encode_record(key, TOMBSTONE, tstamp);
        self.append_record(&record)?;
        self.keydir.remove(key);

        if self.sync_on_put {
            self.sync_active()?;
        }
        Ok(())
    }

    /// Forces every accepted put to disk.
    ///
    /// # Errors
    ///
    /// [`BitcaskError::WriteDenied`] on a read-only handle. A failed sync
    /// leaves the pending state in place; the next call retries.
    pub fn sync(&mut self) -> Result<(), BitcaskError> {
        if !self.read_write {
            return Err(BitcaskError::WriteDenied);
        }
        self.sync_active()?;
        Ok(())
    }

    /// Appends an encoded record (newline added here), rotating the active
    /// file first when the append would exceed the size cap. Returns the
    /// file id and the record's start offset within it.
    pub(crate) fn append_record(&mut self, record: &[u8]) -> Result<(u64, u64), BitcaskError> {
        let record_len = record.len() as u64 + 1;
        let roll = match &self.active {
            Some(active) => active.size + record_len > self.max_file_size,
            None => true,
        };
        if roll {
            self.roll_active_file()?;
        }

        // roll_active_file always leaves an active file in place
        let active = self.active.as_mut().ok_or(BitcaskError::WriteDenied)?;
        let record_start = active.pos;
        active.append(record)?;
        Ok((active.id, record_start))
    }

    pub(crate) fn sync_active(&mut self) -> Result<(), BitcaskError> {
        if let Some(active) = self.active.as_mut() {
            active.sync()?;
        }
        Ok(())
    }
}

fn validate_key(key: &[u8]) -> Result<(), BitcaskError> {
    if key.is_empty() || key.len() > MAX_KEY_SIZE || key.contains(&b'\n') {
        return Err(BitcaskError::InvalidKey);
    }
    Ok(())
}
