//! Read path: `get()`, `list_keys()`, and `fold()`.
//!
//! Every read resolves through the key directory and then performs one
//! positional read against the identified data file. Reads never touch
//! the directory, so a failed read leaves the handle unchanged.

use crate::datafile;
use crate::error::BitcaskError;
use crate::Bitcask;

impl Bitcask {
    /// Retrieves the latest value for `key`.
    ///
    /// Opens the data file named by the locator, reads exactly
    /// `value_size` bytes at `value_pos`, and closes the file.
    ///
    /// # Errors
    ///
    /// [`BitcaskError::KeyDoesNotExist`] if the key is absent;
    /// [`BitcaskError::Io`] if the positional read fails.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, BitcaskError> {
        let loc = self
            .keydir
            .get(key)
            .ok_or_else(|| BitcaskError::key_not_found(key))?;
        Ok(datafile::read_value(
            &self.dir,
            loc.file_id,
            loc.value_pos,
            loc.value_size,
        )?)
    }

    /// Returns every key currently mapped, in unspecified order.
    #[must_use]
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        self.keydir.keys().cloned().collect()
    }

    /// Folds `f` over every key-value pair, threading the accumulator.
    ///
    /// Iteration order is unspecified. If any value read fails, the fold
    /// stops and the error is returned; the partial accumulator is lost.
    pub fn fold<Acc, F>(&self, mut f: F, mut acc: Acc) -> Result<Acc, BitcaskError>
    where
        F: FnMut(&[u8], &[u8], Acc) -> Acc,
    {
        for (key, loc) in self.keydir.iter() {
            let value = datafile::read_value(&self.dir, loc.file_id, loc.value_pos, loc.value_size)?;
            acc = f(key, &value, acc);
        }
        Ok(acc)
    }
}
