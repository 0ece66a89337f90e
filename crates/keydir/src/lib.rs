use std::collections::hash_map;
use std::collections::HashMap;

/// Locator stores where the latest value of a key lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    /// Data file holding the value (the file name is this id, zero-padded).
    pub file_id: u64,
    /// Length of the value in bytes.
    pub value_size: u64,
    /// Byte offset of the value within the data file.
    pub value_pos: u64,
    /// Microsecond timestamp of the write.
    pub tstamp: u64,
}

/// The in-memory key directory: key -> locator of the latest value.
///
/// Iteration order is unspecified.
#[derive(Debug, Default)]
pub struct KeyDir {
    map: HashMap<Vec<u8>, Locator>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Points `key` at a new locator, replacing any previous one.
    pub fn insert(&mut self, key: Vec<u8>, loc: Locator) {
        self.map.insert(key, loc);
    }

    /// Removes `key`, returning its locator if it was present.
    pub fn remove(&mut self, key: &[u8]) -> Option<Locator> {
        self.map.remove(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<&Locator> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Locator)> {
        self.map.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl IntoIterator for KeyDir {
    type Item = (Vec<u8>, Locator);
    type IntoIter = hash_map::IntoIter<Vec<u8>, Locator>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

/// `entry == None` signifies a tombstone observed during the rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildEntry {
    tstamp: u64,
    loc: Option<Locator>,
}

/// Accumulates put and tombstone events while the directory is rebuilt from
/// log and hint files, keeping the newest event per key.
///
/// File-id order alone cannot sequence the log: a merge file carries a
/// higher id than the active file that was open while it was written, yet
/// holds older data. Timestamps decide instead; ties go to the event applied
/// later, so within one file a later offset overrides an earlier one.
/// Tombstones are retained until `finish` so a put replayed after a newer
/// tombstone cannot resurrect the key.
#[derive(Debug, Default)]
pub struct KeyDirBuilder {
    map: HashMap<Vec<u8>, BuildEntry>,
    max_tstamp: u64,
}

impl KeyDirBuilder {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            max_tstamp: 0,
        }
    }

    /// Applies a put event. Ignored if the key already has a newer event.
    pub fn apply_put(&mut self, key: &[u8], loc: Locator) {
        self.max_tstamp = self.max_tstamp.max(loc.tstamp);
        match self.map.get(key) {
            Some(old) if old.tstamp > loc.tstamp => {}
            _ => {
                self.map.insert(
                    key.to_vec(),
                    BuildEntry {
                        tstamp: loc.tstamp,
                        loc: Some(loc),
                    },
                );
            }
        }
    }

    /// Applies a tombstone event. Ignored if the key already has a newer
    /// event.
    pub fn apply_delete(&mut self, key: &[u8], tstamp: u64) {
        self.max_tstamp = self.max_tstamp.max(tstamp);
        match self.map.get(key) {
            Some(old) if old.tstamp > tstamp => {}
            _ => {
                self.map.insert(key.to_vec(), BuildEntry { tstamp, loc: None });
            }
        }
    }

    /// Highest timestamp seen across all applied events.
    pub fn max_tstamp(&self) -> u64 {
        self.max_tstamp
    }

    /// Drops tombstones and produces the directory.
    pub fn finish(self) -> KeyDir {
        let map = self
            .map
            .into_iter()
            .filter_map(|(key, entry)| entry.loc.map(|loc| (key, loc)))
            .collect();
        KeyDir { map }
    }
}
