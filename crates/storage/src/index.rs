//! Ordered key index
//!
//! A sorted, duplicate-free `Vec<u64>` mirroring a collection's keys. The
//! common case is appending a freshly issued key, which is always larger than
//! every existing key, so insertion checks the tail first and only falls back
//! to a binary search when the key belongs somewhere earlier (for example a
//! deleted record re-upserted with its old identity).

/// Strictly ascending sequence of unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedIndex {
    keys: Vec<u64>,
}

impl OrderedIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Create an empty index with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
        }
    }

    /// Build an index from keys in any order.
    ///
    /// Used to rebuild the index from a collection's item map after load.
    /// Duplicates are collapsed.
    pub fn from_unsorted(keys: impl IntoIterator<Item = u64>) -> Self {
        let mut keys: Vec<u64> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        Self { keys }
    }

    /// Position of `key`, or `None` if absent. O(log n).
    #[inline]
    pub fn locate(&self, key: u64) -> Option<usize> {
        self.keys.binary_search(&key).ok()
    }

    /// Check if `key` is present
    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        self.locate(key).is_some()
    }

    /// Insert `key` at its sorted position.
    ///
    /// Returns `false` (and leaves the index unchanged) if the key is already
    /// present.
    pub fn insert(&mut self, key: u64) -> bool {
        match self.keys.last() {
            None => {
                self.keys.push(key);
                true
            }
            Some(&last) if key > last => {
                self.keys.push(key);
                true
            }
            Some(_) => match self.keys.binary_search(&key) {
                Ok(_) => false,
                Err(pos) => {
                    self.keys.insert(pos, key);
                    true
                }
            },
        }
    }

    /// Remove `key`, shifting later keys left.
    ///
    /// Returns `false` if the key was not present.
    pub fn remove(&mut self, key: u64) -> bool {
        match self.locate(key) {
            Some(pos) => {
                self.keys.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Largest key, if any
    pub fn last(&self) -> Option<u64> {
        self.keys.last().copied()
    }

    /// Ascending iterator over the keys
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.keys.iter().copied()
    }

    /// Keys as a sorted slice
    pub fn as_slice(&self) -> &[u64] {
        &self.keys
    }

    /// Remove every key
    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

impl<'a> IntoIterator for &'a OrderedIndex {
    type Item = u64;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter().copied()
    }
}

impl FromIterator<u64> for OrderedIndex {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self::from_unsorted(iter)
    }
}
