//! Key index
//!
//! In-memory map from a key's UTF-8 bytes to the slot holding its record.
//! Rebuilt from the bucket files on every open.

use std::collections::HashMap;

use super::allocator::BucketId;

/// Location of one record: slot `index` of bucket `bucket`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    pub bucket: BucketId,
    pub index: u64,
}

impl Node {
    pub fn new(bucket: BucketId, index: u64) -> Self {
        Self { bucket, index }
    }
}

/// Exactly one entry per live key
#[derive(Debug, Default)]
pub struct KeyIndex {
    items: HashMap<Vec<u8>, Node>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<Node> {
        self.items.get(key).copied()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.items.contains_key(key)
    }

    /// Insert only if absent; returns false when the key is already indexed
    pub fn insert_new(&mut self, key: &[u8], node: Node) -> bool {
        if self.items.contains_key(key) {
            return false;
        }
        self.items.insert(key.to_vec(), node);
        true
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Node> {
        self.items.remove(key)
    }

    /// Point `key` at a new node, if it is indexed
    pub fn repoint(&mut self, key: &[u8], node: Node) -> bool {
        match self.items.get_mut(key) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    /// Find the key currently stored at `node`
    ///
    /// Linear scan; only used when a slot's key cannot be read back.
    pub fn owner_of(&self, node: Node) -> Option<Vec<u8>> {
        self.items
            .iter()
            .find(|(_, n)| **n == node)
            .map(|(k, _)| k.clone())
    }

    /// Entries with `min <= key < max`, in ordinal byte order
    ///
    /// Either bound may be absent. This is a full scan of the index.
    pub fn range(&self, min: Option<&[u8]>, max: Option<&[u8]>) -> Vec<(&[u8], Node)> {
        let mut entries: Vec<(&[u8], Node)> = self
            .items
            .iter()
            .map(|(k, n)| (k.as_slice(), *n))
            .filter(|(k, _)| min.map_or(true, |min| *k >= min))
            .filter(|(k, _)| max.map_or(true, |max| *k < max))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
