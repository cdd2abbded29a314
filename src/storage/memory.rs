//! In-memory storage
//!
//! A `BTreeMap` backend with the same contract and key ordering as the
//! persisted engine. Nothing is written to disk.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

use super::Storage;

/// In-memory storage, cheap to clone (clones share data)
#[derive(Clone)]
pub struct MemoryStorage<V> {
    data: Arc<RwLock<BTreeMap<String, V>>>,
}

impl<V> MemoryStorage<V> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Get the number of items stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Clear all data
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl<V> Default for MemoryStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Storage<V> for MemoryStorage<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn range(
        &self,
        min: Option<&str>,
        max: Option<&str>,
        count: Option<usize>,
    ) -> Result<Vec<V>> {
        let lower = min.map_or(Bound::Unbounded, Bound::Included);
        let upper = max.map_or(Bound::Unbounded, Bound::Excluded);

        // BTreeMap::range panics on inverted bounds
        if let (Some(min), Some(max)) = (min, max) {
            if min >= max {
                return Ok(Vec::new());
            }
        }

        let data = self.data.read();
        Ok(data
            .range::<str, _>((lower, upper))
            .take(count.unwrap_or(usize::MAX))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn add(&self, key: &str, value: &V) -> Result<bool> {
        let mut data = self.data.write();
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), value.clone());
        Ok(true)
    }

    async fn put(&self, key: &str, value: &V) -> Result<()> {
        self.data.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }
}
