//! Registry Module
//!
//! Run-once, share-result memoization keyed by name or path.
//!
//! ## Responsibilities
//! - Run a factory at most once per key, even under concurrent callers
//! - Hand every caller the same value (or the same failure)
//! - Optionally evict failed attempts so the next caller retries
//!
//! Callers for different keys never wait on each other: each key owns its
//! own `OnceCell`, and the map shard lock is released before any await.

mod engine;
mod stream;

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::{Result, SlotError};

pub use engine::EngineRegistry;
pub use stream::{SharedStream, StreamRegistry};

/// Memoized outcome of one factory run
type Slot<V> = Arc<OnceCell<std::result::Result<V, Arc<SlotError>>>>;

/// Generic run-once registry
pub struct OnceRegistry<K, V> {
    cells: DashMap<K, Slot<V>>,
    retry_on_failure: bool,
}

impl<K, V> OnceRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty registry
    pub fn new(retry_on_failure: bool) -> Self {
        Self {
            cells: DashMap::new(),
            retry_on_failure,
        }
    }

    /// Return the value for `key`, running `factory` if no caller has yet
    ///
    /// Concurrent callers for the same key wait for the first caller's
    /// factory and observe its result.
    pub async fn get_or_create<F, Fut>(&self, key: K, factory: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = Arc::clone(self.cells.entry(key.clone()).or_default().value());

        let outcome = cell
            .get_or_init(|| async move { factory().await.map_err(Arc::new) })
            .await;

        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(error) => {
                if self.retry_on_failure {
                    // Only evict our own cell; a retry may already be running.
                    self.cells.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
                }
                Err(SlotError::Shared(Arc::clone(error)))
            }
        }
    }

    /// Return the value for `key` if it was created successfully
    pub fn get(&self, key: &K) -> Option<V> {
        let cell = self.cells.get(key)?;
        match cell.value().get() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Whether a factory has been started for `key`
    pub fn contains(&self, key: &K) -> bool {
        self.cells.contains_key(key)
    }

    /// Number of keys with a started or finished factory
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn retries_on_failure(&self) -> bool {
        self.retry_on_failure
    }
}
