//! Persisted Storage Engine
//!
//! The file-backed engine behind one logical storage name.
//!
//! ## Responsibilities
//! - Rebuild the key index from the bucket files on open
//! - Serve Get/Range/Add/Put/Delete under one lock
//! - Keep every bucket's occupied slots contiguous via swap compaction
//!
//! ## Concurrency Model
//!
//! One `tokio::sync::Mutex` guards the buckets and the index together. Every
//! operation holds it for its whole duration, slot I/O included, so a read
//! can never observe a half-finished compaction. The only await while the
//! lock is held is opening a new bucket file.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SyncStrategy;
use crate::error::{Result, SlotError};
use crate::registry::StreamRegistry;

use super::allocator::{parse_capacity, BucketAllocator, BucketId};
use super::bucket::SwapOutcome;
use super::index::{KeyIndex, Node};
use super::record::{decode_key, decode_record, encode_record, Bincode, RecordFormat};
use super::Storage;

/// Buckets and index, always mutated together
struct State {
    buckets: BucketAllocator,
    items: KeyIndex,
}

/// Summary of the startup scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Bucket files adopted
    pub buckets: usize,
    /// Slots indexed
    pub records: u64,
    /// Slots that did not decode (still counted as occupied)
    pub corrupt: u64,
    /// Slots whose key was already indexed by an earlier slot
    pub duplicates: u64,
    /// Bucket files that could not be opened or sized
    pub failed_files: usize,
}

/// Per-bucket statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStats {
    pub capacity: usize,
    pub count: u64,
    pub path: PathBuf,
}

/// File-backed storage engine for values of type `V`
pub struct PersistedStorage<V, F = Bincode> {
    name: String,
    dir: PathBuf,
    streams: Arc<StreamRegistry>,
    sync: SyncStrategy,
    state: Mutex<State>,
    scan: ScanReport,
    _marker: PhantomData<fn() -> (V, F)>,
}

impl<V, F> std::fmt::Debug for PersistedStorage<V, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStorage")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("sync", &self.sync)
            .field("scan", &self.scan)
            .finish_non_exhaustive()
    }
}

impl<V, F> PersistedStorage<V, F>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    F: RecordFormat,
{
    /// Open (or create) the storage in `dir`, re-indexing existing buckets
    ///
    /// Damaged bucket files and slots are logged and skipped; open only
    /// fails if the directory itself is unusable.
    pub async fn open(
        name: &str,
        dir: &Path,
        streams: Arc<StreamRegistry>,
        sync: SyncStrategy,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let mut capacities = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            match parse_capacity(&entry.path()) {
                Some(capacity) => capacities.push(capacity),
                None => debug!(path = %entry.path().display(), "skipping non-bucket file"),
            }
        }
        capacities.sort_unstable();

        let mut state = State {
            buckets: BucketAllocator::new(dir),
            items: KeyIndex::new(),
        };
        let mut scan = ScanReport::default();

        for capacity in capacities {
            let id = match state.buckets.open_bucket(capacity, &streams).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(storage = name, capacity, error = %e, "cannot open bucket file, skipping");
                    scan.failed_files += 1;
                    continue;
                }
            };
            if let Err(e) = Self::scan_bucket(&mut state, id, &mut scan) {
                warn!(storage = name, capacity, error = %e, "cannot scan bucket file");
                scan.failed_files += 1;
            }
        }
        scan.buckets = state.buckets.len();

        info!(
            storage = name,
            buckets = scan.buckets,
            records = scan.records,
            corrupt = scan.corrupt,
            duplicates = scan.duplicates,
            "storage opened"
        );

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            streams,
            sync,
            state: Mutex::new(state),
            scan,
            _marker: PhantomData,
        })
    }

    /// Index every slot of one bucket file
    ///
    /// Every slot on disk counts as occupied, decodable or not, so later
    /// appends stay aligned.
    fn scan_bucket(state: &mut State, id: BucketId, scan: &mut ScanReport) -> Result<()> {
        let bucket = state.buckets.bucket_mut(id);
        let slots = bucket.slots_on_disk()?;

        for index in 0..slots {
            let key = match bucket.read_slot(index) {
                Ok(Some(payload)) => decode_key::<F>(payload),
                Ok(None) => Err(SlotError::CorruptRecord("invalid slot header".to_string())),
                Err(e) => Err(e),
            };
            bucket.claim_scanned();

            match key {
                Ok(key) => {
                    if state.items.insert_new(key.as_bytes(), Node::new(id, index)) {
                        scan.records += 1;
                    } else {
                        debug!(key = %key, capacity = bucket.capacity(), index, "duplicate slot ignored");
                        scan.duplicates += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        path = %bucket.path().display(),
                        index,
                        error = %e,
                        "corrupt slot skipped"
                    );
                    scan.corrupt += 1;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Operations (lock held by caller)
    // =========================================================================

    fn get_locked(state: &mut State, key: &str) -> Result<Option<V>> {
        match state.items.get(key.as_bytes()) {
            Some(node) => Self::read_node(state, key, node).map(Some),
            None => Ok(None),
        }
    }

    fn read_node(state: &mut State, key: &str, node: Node) -> Result<V> {
        let bucket = state.buckets.bucket_mut(node.bucket);
        let payload = bucket.read_slot(node.index)?.ok_or_else(|| {
            SlotError::CorruptRecord(format!("slot for {:?} has an invalid header", key))
        })?;

        let record = decode_record::<F, V>(payload)?;
        if record.key != key {
            return Err(SlotError::CorruptRecord(format!(
                "slot for {:?} holds {:?}",
                key, record.key
            )));
        }
        Ok(record.value)
    }

    async fn add_encoded(&self, state: &mut State, key: &str, payload: &[u8]) -> Result<bool> {
        if state.items.contains(key.as_bytes()) {
            return Ok(false);
        }

        let id = state.buckets.allocate(payload.len(), &self.streams).await?;
        let index = state.buckets.bucket_mut(id).append(payload, self.sync)?;
        state.items.insert_new(key.as_bytes(), Node::new(id, index));
        Ok(true)
    }

    /// Remove `key` and swap the bucket's last slot into the freed one
    ///
    /// The record that moves is re-pointed by its decoded key when that key
    /// is indexed at the old position; otherwise by a reverse lookup of the
    /// old position. A moved slot nobody references (a corrupt slot found at
    /// startup) is carried along without touching the index. A moved slot
    /// holding another copy of `key` is released as well, so the key cannot
    /// come back on the next open.
    fn delete_locked(&self, state: &mut State, key: &str) -> Result<bool> {
        let Some(node) = state.items.get(key.as_bytes()) else {
            return Ok(false);
        };

        let moved = loop {
            let bucket = state.buckets.bucket_mut(node.bucket);
            match bucket.swap_remove(node.index, self.sync)? {
                SwapOutcome::RemovedLast => break None,
                SwapOutcome::Moved { from, payload } => match payload.map(decode_key::<F>) {
                    Some(Ok(moved_key)) if moved_key == key => {
                        debug!(storage = %self.name, index = from, "stale copy of deleted key released");
                    }
                    decoded => break Some((Node::new(node.bucket, from), decoded)),
                },
            }
        };
        state.items.remove(key.as_bytes());

        if let Some((old, decoded)) = moved {
            let owner = match decoded {
                Some(Ok(moved_key)) if state.items.get(moved_key.as_bytes()) == Some(old) => {
                    Some(moved_key.into_bytes())
                }
                Some(Err(ref e)) => {
                    warn!(storage = %self.name, index = old.index, error = %e, "relocated slot does not decode");
                    state.items.owner_of(old)
                }
                _ => state.items.owner_of(old),
            };

            match owner {
                Some(owner) => {
                    state.items.repoint(&owner, node);
                    debug!(storage = %self.name, from = old.index, to = node.index, "slot relocated");
                }
                None => debug!(storage = %self.name, from = old.index, to = node.index, "orphan slot relocated"),
            }
        }
        Ok(true)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// What the startup scan found
    pub fn scan_report(&self) -> &ScanReport {
        &self.scan
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.items.contains(key.as_bytes())
    }

    /// Capacity, occupancy and file of every bucket, in creation order
    pub async fn buckets(&self) -> Vec<BucketStats> {
        let state = self.state.lock().await;
        state
            .buckets
            .buckets()
            .map(|b| BucketStats {
                capacity: b.capacity(),
                count: b.count(),
                path: b.path().to_path_buf(),
            })
            .collect()
    }
}

#[async_trait]
impl<V, F> Storage<V> for PersistedStorage<V, F>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    F: RecordFormat,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        let mut state = self.state.lock().await;
        Self::get_locked(&mut state, key)
    }

    async fn range(
        &self,
        min: Option<&str>,
        max: Option<&str>,
        count: Option<usize>,
    ) -> Result<Vec<V>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let mut hits: Vec<(String, Node)> = state
            .items
            .range(min.map(str::as_bytes), max.map(str::as_bytes))
            .into_iter()
            .map(|(k, node)| (String::from_utf8_lossy(k).into_owned(), node))
            .collect();
        if let Some(count) = count {
            hits.truncate(count);
        }

        hits.into_iter()
            .map(|(key, node)| Self::read_node(state, &key, node))
            .collect()
    }

    async fn add(&self, key: &str, value: &V) -> Result<bool> {
        let payload = encode_record::<F, V>(key, value)?;
        let mut state = self.state.lock().await;
        self.add_encoded(&mut state, key, &payload).await
    }

    async fn put(&self, key: &str, value: &V) -> Result<()> {
        // Encode first so an oversized value leaves the old one in place.
        let payload = encode_record::<F, V>(key, value)?;
        let mut state = self.state.lock().await;
        self.delete_locked(&mut state, key)?;
        self.add_encoded(&mut state, key, &payload).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.delete_locked(&mut state, key)
    }
}
