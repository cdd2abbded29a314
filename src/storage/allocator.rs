//! Bucket allocator
//!
//! Maps record lengths to power-of-two capacity classes, one bucket (and
//! one file, named by its decimal capacity) per class.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::registry::StreamRegistry;

use super::bucket::{Bucket, HEADER_LEN};

/// Position of a bucket inside its allocator
pub type BucketId = usize;

/// Smallest power of two that fits `payload_len` plus the slot header
pub fn capacity_for(payload_len: usize) -> usize {
    (payload_len + HEADER_LEN).next_power_of_two()
}

/// Parse a bucket file name ("256") into its capacity
///
/// Anything that is not a power of two larger than the header is ignored.
pub fn parse_capacity(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let capacity: usize = name.parse().ok()?;
    (capacity.is_power_of_two() && capacity > HEADER_LEN).then_some(capacity)
}

/// Owns every bucket of one storage, in creation order
pub struct BucketAllocator {
    dir: PathBuf,
    buckets: Vec<Bucket>,
    by_capacity: HashMap<usize, BucketId>,
}

impl BucketAllocator {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            buckets: Vec::new(),
            by_capacity: HashMap::new(),
        }
    }

    /// File path of the bucket with this capacity
    pub fn bucket_path(&self, capacity: usize) -> PathBuf {
        self.dir.join(capacity.to_string())
    }

    /// Return the bucket for `payload_len`, opening its file on first use
    pub async fn allocate(&mut self, payload_len: usize, streams: &StreamRegistry) -> Result<BucketId> {
        let capacity = capacity_for(payload_len);
        if let Some(&id) = self.by_capacity.get(&capacity) {
            return Ok(id);
        }
        debug!(capacity, dir = %self.dir.display(), "creating bucket");
        self.open_bucket(capacity, streams).await
    }

    /// Open the bucket file for `capacity` and register it with a zero count
    pub async fn open_bucket(&mut self, capacity: usize, streams: &StreamRegistry) -> Result<BucketId> {
        if let Some(&id) = self.by_capacity.get(&capacity) {
            return Ok(id);
        }

        let path = self.bucket_path(capacity);
        let stream = streams.open(&path).await?;

        let id = self.buckets.len();
        self.buckets.push(Bucket::new(capacity, path, stream));
        self.by_capacity.insert(capacity, id);
        Ok(id)
    }

    pub fn bucket(&self, id: BucketId) -> &Bucket {
        &self.buckets[id]
    }

    pub fn bucket_mut(&mut self, id: BucketId) -> &mut Bucket {
        &mut self.buckets[id]
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
