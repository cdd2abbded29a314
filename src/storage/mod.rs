//! Storage Module
//!
//! The generic storage contract and its backends.
//!
//! ## Responsibilities
//! - Define the async `Storage` contract every backend honors
//! - Persist records in power-of-two slot buckets, one file per capacity
//! - Keep buckets gap-free with swap compaction on delete
//! - Rebuild the in-memory key index from disk on open
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/{name}/
//!   ├── 64      slots of 64 bytes
//!   ├── 128     slots of 128 bytes
//!   └── ...     one file per capacity ever needed
//! ```
//!
//! ## Slot Format
//! ```text
//! ┌──────────────┬──────────────────────────────┬───────────┐
//! │ Len: u16 LE  │ Payload: format({key,value}) │ Padding   │
//! └──────────────┴──────────────────────────────┴───────────┘
//! ```

mod allocator;
mod bucket;
mod engine;
mod index;
mod memory;
mod record;

use async_trait::async_trait;

use crate::error::Result;

pub use allocator::{capacity_for, parse_capacity, BucketAllocator, BucketId};
pub use bucket::{Bucket, SwapOutcome, HEADER_LEN};
pub use engine::{BucketStats, PersistedStorage, ScanReport};
pub use index::{KeyIndex, Node};
pub use memory::MemoryStorage;
pub use record::{
    decode_key, decode_record, encode_record, Bincode, Json, Record, RecordFormat, MAX_RECORD_SIZE,
};

/// Asynchronous key-value contract shared by every backend
///
/// Keys compare by ordinal byte order.
#[async_trait]
pub trait Storage<V>: Send + Sync {
    /// Value for `key`, or `None` if absent
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Values with `min <= key < max` in key order, at most `count` of them
    ///
    /// `None` bounds are open. Never fails for an empty result.
    async fn range(
        &self,
        min: Option<&str>,
        max: Option<&str>,
        count: Option<usize>,
    ) -> Result<Vec<V>>;

    /// Insert `key` if absent; `false` (and no change) if it exists
    async fn add(&self, key: &str, value: &V) -> Result<bool>;

    /// Insert or overwrite `key`
    async fn put(&self, key: &str, value: &V) -> Result<()>;

    /// Remove `key`; `false` if it was absent
    async fn delete(&self, key: &str) -> Result<bool>;
}
