//! # slotkv
//!
//! An embedded, file-backed key-value store with:
//! - Power-of-two slot buckets, one file per capacity class
//! - Swap compaction on delete (no free lists, no fragmentation)
//! - Best-effort index rebuild from bucket files on startup
//! - An order-preserving key codec for prefix and range scans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StoreContext                           │
//! │        (EngineRegistry: one engine per logical name)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   PersistedStorage                           │
//! │         (one mutex over buckets + key index)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌───────────────┐
//!   │  KeyIndex   │          │BucketAllocator│
//!   │ (key→slot)  │          │ (size classes)│
//!   └─────────────┘          └──────┬────────┘
//!                                   │
//!                                   ▼
//!                           ┌───────────────┐
//!                           │StreamRegistry │
//!                           │(one fd / file)│
//!                           └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod registry;
pub mod storage;
pub mod context;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SlotError, Result};
pub use config::{Config, SyncStrategy};
pub use context::StoreContext;
pub use key::StorageKey;
pub use storage::{MemoryStorage, PersistedStorage, Storage};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of slotkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
