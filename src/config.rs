//! Configuration for slotkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a slotkv context
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all storages
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {name}/          (one directory per logical storage)
    ///           ├── 64         (bucket file, slot capacity 64)
    ///           └── 256        (bucket file, slot capacity 256)
    pub data_dir: PathBuf,

    /// How hard to push each slot write to disk
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Registry Configuration
    // -------------------------------------------------------------------------
    /// Evict a failed engine construction so the next caller retries it.
    /// When false, every later caller for that name gets the same failure.
    pub retry_failed_opens: bool,
}

/// Slot write durability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Flush the stream after every slot write
    Flush,

    /// fsync file data after every slot write (safest, slowest)
    SyncData,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./slotkv_data"),
            sync_strategy: SyncStrategy::Flush,
            retry_failed_opens: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storages)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the slot write sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Retry engine construction after a failed attempt
    pub fn retry_failed_opens(mut self, retry: bool) -> Self {
        self.config.retry_failed_opens = retry;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
