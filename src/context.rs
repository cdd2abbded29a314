//! Store Context
//!
//! Application-level owner of the engine and stream registries.
//!
//! One context gives "one engine per name" and "one stream per file"
//! semantics for everything opened through it. Two contexts are fully
//! independent, which keeps tests from sharing hidden state.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, SlotError};
use crate::registry::{EngineRegistry, StreamRegistry};
use crate::storage::{Bincode, PersistedStorage, RecordFormat};

/// Shared handle to the registries of one application
pub struct StoreContext {
    config: Config,
    streams: Arc<StreamRegistry>,
    engines: EngineRegistry,
}

impl StoreContext {
    pub fn new(config: Config) -> Self {
        let engines = EngineRegistry::new(config.retry_failed_opens);
        Self {
            config,
            streams: Arc::new(StreamRegistry::new()),
            engines,
        }
    }

    /// Open the storage `name` with the default (bincode) record format
    pub async fn open<V>(&self, name: &str) -> Result<Arc<PersistedStorage<V>>>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.open_with_format::<V, Bincode>(name).await
    }

    /// Open the storage `name`, constructing its engine on first use
    ///
    /// Every caller for the same name shares one engine; a name opened with
    /// a different `V` or `F` is rejected with `TypeMismatch`.
    pub async fn open_with_format<V, F>(&self, name: &str) -> Result<Arc<PersistedStorage<V, F>>>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: RecordFormat,
    {
        let dir = self.storage_dir(name)?;
        let streams = Arc::clone(&self.streams);
        let sync = self.config.sync_strategy;

        self.engines
            .get_or_create(name, || async move {
                PersistedStorage::<V, F>::open(name, &dir, streams, sync).await
            })
            .await
    }

    /// Directory of the storage `name`
    pub fn storage_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(SlotError::InvalidName(name.to_string()));
        }
        Ok(self.config.data_dir.join(name))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn streams(&self) -> &Arc<StreamRegistry> {
        &self.streams
    }

    /// Number of engines constructed (or under construction)
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }
}
