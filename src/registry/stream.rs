//! Shared stream registry
//!
//! Opens each bucket file at most once per context and hands the same
//! handle to every bucket that points at that path.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, SlotError};

use super::OnceRegistry;

/// A read/write file handle shared by every user of one path
pub type SharedStream = Arc<Mutex<File>>;

/// Path-keyed registry of open read/write streams
///
/// Streams are never closed while the registry is alive.
pub struct StreamRegistry {
    streams: OnceRegistry<PathBuf, SharedStream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            // A failed open (permissions, missing dir) may succeed later.
            streams: OnceRegistry::new(true),
        }
    }

    /// Open `path` for read/write, creating it if missing
    pub async fn open(&self, path: &Path) -> Result<SharedStream> {
        let owned = path.to_path_buf();
        self.streams
            .get_or_create(path.to_path_buf(), || async move {
                let file = tokio::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&owned)
                    .await?;
                debug!(path = %owned.display(), "opened bucket stream");
                Ok::<_, SlotError>(Arc::new(Mutex::new(file.into_std().await)))
            })
            .await
    }

    /// Number of paths opened (or being opened)
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.streams.get(&path.to_path_buf()).is_some()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
