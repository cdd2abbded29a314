//! Engine registry
//!
//! At most one live engine per logical storage name.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::error::{Result, SlotError};

use super::OnceRegistry;

type AnyEngine = Arc<dyn Any + Send + Sync>;

/// Name-keyed registry of engine singletons
///
/// Engines of different value types live side by side; asking for a name
/// with a type other than the one it was built with is a `TypeMismatch`.
pub struct EngineRegistry {
    engines: OnceRegistry<String, AnyEngine>,
}

impl EngineRegistry {
    pub fn new(retry_on_failure: bool) -> Self {
        Self {
            engines: OnceRegistry::new(retry_on_failure),
        }
    }

    /// Return the engine for `name`, building it with `factory` on first use
    pub async fn get_or_create<T, F, Fut>(&self, name: &str, factory: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let engine = self
            .engines
            .get_or_create(name.to_string(), || async move {
                let engine = factory().await?;
                Ok::<_, SlotError>(Arc::new(engine) as AnyEngine)
            })
            .await?;

        engine.downcast::<T>().map_err(|_| SlotError::TypeMismatch {
            name: name.to_string(),
        })
    }

    /// Return the already-built engine for `name`, if any
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.engines.get(&name.to_string())?.downcast::<T>().ok()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
