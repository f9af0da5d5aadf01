//! Process-wide store and embedder handles.
//!
//! Each slot is filled on first use and reused until [`reset`]. The first
//! configuration to reach a slot wins; call [`reset`] after changing it.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::error::VectorStoreError;
use crate::models::{Config, VectorStoreConfig};
use crate::services::embedding::{DaemonEmbedder, Embedder};
use crate::services::vector_store::{SharedStore, create_shared};

static STORE: OnceLock<Mutex<Option<SharedStore>>> = OnceLock::new();
static EMBEDDER: OnceLock<Mutex<Option<Arc<dyn Embedder>>>> = OnceLock::new();

fn slot<T>(cell: &'static OnceLock<Mutex<Option<T>>>) -> MutexGuard<'static, Option<T>> {
    cell.get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The shared vector store, opened from `config` on first use.
pub fn store(config: &VectorStoreConfig) -> Result<SharedStore, VectorStoreError> {
    let mut slot = slot(&STORE);
    if let Some(store) = slot.as_ref() {
        return Ok(Arc::clone(store));
    }

    let store = create_shared(config)?;
    *slot = Some(Arc::clone(&store));
    Ok(store)
}

/// The shared embedder, a daemon client built from `config` on first use.
pub fn embedder(config: &Config) -> Arc<dyn Embedder> {
    let mut slot = slot(&EMBEDDER);
    if let Some(embedder) = slot.as_ref() {
        return Arc::clone(embedder);
    }

    let embedder: Arc<dyn Embedder> = Arc::new(DaemonEmbedder::new(config));
    *slot = Some(Arc::clone(&embedder));
    embedder
}

/// Replace the embedder, e.g. with a test double.
pub fn install_embedder(embedder: Arc<dyn Embedder>) {
    *slot(&EMBEDDER) = Some(embedder);
}

/// Drop both handles so the next access reinitializes them.
pub fn reset() {
    slot(&STORE).take();
    slot(&EMBEDDER).take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoreDriver;
    use crate::services::embedding::test_support::LexiconEmbedder;

    #[test]
    fn test_slots_reuse_until_reset() {
        reset();

        let config = VectorStoreConfig {
            driver: StoreDriver::Memory,
            collection: "registry".into(),
            ..Default::default()
        };
        let first = store(&config).unwrap();
        let second = store(&config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let lexicon: Arc<dyn Embedder> = Arc::new(LexiconEmbedder::default());
        install_embedder(Arc::clone(&lexicon));
        assert!(Arc::ptr_eq(&embedder(&Config::default()), &lexicon));

        reset();
        let third = store(&config).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(embedder(&Config::default()).model_id(), Config::default().embedding.model_id);

        reset();
    }
}
