//! Lazy per-collection cache of column definitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{DocumentStore, SchemaEntry};

/// Caches the store's column definitions per collection.
///
/// The fetch is all-or-nothing: a schema-validation failure anywhere
/// invalidates the whole collection entry, and the next caller triggers a
/// full refetch. Owned by the long-lived service instance so separate
/// collections never share state.
pub struct SchemaCache {
    store: Arc<dyn DocumentStore>,
    entries: Mutex<HashMap<String, Arc<Vec<SchemaEntry>>>>,
}

impl SchemaCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached schema for a collection, fetching on first use.
    pub async fn get(&self, collection_id: &str) -> Result<Arc<Vec<SchemaEntry>>, StoreError> {
        if let Some(cached) = self.entries.lock().unwrap().get(collection_id) {
            return Ok(Arc::clone(cached));
        }

        debug!(collection_id, "schema cache miss, fetching");
        let fetched = Arc::new(self.store.get_schema(collection_id).await?);
        self.entries
            .lock()
            .unwrap()
            .insert(collection_id.to_string(), Arc::clone(&fetched));
        info!(
            collection_id,
            properties = fetched.len(),
            "schema cached"
        );
        Ok(fetched)
    }

    /// Drop the cached schema for a collection wholesale.
    ///
    /// Called after the store rejects a mutation with a validation error;
    /// the next mutation refetches before mapping.
    pub fn invalidate(&self, collection_id: &str) {
        if self.entries.lock().unwrap().remove(collection_id).is_some() {
            info!(collection_id, "schema cache invalidated");
        }
    }

    /// Find a property's definition by exact name.
    pub async fn property(
        &self,
        collection_id: &str,
        property: &str,
    ) -> Result<Option<SchemaEntry>, StoreError> {
        let schema = self.get(collection_id).await?;
        Ok(schema.iter().find(|e| e.name == property).cloned())
    }
}
