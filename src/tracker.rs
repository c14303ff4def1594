//! Service facade for the reconciliation flow.
//!
//! An external caller (the chat command layer) supplies a business key and a
//! property patch; the tracker resolves it into store mutations through the
//! schema cache and mapper, then applies it through the mutator.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{instrument, warn};

use crate::config::TrackerConfig;
use crate::mapper::{FieldError, PropertyMapper};
use crate::mutator::EntityMutator;
use crate::patch::{PatchExtractor, PropertyPatch};
use crate::schema::SchemaCache;
use crate::store::DocumentStore;

/// What one reconciliation call accomplished.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub entity_id: String,
    /// Property writes that made it into the store payload.
    pub fields_applied: usize,
    /// Fields that failed to map; the rest of the patch was still applied.
    pub errors: Vec<FieldError>,
}

/// Long-lived reconciliation service over one project collection.
pub struct ProjectTracker {
    schema: Arc<SchemaCache>,
    mutator: EntityMutator,
    extractor: Option<Arc<dyn PatchExtractor>>,
    config: TrackerConfig,
}

impl ProjectTracker {
    pub fn new(store: Arc<dyn DocumentStore>, config: TrackerConfig) -> Self {
        let schema = Arc::new(SchemaCache::new(Arc::clone(&store)));
        let mutator = EntityMutator::new(store, Arc::clone(&schema), config.clone());
        Self {
            schema,
            mutator,
            extractor: None,
            config,
        }
    }

    /// Attach the NL extraction capability used by [`Self::reconcile_text`].
    pub fn with_extractor(mut self, extractor: Arc<dyn PatchExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Schema cache shared with the change watcher.
    pub fn schema_cache(&self) -> Arc<SchemaCache> {
        Arc::clone(&self.schema)
    }

    /// Map and apply a patch for the given business key, creating the entity
    /// when absent. Note appending is independent of property-write success.
    #[instrument(skip(self, patch, cover_url), fields(business_key = %business_key))]
    pub async fn apply_patch(
        &self,
        business_key: &str,
        display_title: &str,
        patch: &PropertyPatch,
        cover_url: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let schema = self.schema.get(&self.config.collection_id).await?;
        let mapped = PropertyMapper::map(patch, &schema);

        let entity_id = self
            .mutator
            .upsert(business_key, display_title, &mapped.payload, cover_url)
            .await?;

        if let Some(note) = &mapped.note {
            if let Err(e) = self.mutator.append_note(&entity_id, note).await {
                warn!(%entity_id, error = %e, "note append failed after property writes");
            }
        }

        Ok(ReconcileOutcome {
            entity_id,
            fields_applied: mapped.payload.len(),
            errors: mapped.errors,
        })
    }

    /// Run raw message text through the extraction capability and apply the
    /// resulting patch, if any. `Ok(None)` means the text carried no change.
    pub async fn reconcile_text(
        &self,
        business_key: &str,
        display_title: &str,
        text: &str,
    ) -> Result<Option<ReconcileOutcome>> {
        let extractor = self
            .extractor
            .as_ref()
            .ok_or_else(|| anyhow!("no patch extractor configured"))?;

        let Some(patch) = extractor.extract(text, Utc::now().date_naive()).await? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(None);
        }
        let outcome = self
            .apply_patch(business_key, display_title, &patch, None)
            .await?;
        Ok(Some(outcome))
    }
}
