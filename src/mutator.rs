//! Applies resolved mutation payloads to entities, creating them on first
//! contact with a new business key, and appends free-text notes as
//! structured block content.

use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::config::TrackerConfig;
use crate::error::StoreError;
use crate::schema::SchemaCache;
use crate::store::{
    Block, DocumentStore, MutationPayload, PropertyFilter, PropertyKind, PropertyValue,
};

/// Business-key prefix → category seeded on entity creation.
const PREFIX_CATEGORIES: &[(&str, &str)] = &[
    ("DOC", "Documentary"),
    ("POD", "Podcast"),
    ("SH", "Shorts"),
    ("TUT", "Tutorial"),
];

const LABEL_LINK_PATTERN: &str = r"^([^:]{1,80}):\s*(https?://\S+)$";
const ACTION_PATTERN: &str =
    r"(?i)\b(todo|to-do|need(s|ed)?|must|should|fix|send|review|follow\s+up|update|schedule|finish|deliver|upload|check)\b";

/// Applies property mutations and note content to project entities.
pub struct EntityMutator {
    store: Arc<dyn DocumentStore>,
    schema: Arc<SchemaCache>,
    config: TrackerConfig,
}

impl EntityMutator {
    pub fn new(store: Arc<dyn DocumentStore>, schema: Arc<SchemaCache>, config: TrackerConfig) -> Self {
        Self {
            store,
            schema,
            config,
        }
    }

    /// Apply `payload` to the entity with the given business key, creating
    /// the entity first when none exists.
    ///
    /// Creation failures abort the whole call; a mutation cannot be applied
    /// to a nonexistent entity.
    #[instrument(skip(self, payload, cover_url), fields(business_key = %business_key))]
    pub async fn upsert(
        &self,
        business_key: &str,
        display_title: &str,
        payload: &MutationPayload,
        cover_url: Option<&str>,
    ) -> Result<String> {
        let collection = &self.config.collection_id;

        if let Some(entity_id) = self.find_by_key(business_key).await? {
            if !payload.is_empty() {
                self.store
                    .update_entity(&entity_id, payload)
                    .await
                    .map_err(|e| self.invalidate_on_mismatch(e))
                    .with_context(|| format!("failed to update entity {entity_id}"))?;
                info!(%entity_id, writes = payload.len(), "entity updated");
            }
            return Ok(entity_id);
        }

        let seeded = self.seed_create_payload(business_key, display_title, payload).await?;
        let entity_id = self
            .store
            .create_entity(collection, &seeded, cover_url)
            .await
            .map_err(|e| self.invalidate_on_mismatch(e))
            .with_context(|| format!("failed to create entity for '{business_key}'"))?;
        info!(%entity_id, %business_key, "entity created");
        Ok(entity_id)
    }

    /// Append free-text as block content. Independent of property-mutation
    /// success: callers decide whether a note failure matters.
    #[instrument(skip(self, text), fields(entity_id = %entity_id))]
    pub async fn append_note(&self, entity_id: &str, text: &str) -> Result<()> {
        let blocks = format_note(text);
        if blocks.is_empty() {
            return Ok(());
        }
        self.store
            .append_blocks(entity_id, &blocks)
            .await
            .with_context(|| format!("failed to append note to entity {entity_id}"))?;
        info!(blocks = blocks.len(), "note appended");
        Ok(())
    }

    async fn find_by_key(&self, business_key: &str) -> Result<Option<String>> {
        let collection = &self.config.collection_id;
        let key_kind = self
            .schema
            .property(collection, &self.config.key_property)
            .await?
            .map(|e| e.kind)
            .unwrap_or(PropertyKind::RichText);

        let filter = PropertyFilter {
            property: self.config.key_property.clone(),
            kind: key_kind,
            value: business_key.to_string(),
        };
        let matches = self.store.query(collection, &filter, 1).await?;
        Ok(matches.into_iter().next().map(|e| e.id))
    }

    /// Creation payload: caller's writes plus title, business key, and a
    /// category derived from the key prefix when the collection has one.
    async fn seed_create_payload(
        &self,
        business_key: &str,
        display_title: &str,
        payload: &MutationPayload,
    ) -> Result<MutationPayload> {
        let collection = &self.config.collection_id;
        let mut seeded = payload.clone();

        seeded
            .entry(self.config.title_property.clone())
            .or_insert_with(|| PropertyValue::Title(display_title.to_string()));

        if let Some(entry) = self.schema.property(collection, &self.config.key_property).await? {
            let key_write = match entry.kind {
                PropertyKind::Title => PropertyValue::Title(business_key.to_string()),
                _ => PropertyValue::RichText(business_key.to_string()),
            };
            seeded.entry(entry.name).or_insert(key_write);
        }

        if let Some(category) = category_for_key(business_key) {
            if let Some(entry) = self
                .schema
                .property(collection, &self.config.category_property)
                .await?
            {
                if entry.kind.is_enumerated() {
                    seeded
                        .entry(entry.name)
                        .or_insert_with(|| PropertyValue::Select {
                            name: category.to_string(),
                        });
                }
            }
        }

        Ok(seeded)
    }

    fn invalidate_on_mismatch(&self, error: StoreError) -> StoreError {
        if matches!(error, StoreError::SchemaMismatch(_)) {
            warn!(
                collection_id = %self.config.collection_id,
                "store rejected mutation on schema grounds; dropping cached schema"
            );
            self.schema.invalidate(&self.config.collection_id);
        }
        error
    }
}

/// Category implied by the business-key prefix (the segment before the
/// first dash), if it is one we recognize.
fn category_for_key(business_key: &str) -> Option<&'static str> {
    let prefix = business_key.split('-').next()?.trim().to_uppercase();
    PREFIX_CATEGORIES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, category)| *category)
}

/// Format free text into block-level content.
///
/// Lines shaped `label: URL` become labeled hyperlinks; bullet lines become
/// checkable action items when they carry task language, plain bullets
/// otherwise; everything else is a paragraph.
pub fn format_note(text: &str) -> Vec<Block> {
    let label_link = Regex::new(LABEL_LINK_PATTERN).ok();
    let action = Regex::new(ACTION_PATTERN).ok();

    let mut blocks = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = label_link.as_ref().and_then(|re| re.captures(line)) {
            blocks.push(Block::Bookmark {
                label: captures[1].trim().to_string(),
                url: captures[2].to_string(),
            });
            continue;
        }

        let bullet_text = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| line.strip_prefix("• "));
        if let Some(rest) = bullet_text {
            let rest = rest.trim();
            let is_action = action.as_ref().is_some_and(|re| re.is_match(rest));
            blocks.push(if is_action {
                Block::ActionItem {
                    text: rest.to_string(),
                    checked: false,
                }
            } else {
                Block::Bullet {
                    text: rest.to_string(),
                }
            });
            continue;
        }

        blocks.push(Block::Paragraph {
            text: line.to_string(),
        });
    }
    blocks
}
