#![allow(dead_code)]

//! In-memory collaborators for integration tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use callsheet::error::StoreError;
use callsheet::store::{
    Block, DocumentStore, Entity, EntityProperty, MutationPayload, PropertyFilter, PropertyKind,
    PropertyValue, SchemaEntry,
};
use callsheet::{Notifier, TrackerConfig};

/// Route tracing output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Collection schema resembling the production tracker.
pub fn test_schema() -> Vec<SchemaEntry> {
    fn entry(name: &str, kind: PropertyKind, options: &[&str]) -> SchemaEntry {
        SchemaEntry {
            name: name.to_string(),
            kind,
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }
    vec![
        entry("Name", PropertyKind::Title, &[]),
        entry("Code", PropertyKind::RichText, &[]),
        entry(
            "Category",
            PropertyKind::Select,
            &["Documentary", "Podcast", "Shorts", "Tutorial"],
        ),
        entry(
            "Status",
            PropertyKind::Select,
            &["Scripting", "Editing", "VA Render", "Paused", "Published"],
        ),
        entry(
            "Caption Status",
            PropertyKind::Select,
            &["Not Started", "In Progress", "Ready For Captions", "Done"],
        ),
        entry("Editor", PropertyKind::MultiSelect, &[]),
        entry("Frame.io", PropertyKind::Url, &[]),
        entry("Script", PropertyKind::Url, &[]),
        entry("Due Date", PropertyKind::Date, &[]),
    ]
}

pub fn test_config(rules_path: std::path::PathBuf) -> TrackerConfig {
    TrackerConfig {
        store_token: "test-token".to_string(),
        collection_id: "col-1".to_string(),
        poll_interval: std::time::Duration::from_secs(60),
        page_size: 20,
        rules_path,
        default_watch_property: "Caption Status".to_string(),
        default_watch_value: "Ready For Captions".to_string(),
        default_notify_target: "#captions".to_string(),
        key_property: "Code".to_string(),
        title_property: "Name".to_string(),
        category_property: "Category".to_string(),
    }
}

fn flatten(value: &PropertyValue) -> (PropertyKind, Option<String>) {
    match value {
        PropertyValue::Select { name } => (PropertyKind::Select, Some(name.clone())),
        PropertyValue::MultiSelect { names } => {
            (PropertyKind::MultiSelect, Some(names.join(", ")))
        }
        PropertyValue::Status { name } => (PropertyKind::Status, Some(name.clone())),
        PropertyValue::Url(url) => (PropertyKind::Url, Some(url.clone())),
        PropertyValue::Date { start } => (PropertyKind::Date, Some(start.to_string())),
        PropertyValue::Relation { ids } => (PropertyKind::Relation, Some(ids.join(", "))),
        PropertyValue::RichText(text) => (PropertyKind::RichText, Some(text.clone())),
        PropertyValue::Title(text) => (PropertyKind::Title, Some(text.clone())),
    }
}

/// In-memory document store with counters for assertions.
pub struct InMemoryStore {
    schema: Vec<SchemaEntry>,
    pub entities: Mutex<Vec<Entity>>,
    pub schema_fetches: AtomicUsize,
    pub queries: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: Mutex<Vec<(String, MutationPayload)>>,
    pub appended: Mutex<Vec<(String, Vec<Block>)>>,
    /// When set, the next update fails with a schema-validation error.
    pub fail_next_update: AtomicBool,
    next_id: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(schema: Vec<SchemaEntry>) -> Self {
        Self {
            schema,
            entities: Mutex::new(Vec::new()),
            schema_fetches: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
            appended: Mutex::new(Vec::new()),
            fail_next_update: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Seed an entity directly, bypassing the client surface.
    pub fn seed_entity(
        &self,
        last_edited: DateTime<Utc>,
        properties: &[(&str, PropertyKind, &str)],
    ) -> String {
        let id = format!("entity-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut map = BTreeMap::new();
        for (name, kind, text) in properties {
            map.insert(
                name.to_string(),
                EntityProperty {
                    kind: *kind,
                    plain_text: Some(text.to_string()),
                },
            );
        }
        self.entities.lock().unwrap().push(Entity {
            id: id.clone(),
            last_edited,
            properties: map,
        });
        id
    }

    fn matches(entity: &Entity, filter: &PropertyFilter) -> bool {
        match entity.properties.get(&filter.property) {
            Some(prop) => match prop.kind {
                PropertyKind::MultiSelect | PropertyKind::Relation => prop
                    .plain_text
                    .as_deref()
                    .is_some_and(|t| t.split(", ").any(|part| part == filter.value)),
                _ => prop.plain_text.as_deref() == Some(filter.value.as_str()),
            },
            None => false,
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_schema(&self, _collection_id: &str) -> Result<Vec<SchemaEntry>, StoreError> {
        self.schema_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.schema.clone())
    }

    async fn query(
        &self,
        _collection_id: &str,
        filter: &PropertyFilter,
        page_size: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut matched: Vec<Entity> = self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|e| Self::matches(e, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.last_edited.cmp(&a.last_edited));
        matched.truncate(page_size);
        Ok(matched)
    }

    async fn update_entity(
        &self,
        entity_id: &str,
        payload: &MutationPayload,
    ) -> Result<(), StoreError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::SchemaMismatch(
                "property kind changed under us".to_string(),
            ));
        }
        let mut entities = self.entities.lock().unwrap();
        let entity = entities
            .iter_mut()
            .find(|e| e.id == entity_id)
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))?;
        for (name, value) in payload {
            let (kind, plain_text) = flatten(value);
            entity
                .properties
                .insert(name.clone(), EntityProperty { kind, plain_text });
        }
        entity.last_edited = Utc::now();
        self.updates
            .lock()
            .unwrap()
            .push((entity_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn create_entity(
        &self,
        _collection_id: &str,
        payload: &MutationPayload,
        _cover_url: Option<&str>,
    ) -> Result<String, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let id = format!("entity-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut properties = BTreeMap::new();
        for (name, value) in payload {
            let (kind, plain_text) = flatten(value);
            properties.insert(name.clone(), EntityProperty { kind, plain_text });
        }
        self.entities.lock().unwrap().push(Entity {
            id: id.clone(),
            last_edited: Utc::now(),
            properties,
        });
        Ok(id)
    }

    async fn append_blocks(&self, entity_id: &str, blocks: &[Block]) -> Result<(), StoreError> {
        self.appended
            .lock()
            .unwrap()
            .push((entity_id.to_string(), blocks.to_vec()));
        Ok(())
    }
}

/// Notifier that records every dispatch.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, target: &str, text: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));
        Ok(())
    }
}
