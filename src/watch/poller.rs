//! Fixed-interval change watcher.
//!
//! Each cycle evaluates the built-in rule and every enabled user rule in
//! sequence, notifying at most once per (rule, entity) pair. A watermark
//! captured at startup keeps the watcher from replaying history; dedup
//! entries carry their own timestamp and expire after a fixed TTL, which
//! bounds memory without a synchronized wholesale wipe.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration as TtlDuration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{WatchRule, WatcherRegistry};
use crate::config::TrackerConfig;
use crate::error::StoreError;
use crate::notify::Notifier;
use crate::schema::SchemaCache;
use crate::store::{DocumentStore, PropertyFilter};

/// How long a notified (rule, entity) pair stays in the dedup set.
const DEDUP_TTL_HOURS: i64 = 2;

const FALLBACK_TITLE: &str = "Untitled project";

/// Polls the store for entities matching watch rules and dispatches
/// one-time notifications.
pub struct ChangeWatcher {
    store: Arc<dyn DocumentStore>,
    schema: Arc<SchemaCache>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<Mutex<WatcherRegistry>>,
    config: TrackerConfig,
    /// Entities last modified at or before this instant never notify.
    watermark: DateTime<Utc>,
    processed: Mutex<HashMap<(Uuid, String), DateTime<Utc>>>,
    in_flight: AtomicBool,
}

impl ChangeWatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        schema: Arc<SchemaCache>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<Mutex<WatcherRegistry>>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            schema,
            notifier,
            registry,
            config,
            watermark: Utc::now(),
            processed: Mutex::new(HashMap::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Override the startup watermark, e.g. when resuming with a persisted
    /// cursor instead of "now".
    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Number of (rule, entity) pairs currently remembered as processed.
    pub fn processed_len(&self) -> usize {
        self.processed.lock().unwrap().len()
    }

    /// Run the watcher on its fixed cadence until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(
                interval = ?self.config.poll_interval,
                watermark = %self.watermark,
                "change watcher started"
            );
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    /// One poll cycle. A tick arriving while the previous cycle is still
    /// running is skipped, not queued.
    pub async fn tick(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!("previous watch cycle still running; skipping this tick");
            return;
        }
        self.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);
    }

    async fn run_cycle(&self) {
        if !self.config.has_credentials() {
            warn!("store credentials missing; skipping watch cycle");
            return;
        }

        self.evict_expired();

        let rules = self.registry.lock().unwrap().enabled_rules();
        // Only one notification per entity per cycle, even when several
        // rules match it; the first-listed rule wins.
        let mut cycle_notified: HashSet<String> = HashSet::new();

        for rule in rules {
            if let Err(e) = self.evaluate_rule(&rule, &mut cycle_notified).await {
                warn!(
                    rule_id = %rule.id,
                    rule = %rule.name,
                    error = %e,
                    "watch rule evaluation failed; continuing with remaining rules"
                );
            }
        }
    }

    async fn evaluate_rule(
        &self,
        rule: &WatchRule,
        cycle_notified: &mut HashSet<String>,
    ) -> Result<()> {
        let collection = &self.config.collection_id;
        let entry = self
            .schema
            .property(collection, &rule.property)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "watched property '{}' is not in the collection schema",
                    rule.property
                )
            })?;

        let filter = PropertyFilter {
            property: rule.property.clone(),
            kind: entry.kind,
            value: rule.value.clone(),
        };
        let entities = match self
            .store
            .query(collection, &filter, self.config.page_size)
            .await
        {
            Ok(entities) => entities,
            Err(e) => {
                if matches!(e, StoreError::SchemaMismatch(_)) {
                    self.schema.invalidate(collection);
                }
                return Err(e.into());
            }
        };
        debug!(rule_id = %rule.id, matches = entities.len(), "rule evaluated");

        for entity in entities {
            let key = (rule.id, entity.id.clone());
            if self.is_processed(&key) {
                continue;
            }
            if entity.last_edited <= self.watermark {
                // Pre-existing state: remember it, never notify.
                self.mark_processed(key);
                continue;
            }
            if cycle_notified.contains(&entity.id) {
                self.mark_processed(key);
                continue;
            }

            let title = entity.title().unwrap_or(FALLBACK_TITLE).to_string();
            let text = format!("{}: \"{}\" is now '{}'", rule.name, title, rule.value);
            if let Err(e) = self.notifier.send(&rule.target, &text).await {
                warn!(
                    rule_id = %rule.id,
                    entity_id = %entity.id,
                    error = %e,
                    "notification dispatch failed"
                );
            }
            // At-most-once: the pair counts as processed whether or not
            // dispatch succeeded.
            cycle_notified.insert(entity.id.clone());
            self.mark_processed(key);
            info!(
                rule_id = %rule.id,
                entity_id = %entity.id,
                %title,
                value = %rule.value,
                "watch notification dispatched"
            );
        }
        Ok(())
    }

    fn is_processed(&self, key: &(Uuid, String)) -> bool {
        self.processed.lock().unwrap().contains_key(key)
    }

    fn mark_processed(&self, key: (Uuid, String)) {
        self.processed.lock().unwrap().insert(key, Utc::now());
    }

    fn evict_expired(&self) {
        let cutoff = Utc::now() - TtlDuration::hours(DEDUP_TTL_HOURS);
        let mut processed = self.processed.lock().unwrap();
        let before = processed.len();
        processed.retain(|_, notified_at| *notified_at > cutoff);
        let evicted = before - processed.len();
        if evicted > 0 {
            debug!(evicted, "expired dedup entries evicted");
        }
    }
}
