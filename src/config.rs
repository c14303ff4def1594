//! Runtime configuration for the tracker and watcher.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the reconciliation engine and change watcher.
///
/// `Default` reads environment variables with sensible fallbacks so a
/// deployment can be configured without code changes; tests construct the
/// struct directly.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Bearer token for the document store. Empty means unconfigured, which
    /// short-circuits every watch cycle with a single warning.
    pub store_token: String,
    /// Collection (database) holding the project entities.
    pub collection_id: String,
    /// Cadence of the change watcher.
    pub poll_interval: Duration,
    /// Page size for rule queries; newest edits first, first page only.
    pub page_size: usize,
    /// Durable location of the user-defined watch rules.
    pub rules_path: PathBuf,
    /// Property watched by the built-in always-on rule.
    pub default_watch_property: String,
    /// Value the built-in rule matches.
    pub default_watch_value: String,
    /// Notification target (webhook URL or channel reference) for the
    /// built-in rule.
    pub default_notify_target: String,
    /// Property holding the short project code used as the business key.
    pub key_property: String,
    /// Title property seeded on entity creation.
    pub title_property: String,
    /// Category property seeded from the business-key prefix on creation.
    pub category_property: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            store_token: std::env::var("TRACKER_STORE_TOKEN").unwrap_or_default(),
            collection_id: std::env::var("TRACKER_COLLECTION_ID").unwrap_or_default(),
            poll_interval: Duration::from_secs(
                std::env::var("TRACKER_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            page_size: std::env::var("TRACKER_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            rules_path: std::env::var("TRACKER_RULES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("watch_rules.json")),
            default_watch_property: std::env::var("TRACKER_DEFAULT_WATCH_PROPERTY")
                .unwrap_or_else(|_| "Caption Status".to_string()),
            default_watch_value: std::env::var("TRACKER_DEFAULT_WATCH_VALUE")
                .unwrap_or_else(|_| "Ready For Captions".to_string()),
            default_notify_target: std::env::var("TRACKER_NOTIFY_TARGET").unwrap_or_default(),
            key_property: "Code".to_string(),
            title_property: "Name".to_string(),
            category_property: "Category".to_string(),
        }
    }
}

impl TrackerConfig {
    /// True when the store credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.store_token.is_empty() && !self.collection_id.is_empty()
    }
}
