//! Error types for the reconciliation engine and change watcher.
//!
//! Store failures are classified so callers can react: a schema mismatch
//! invalidates the cached column definitions, rate limiting and network
//! failures are left for the next scheduled cycle to retry naturally.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Classified failure from the external document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema validation rejected the request: {0}")]
    SchemaMismatch(String),

    #[error("rate limited by the store")]
    RateLimited,

    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected store response {status}: {body}")]
    Unexpected { status: u16, body: String },
}

/// Failure mutating the watch-rule registry.
///
/// Persistence failures must reach the caller: the in-memory rule list and
/// the durable file are never allowed to diverge.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no watch rule with id {0}")]
    UnknownRule(Uuid),

    #[error("the built-in watch rule cannot be modified or deleted")]
    BuiltinRule,

    #[error("failed to persist watch rules to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode watch rules: {0}")]
    Encode(#[from] serde_json::Error),
}
