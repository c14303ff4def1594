//! Callsheet - reconciliation core for a content-production project tracker.
//!
//! Turns semantic property patches (extracted upstream from chat messages)
//! into native mutations against an external document store, and watches
//! that store for state transitions to deliver one-time notifications.
//!
//! ## Architecture
//!
//! Reconciliation: caller supplies a business key and a [`PropertyPatch`] ->
//! [`PropertyMapper`] resolves it into a mutation payload (consulting
//! [`SchemaCache`] and the value resolver) -> [`EntityMutator`] applies it,
//! creating the entity first when absent.
//!
//! Watching: [`ChangeWatcher`] runs on its own timer, evaluating the
//! [`WatcherRegistry`] rules against the store and notifying exactly once
//! per (rule, entity) pair within the dedup window.
//!
//! The chat surface, command parsing, and the NL extraction backend are
//! external collaborators; this crate consumes them through the
//! [`PatchExtractor`] and [`Notifier`] seams.

// Core error handling
pub mod error;

// Runtime configuration
pub mod config;

// Document store client and native data shapes
pub mod store;

// Cached column definitions
pub mod schema;

// Fuzzy option matching
pub mod resolve;

// Semantic patch model and extraction seam
pub mod patch;

// Patch -> mutation payload mapping
pub mod mapper;

// Entity upserts and note content
pub mod mutator;

// Notification sink
pub mod notify;

// Watch rules and the change poller
pub mod watch;

// Service facade
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{RegistryError, StoreError};
pub use mapper::{FieldError, MappedPatch, PropertyMapper};
pub use mutator::EntityMutator;
pub use notify::{Notifier, WebhookNotifier};
pub use patch::{PatchExtractor, PatchValue, PropertyPatch};
pub use schema::SchemaCache;
pub use store::{DocumentStore, HttpDocumentStore};
pub use tracker::{ProjectTracker, ReconcileOutcome};
pub use watch::{ChangeWatcher, WatchRule, WatcherRegistry};
