//! Document store client seam.
//!
//! The core consumes the external project collection through the
//! [`DocumentStore`] trait so tests and alternative backends can substitute
//! in-memory implementations.

pub mod http;
pub mod types;

pub use http::HttpDocumentStore;
pub use types::{
    Block, Entity, EntityProperty, MutationPayload, PropertyFilter, PropertyKind, PropertyValue,
    SchemaEntry,
};

use async_trait::async_trait;

use crate::error::StoreError;

/// Abstract client for the external project collection.
///
/// Implementations classify failures into [`StoreError`] variants so callers
/// can react to schema mismatches and rate limiting.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Column definitions for a collection.
    async fn get_schema(&self, collection_id: &str) -> Result<Vec<SchemaEntry>, StoreError>;

    /// Entities where `filter.property == filter.value`, newest edits first,
    /// bounded to one page.
    async fn query(
        &self,
        collection_id: &str,
        filter: &PropertyFilter,
        page_size: usize,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Apply property writes to an existing entity.
    async fn update_entity(
        &self,
        entity_id: &str,
        payload: &MutationPayload,
    ) -> Result<(), StoreError>;

    /// Create an entity in the collection, returning its id.
    async fn create_entity(
        &self,
        collection_id: &str,
        payload: &MutationPayload,
        cover_url: Option<&str>,
    ) -> Result<String, StoreError>;

    /// Append block-level content to an entity body.
    async fn append_blocks(&self, entity_id: &str, blocks: &[Block]) -> Result<(), StoreError>;
}
