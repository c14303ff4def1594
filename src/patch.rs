//! The semantic property patch consumed by the reconciliation engine.
//!
//! A patch is an ephemeral mapping from semantic field name to value,
//! produced upstream (chat command layer + NL extraction) and consumed once.
//! Field shapes are a tagged union so the mapper's branching is exhaustive.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One field value in a property patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchValue {
    /// Single free-form value (status names, single collaborator, ...).
    Text(String),
    /// Multiple values, first-mention order.
    List(Vec<String>),
    /// Explicit link.
    Url(String),
    /// ISO calendar date.
    Date(NaiveDate),
    /// Free-text note appended as block content, not a property write.
    Note(String),
}

/// Ephemeral mapping from semantic field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyPatch {
    pub fields: BTreeMap<String, PatchValue>,
}

impl PropertyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: PatchValue) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The free-text note, if the patch carries one.
    pub fn note(&self) -> Option<&str> {
        self.fields.values().find_map(|v| match v {
            PatchValue::Note(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// External capability that turns raw message text into a candidate patch.
///
/// Consumed, not produced, by this core: implementations wrap whatever
/// extraction backend the deployment uses. `None` means "no change".
#[async_trait]
pub trait PatchExtractor: Send + Sync {
    async fn extract(&self, text: &str, today: NaiveDate) -> Result<Option<PropertyPatch>>;
}
