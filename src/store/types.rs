//! Native data shapes for the external document store.
//!
//! Property writes are a tagged union with one variant per declared column
//! kind, so the mapper's per-kind branching is exhaustive and checked by the
//! compiler.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declared kind of a collection property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Select,
    MultiSelect,
    Status,
    Url,
    Date,
    Relation,
    RichText,
    Title,
}

impl PropertyKind {
    /// Kinds whose writes are matched against a list of allowed options.
    pub fn is_enumerated(self) -> bool {
        matches!(
            self,
            PropertyKind::Select | PropertyKind::MultiSelect | PropertyKind::Status
        )
    }
}

/// One column definition fetched from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub kind: PropertyKind,
    /// Allowed option names in store order. Empty for non-enumerated kinds
    /// and for open-ended tag columns with no declared options.
    #[serde(default)]
    pub options: Vec<String>,
}

/// A single property write in the store's native shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Select { name: String },
    MultiSelect { names: Vec<String> },
    Status { name: String },
    Url(String),
    Date { start: NaiveDate },
    Relation { ids: Vec<String> },
    RichText(String),
    Title(String),
}

/// Property writes keyed by store property name.
pub type MutationPayload = BTreeMap<String, PropertyValue>;

/// Flattened view of one property on a fetched entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityProperty {
    pub kind: PropertyKind,
    /// Plain-text rendering of the stored value; `None` when unpopulated.
    pub plain_text: Option<String>,
}

/// One record in the external project collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub last_edited: DateTime<Utc>,
    pub properties: BTreeMap<String, EntityProperty>,
}

impl Entity {
    /// First populated title-kind property, if any.
    pub fn title(&self) -> Option<&str> {
        self.properties
            .values()
            .filter(|p| p.kind == PropertyKind::Title)
            .find_map(|p| p.plain_text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Equality filter for collection queries.
///
/// The property's declared kind selects the store-native filter shape, so
/// callers resolve it from the schema before querying.
#[derive(Debug, Clone)]
pub struct PropertyFilter {
    pub property: String,
    pub kind: PropertyKind,
    pub value: String,
}

/// Block-level content appended to an entity body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Paragraph { text: String },
    /// Labeled hyperlink.
    Bookmark { label: String, url: String },
    /// Checkable action item.
    ActionItem { text: String, checked: bool },
    Bullet { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(kind: PropertyKind, text: Option<&str>) -> EntityProperty {
        EntityProperty {
            kind,
            plain_text: text.map(str::to_string),
        }
    }

    #[test]
    fn title_picks_first_populated_title_property() {
        let mut properties = BTreeMap::new();
        properties.insert("Name".to_string(), prop(PropertyKind::Title, Some("Desert Cut")));
        properties.insert("Status".to_string(), prop(PropertyKind::Status, Some("Editing")));
        let entity = Entity {
            id: "e1".to_string(),
            last_edited: Utc::now(),
            properties,
        };
        assert_eq!(entity.title(), Some("Desert Cut"));
    }

    #[test]
    fn title_ignores_empty_title_properties() {
        let mut properties = BTreeMap::new();
        properties.insert("Name".to_string(), prop(PropertyKind::Title, Some("  ")));
        let entity = Entity {
            id: "e1".to_string(),
            last_edited: Utc::now(),
            properties,
        };
        assert_eq!(entity.title(), None);
    }
}
