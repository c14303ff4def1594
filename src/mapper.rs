//! Turns a semantic property patch into native store mutation payloads.
//!
//! Every field is mapped inside its own recoverable unit: a failure lands in
//! the returned error list and never aborts the other fields. Enumerated
//! targets go through the value resolver; unresolvable values fall back to
//! the literal candidate with a warning, never a silently dropped change.

use regex::Regex;
use tracing::{debug, warn};

use crate::patch::{PatchValue, PropertyPatch};
use crate::resolve;
use crate::store::{MutationPayload, PropertyValue, SchemaEntry};

/// Mapping from semantic field name to store property.
struct FieldSpec {
    field: &'static str,
    property: &'static str,
    /// Single-owner fields are always reduced to exactly one value.
    single_valued: bool,
}

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec { field: "status", property: "Status", single_valued: true },
    FieldSpec { field: "caption_status", property: "Caption Status", single_valued: true },
    FieldSpec { field: "editor", property: "Editor", single_valued: false },
    FieldSpec { field: "writer", property: "Writer", single_valued: false },
    FieldSpec { field: "lead", property: "Lead", single_valued: true },
    FieldSpec { field: "due_date", property: "Due Date", single_valued: true },
    FieldSpec { field: "publish_date", property: "Publish Date", single_valued: true },
    FieldSpec { field: "frameio_url", property: "Frame.io", single_valued: true },
    FieldSpec { field: "script_url", property: "Script", single_valued: true },
];

/// Link kinds recognized inside free-text notes, by distinctive host
/// substring. An explicitly supplied field always wins over an extracted one.
struct LinkKind {
    field: &'static str,
    hosts: &'static [&'static str],
}

const LINK_KINDS: &[LinkKind] = &[
    LinkKind { field: "script_url", hosts: &["docs.google.com", "notion.so", "notion.site"] },
    LinkKind { field: "frameio_url", hosts: &["frame.io", "f.io"] },
];

const URL_PATTERN: &str = r#"https?://[^\s<>()\[\]"']+"#;

/// A field that could not be mapped; the rest of the patch still applies.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Result of mapping one patch: the payload of every field that mapped,
/// the free-text note if present, and the per-field failures.
#[derive(Debug, Default)]
pub struct MappedPatch {
    pub payload: MutationPayload,
    pub note: Option<String>,
    pub errors: Vec<FieldError>,
}

pub struct PropertyMapper;

impl PropertyMapper {
    /// Map a patch against the cached schema.
    pub fn map(patch: &PropertyPatch, schema: &[SchemaEntry]) -> MappedPatch {
        let mut mapped = MappedPatch::default();

        for (field, value) in &patch.fields {
            if let PatchValue::Note(text) = value {
                mapped.note = Some(text.clone());
                continue;
            }
            match map_field(field, value, schema) {
                Ok((property, write)) => {
                    mapped.payload.insert(property, write);
                }
                Err(message) => {
                    warn!(field, %message, "field mapping failed");
                    mapped.errors.push(FieldError {
                        field: field.clone(),
                        message,
                    });
                }
            }
        }

        if let Some(note) = mapped.note.clone() {
            merge_note_links(patch, &note, schema, &mut mapped.payload);
        }

        mapped
    }
}

fn field_spec(field: &str) -> Option<&'static FieldSpec> {
    FIELD_SPECS.iter().find(|s| s.field == field)
}

/// Store property a semantic field writes to. Unknown fields pass through
/// under their own name.
fn property_name(field: &str) -> &str {
    field_spec(field).map(|s| s.property).unwrap_or(field)
}

fn map_field(
    field: &str,
    value: &PatchValue,
    schema: &[SchemaEntry],
) -> Result<(String, PropertyValue), String> {
    let property = property_name(field);
    let entry = schema
        .iter()
        .find(|e| e.name == property)
        .ok_or_else(|| format!("no property '{property}' in collection schema"))?;
    let single_valued = field_spec(field).map(|s| s.single_valued).unwrap_or(false);

    let write = match value {
        PatchValue::Note(_) => unreachable!("notes are split off before field mapping"),
        PatchValue::Text(text) => scalar_write(field, entry, text)?,
        PatchValue::Url(url) => match entry.kind {
            crate::store::PropertyKind::Url => PropertyValue::Url(url.clone()),
            crate::store::PropertyKind::RichText => PropertyValue::RichText(url.clone()),
            kind => return Err(format!("link value cannot be written to {kind:?} property")),
        },
        PatchValue::Date(date) => match entry.kind {
            crate::store::PropertyKind::Date => PropertyValue::Date { start: *date },
            kind => return Err(format!("date value cannot be written to {kind:?} property")),
        },
        PatchValue::List(items) => {
            let items = dedup_preserving_order(items);
            if items.is_empty() {
                return Err("empty list value".to_string());
            }
            if single_valued {
                // Single-owner semantics: exactly one value, never a list.
                scalar_write(field, entry, &items[0])?
            } else {
                list_write(field, entry, &items)?
            }
        }
    };

    Ok((property.to_string(), write))
}

fn scalar_write(field: &str, entry: &SchemaEntry, text: &str) -> Result<PropertyValue, String> {
    use crate::store::PropertyKind::*;
    Ok(match entry.kind {
        Select => PropertyValue::Select {
            name: resolve_or_literal(field, entry, text),
        },
        Status => PropertyValue::Status {
            name: resolve_or_literal(field, entry, text),
        },
        MultiSelect => PropertyValue::MultiSelect {
            names: vec![resolve_or_literal(field, entry, text)],
        },
        Url => PropertyValue::Url(text.to_string()),
        Date => {
            let date = chrono::NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map_err(|_| format!("'{text}' is not an ISO calendar date"))?;
            PropertyValue::Date { start: date }
        }
        RichText => PropertyValue::RichText(text.to_string()),
        Title => PropertyValue::Title(text.to_string()),
        Relation => return Err("relation writes need entity ids, not free text".to_string()),
    })
}

fn list_write(field: &str, entry: &SchemaEntry, items: &[String]) -> Result<PropertyValue, String> {
    use crate::store::PropertyKind::*;
    Ok(match entry.kind {
        MultiSelect => PropertyValue::MultiSelect {
            names: items
                .iter()
                .map(|item| resolve_or_literal(field, entry, item))
                .collect(),
        },
        // Scalar targets take the first-mentioned value.
        Select | Status | Title => scalar_write(field, entry, &items[0])?,
        RichText => PropertyValue::RichText(items.join(", ")),
        Relation => PropertyValue::Relation { ids: items.to_vec() },
        Url | Date => {
            return Err(format!(
                "{kind:?} property expects a single value, got a list",
                kind = entry.kind
            ))
        }
    })
}

/// Resolve against the property's allowed options; open-ended columns (no
/// declared options, e.g. collaborator names) are written as free text.
fn resolve_or_literal(field: &str, entry: &SchemaEntry, candidate: &str) -> String {
    if !entry.kind.is_enumerated() || entry.options.is_empty() {
        return candidate.to_string();
    }
    match resolve::resolve(candidate, &entry.options) {
        Some(option) => option,
        None => {
            warn!(
                field,
                property = %entry.name,
                candidate,
                "no allowed option matched; writing literal value"
            );
            candidate.to_string()
        }
    }
}

fn dedup_preserving_order(items: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.iter().any(|s: &String| s.eq_ignore_ascii_case(trimmed)) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}

/// Pull recognizable links out of the note text for any link field the patch
/// did not supply explicitly.
fn merge_note_links(
    patch: &PropertyPatch,
    note: &str,
    schema: &[SchemaEntry],
    payload: &mut MutationPayload,
) {
    let urls = extract_urls(note);
    if urls.is_empty() {
        return;
    }

    for link_kind in LINK_KINDS {
        if patch.fields.contains_key(link_kind.field) {
            continue;
        }
        let property = property_name(link_kind.field);
        if payload.contains_key(property) {
            continue;
        }
        if !schema
            .iter()
            .any(|e| e.name == property && e.kind == crate::store::PropertyKind::Url)
        {
            continue;
        }
        if let Some(url) = urls
            .iter()
            .find(|u| link_kind.hosts.iter().any(|host| u.contains(host)))
        {
            debug!(field = link_kind.field, %url, "link extracted from note text");
            payload.insert(property.to_string(), PropertyValue::Url(url.clone()));
        }
    }
}

fn extract_urls(text: &str) -> Vec<String> {
    let Ok(pattern) = Regex::new(URL_PATTERN) else {
        return Vec::new();
    };
    pattern
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
        .filter(|u| url::Url::parse(u).is_ok())
        .collect()
}
