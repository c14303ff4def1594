//! HTTP implementation of the document store client.
//!
//! Talks to a Notion-style REST surface. Property values and blocks are
//! serialized to the store's wire shapes here and nowhere else; query
//! results are flattened to plain text at this boundary.

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use async_trait::async_trait;

use super::types::{
    Block, Entity, EntityProperty, MutationPayload, PropertyFilter, PropertyKind, PropertyValue,
    SchemaEntry,
};
use super::DocumentStore;
use crate::error::StoreError;

const DEFAULT_BASE_URL: &str = "https://api.notion.com";
const API_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Document store client over the store's REST API.
#[derive(Clone)]
pub struct HttpDocumentStore {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpDocumentStore {
    /// Create a client with the given integration token.
    pub fn new(token: String) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        })
    }

    /// Override the API base URL (self-hosted proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, StoreError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", API_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }
        Ok(response.json().await?)
    }
}

/// Map a non-success HTTP status to the store error taxonomy.
fn classify_failure(status: StatusCode, body: String) -> StoreError {
    let body: String = body.chars().take(200).collect();
    match status.as_u16() {
        404 => StoreError::NotFound(body),
        429 => StoreError::RateLimited,
        400 | 422 if body.contains("validation") => StoreError::SchemaMismatch(body),
        code => StoreError::Unexpected { status: code, body },
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get_schema(&self, collection_id: &str) -> Result<Vec<SchemaEntry>, StoreError> {
        let body = self
            .send(Method::GET, &format!("/v1/databases/{collection_id}"), None)
            .await?;

        let mut entries = Vec::new();
        if let Some(properties) = body.get("properties").and_then(Value::as_object) {
            for (name, definition) in properties {
                let Some(kind) = definition
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(kind_from_wire)
                else {
                    // Kinds this core never writes (rollups, formulas, ...).
                    continue;
                };
                entries.push(SchemaEntry {
                    name: name.clone(),
                    kind,
                    options: wire_options(definition, kind),
                });
            }
        }
        Ok(entries)
    }

    async fn query(
        &self,
        collection_id: &str,
        filter: &PropertyFilter,
        page_size: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        let body = json!({
            "filter": filter_to_wire(filter),
            "sorts": [{ "timestamp": "last_edited_time", "direction": "descending" }],
            "page_size": page_size,
        });
        let response = self
            .send(
                Method::POST,
                &format!("/v1/databases/{collection_id}/query"),
                Some(body),
            )
            .await?;

        let mut entities = Vec::new();
        for result in response
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            match entity_from_wire(result) {
                Some(entity) => entities.push(entity),
                None => warn!(collection_id, "skipping unparsable entity in query result"),
            }
        }
        Ok(entities)
    }

    async fn update_entity(
        &self,
        entity_id: &str,
        payload: &MutationPayload,
    ) -> Result<(), StoreError> {
        let body = json!({ "properties": payload_to_wire(payload) });
        self.send(Method::PATCH, &format!("/v1/pages/{entity_id}"), Some(body))
            .await?;
        Ok(())
    }

    async fn create_entity(
        &self,
        collection_id: &str,
        payload: &MutationPayload,
        cover_url: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut body = json!({
            "parent": { "database_id": collection_id },
            "properties": payload_to_wire(payload),
        });
        if let Some(cover) = cover_url {
            body["cover"] = json!({ "type": "external", "external": { "url": cover } });
        }
        let response = self.send(Method::POST, "/v1/pages", Some(body)).await?;
        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Unexpected {
                status: 200,
                body: "create response missing entity id".to_string(),
            })
    }

    async fn append_blocks(&self, entity_id: &str, blocks: &[Block]) -> Result<(), StoreError> {
        let children: Vec<Value> = blocks.iter().map(block_to_wire).collect();
        let body = json!({ "children": children });
        self.send(
            Method::PATCH,
            &format!("/v1/blocks/{entity_id}/children"),
            Some(body),
        )
        .await?;
        Ok(())
    }
}

fn kind_from_wire(kind: &str) -> Option<PropertyKind> {
    match kind {
        "select" => Some(PropertyKind::Select),
        "multi_select" => Some(PropertyKind::MultiSelect),
        "status" => Some(PropertyKind::Status),
        "url" => Some(PropertyKind::Url),
        "date" => Some(PropertyKind::Date),
        "relation" => Some(PropertyKind::Relation),
        "rich_text" => Some(PropertyKind::RichText),
        "title" => Some(PropertyKind::Title),
        _ => None,
    }
}

fn wire_kind(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Select => "select",
        PropertyKind::MultiSelect => "multi_select",
        PropertyKind::Status => "status",
        PropertyKind::Url => "url",
        PropertyKind::Date => "date",
        PropertyKind::Relation => "relation",
        PropertyKind::RichText => "rich_text",
        PropertyKind::Title => "title",
    }
}

fn wire_options(definition: &Value, kind: PropertyKind) -> Vec<String> {
    if !kind.is_enumerated() {
        return Vec::new();
    }
    definition
        .get(wire_kind(kind))
        .and_then(|d| d.get("options"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|o| o.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn filter_to_wire(filter: &PropertyFilter) -> Value {
    let condition = match filter.kind {
        PropertyKind::Select => json!({ "select": { "equals": filter.value } }),
        PropertyKind::MultiSelect => json!({ "multi_select": { "contains": filter.value } }),
        PropertyKind::Status => json!({ "status": { "equals": filter.value } }),
        PropertyKind::Url => json!({ "url": { "equals": filter.value } }),
        PropertyKind::Date => json!({ "date": { "equals": filter.value } }),
        PropertyKind::Relation => json!({ "relation": { "contains": filter.value } }),
        PropertyKind::RichText | PropertyKind::Title => {
            json!({ "rich_text": { "equals": filter.value } })
        }
    };
    let mut wire = json!({ "property": filter.property });
    for (key, value) in condition.as_object().into_iter().flatten() {
        wire[key] = value.clone();
    }
    wire
}

fn rich_text_value(text: &str) -> Value {
    json!([{ "type": "text", "text": { "content": text } }])
}

fn payload_to_wire(payload: &MutationPayload) -> Value {
    let mut properties = serde_json::Map::new();
    for (name, value) in payload {
        properties.insert(name.clone(), value_to_wire(value));
    }
    Value::Object(properties)
}

fn value_to_wire(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Select { name } => json!({ "select": { "name": name } }),
        PropertyValue::MultiSelect { names } => {
            let options: Vec<Value> = names.iter().map(|n| json!({ "name": n })).collect();
            json!({ "multi_select": options })
        }
        PropertyValue::Status { name } => json!({ "status": { "name": name } }),
        PropertyValue::Url(url) => json!({ "url": url }),
        PropertyValue::Date { start } => {
            json!({ "date": { "start": start.format("%Y-%m-%d").to_string() } })
        }
        PropertyValue::Relation { ids } => {
            let refs: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
            json!({ "relation": refs })
        }
        PropertyValue::RichText(text) => json!({ "rich_text": rich_text_value(text) }),
        PropertyValue::Title(text) => json!({ "title": rich_text_value(text) }),
    }
}

fn block_to_wire(block: &Block) -> Value {
    match block {
        Block::Paragraph { text } => json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text_value(text) },
        }),
        Block::Bookmark { label, url } => json!({
            "object": "block",
            "type": "bookmark",
            "bookmark": { "url": url, "caption": rich_text_value(label) },
        }),
        Block::ActionItem { text, checked } => json!({
            "object": "block",
            "type": "to_do",
            "to_do": { "rich_text": rich_text_value(text), "checked": checked },
        }),
        Block::Bullet { text } => json!({
            "object": "block",
            "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": rich_text_value(text) },
        }),
    }
}

fn entity_from_wire(value: &Value) -> Option<Entity> {
    let id = value.get("id")?.as_str()?.to_string();
    let last_edited = value
        .get("last_edited_time")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))?;

    let mut properties = BTreeMap::new();
    for (name, prop) in value
        .get("properties")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
    {
        let Some(kind) = prop
            .get("type")
            .and_then(Value::as_str)
            .and_then(kind_from_wire)
        else {
            continue;
        };
        properties.insert(
            name.clone(),
            EntityProperty {
                kind,
                plain_text: property_plain_text(prop, kind),
            },
        );
    }

    Some(Entity {
        id,
        last_edited,
        properties,
    })
}

fn property_plain_text(prop: &Value, kind: PropertyKind) -> Option<String> {
    let value = prop.get(wire_kind(kind))?;
    let text = match kind {
        PropertyKind::Select | PropertyKind::Status => value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        PropertyKind::MultiSelect => {
            let names: Vec<&str> = value
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        PropertyKind::Url => value.as_str().map(str::to_string),
        PropertyKind::Date => value
            .get("start")
            .and_then(Value::as_str)
            .map(str::to_string),
        PropertyKind::Relation => {
            let ids: Vec<&str> = value
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|r| r.get("id").and_then(Value::as_str))
                .collect();
            (!ids.is_empty()).then(|| ids.join(", "))
        }
        PropertyKind::RichText | PropertyKind::Title => {
            let joined: String = value
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
                .collect();
            (!joined.is_empty()).then_some(joined)
        }
    };
    text.filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn classifies_store_failures() {
        assert!(matches!(
            classify_failure(StatusCode::NOT_FOUND, "gone".into()),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, String::new()),
            StoreError::RateLimited
        ));
        assert!(matches!(
            classify_failure(
                StatusCode::BAD_REQUEST,
                r#"{"code":"validation_error","message":"Status is expected to be select"}"#.into()
            ),
            StoreError::SchemaMismatch(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            StoreError::Unexpected { status: 500, .. }
        ));
    }

    #[test]
    fn select_filter_uses_equals_condition() {
        let wire = filter_to_wire(&PropertyFilter {
            property: "Caption Status".to_string(),
            kind: PropertyKind::Select,
            value: "Ready For Captions".to_string(),
        });
        assert_eq!(wire["property"], "Caption Status");
        assert_eq!(wire["select"]["equals"], "Ready For Captions");
    }

    #[test]
    fn entity_parses_from_wire_shape() {
        let wire = json!({
            "id": "abc-123",
            "last_edited_time": "2026-03-01T10:00:00.000Z",
            "properties": {
                "Name": { "type": "title", "title": [{ "plain_text": "Desert Cut" }] },
                "Status": { "type": "status", "status": { "name": "Editing" } },
                "Editor": { "type": "multi_select", "multi_select": [{ "name": "Ray" }] },
                "Score": { "type": "number", "number": 3 },
            }
        });
        let entity = entity_from_wire(&wire).unwrap();
        assert_eq!(entity.id, "abc-123");
        assert_eq!(entity.title(), Some("Desert Cut"));
        assert_eq!(
            entity.properties["Status"].plain_text.as_deref(),
            Some("Editing")
        );
        // Unsupported kinds are dropped at the boundary.
        assert!(!entity.properties.contains_key("Score"));
    }

    #[test]
    fn payload_serializes_each_kind() {
        let mut payload = MutationPayload::new();
        payload.insert(
            "Status".to_string(),
            PropertyValue::Select {
                name: "VA Render".to_string(),
            },
        );
        payload.insert(
            "Due Date".to_string(),
            PropertyValue::Date {
                start: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            },
        );
        let wire = payload_to_wire(&payload);
        assert_eq!(wire["Status"]["select"]["name"], "VA Render");
        assert_eq!(wire["Due Date"]["date"]["start"], "2026-03-14");
    }
}
