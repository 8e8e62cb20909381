use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{RetrievedContent, RetrievedItem};
use crate::error::{RetrievalError, RetrievalResult};

/// Known backend response shapes. Each maps to exactly one normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// A string body, or an object carrying `context`/`text`/`content`.
    PlainText,
    /// User profile entries: `topic`, `sub_topic`, `content`.
    Profile,
    /// Timeline events: `id`, `timestamp`, `content`, `tags`.
    Events,
    /// Fact gists: `id`, `content`, `confidence`.
    EventGists,
    /// Memory items: `memory_id`, `content`, `similarity_score`, optionally
    /// nested under `memory`.
    MemoryItems,
    /// Clustered categories: `category_name`, `content`.
    ClusteredCategories,
    /// Any list of objects with a `content` field.
    Generic,
}

impl std::fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResponseShape::PlainText => "plain_text",
            ResponseShape::Profile => "profile",
            ResponseShape::Events => "events",
            ResponseShape::EventGists => "event_gists",
            ResponseShape::MemoryItems => "memory_items",
            ResponseShape::ClusteredCategories => "clustered_categories",
            ResponseShape::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}

/// Normalize a backend payload according to its declared shape.
pub fn normalize(shape: ResponseShape, payload: &Value) -> RetrievalResult<RetrievedContent> {
    match shape {
        ResponseShape::PlainText => normalize_plain_text(payload),
        ResponseShape::Profile => normalize_profile(payload),
        ResponseShape::Events => normalize_events(payload),
        ResponseShape::EventGists => normalize_event_gists(payload),
        ResponseShape::MemoryItems => normalize_memory_items(payload),
        ResponseShape::ClusteredCategories => normalize_clustered_categories(payload),
        ResponseShape::Generic => normalize_generic(payload),
    }
}

/// Plain context string.
pub fn normalize_plain_text(payload: &Value) -> RetrievalResult<RetrievedContent> {
    let text = match payload {
        Value::Null => return Ok(RetrievedContent::Empty),
        Value::String(s) => s.as_str(),
        Value::Object(obj) => match ["context", "text", "content"]
            .iter()
            .find_map(|k| obj.get(*k))
        {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Null) => return Ok(RetrievedContent::Empty),
            None if obj.is_empty() => return Ok(RetrievedContent::Empty),
            _ => return Err(invalid("plain_text", "expected a context string")),
        },
        _ => return Err(invalid("plain_text", "expected a string or object")),
    };

    if text.trim().is_empty() {
        Ok(RetrievedContent::Empty)
    } else {
        Ok(RetrievedContent::Text(text.to_string()))
    }
}

/// Profile entries.
pub fn normalize_profile(payload: &Value) -> RetrievalResult<RetrievedContent> {
    map_items(payload, "profile", &["profiles", "profile"], |obj| {
        Some(
            RetrievedItem::new(string_field(obj, "content")?)
                .with_attribute("topic", string_field(obj, "topic").unwrap_or_default())
                .with_attribute(
                    "sub_topic",
                    string_field(obj, "sub_topic").unwrap_or_default(),
                ),
        )
    })
}

/// Timeline events.
pub fn normalize_events(payload: &Value) -> RetrievalResult<RetrievedContent> {
    map_items(payload, "events", &["events"], |obj| {
        let content = string_field(obj, "content").or_else(|| {
            // Some event payloads nest the text under event_data.
            obj.get("event_data")
                .and_then(Value::as_object)
                .and_then(|d| string_field(d, "content"))
        })?;
        Some(
            RetrievedItem::new(content)
                .with_attribute("event_id", string_field(obj, "id").unwrap_or_else(unknown))
                .with_attribute(
                    "time",
                    string_field(obj, "timestamp")
                        .or_else(|| string_field(obj, "created_at"))
                        .unwrap_or_else(unknown),
                )
                .with_attribute("tags", string_field(obj, "tags").unwrap_or_default()),
        )
    })
}

/// Fact gists.
pub fn normalize_event_gists(payload: &Value) -> RetrievalResult<RetrievedContent> {
    map_items(payload, "event_gists", &["gists", "events"], |obj| {
        Some(
            RetrievedItem::new(string_field(obj, "content")?)
                .with_attribute("fact_id", string_field(obj, "id").unwrap_or_else(unknown))
                .with_attribute(
                    "confidence",
                    string_field(obj, "confidence").unwrap_or_else(|| "N/A".to_string()),
                ),
        )
    })
}

/// Related memory items.
pub fn normalize_memory_items(payload: &Value) -> RetrievalResult<RetrievedContent> {
    map_items(
        payload,
        "memory_items",
        &["related_memories", "memories", "items"],
        |obj| {
            let memory = obj.get("memory").and_then(Value::as_object).unwrap_or(obj);
            Some(
                RetrievedItem::new(string_field(memory, "content")?)
                    .with_attribute(
                        "memory_id",
                        string_field(memory, "memory_id").unwrap_or_else(unknown),
                    )
                    .with_attribute(
                        "relevance",
                        string_field(obj, "similarity_score").unwrap_or_else(|| "N/A".to_string()),
                    ),
            )
        },
    )
}

/// Clustered categories.
pub fn normalize_clustered_categories(payload: &Value) -> RetrievalResult<RetrievedContent> {
    map_items(
        payload,
        "clustered_categories",
        &["clustered_categories", "categories"],
        |obj| {
            Some(
                RetrievedItem::new(string_field(obj, "content")?).with_attribute(
                    "category",
                    string_field(obj, "category_name")
                        .or_else(|| string_field(obj, "name"))
                        .unwrap_or_else(unknown),
                ),
            )
        },
    )
}

/// Any list of `{content}` objects or plain strings.
pub fn normalize_generic(payload: &Value) -> RetrievalResult<RetrievedContent> {
    if let Value::String(_) = payload {
        return normalize_plain_text(payload);
    }
    map_items(payload, "generic", &[], |obj| {
        string_field(obj, "content").map(RetrievedItem::new)
    })
}

/// Locate the item list (top-level array or a well-known key), map each
/// object, and reject objects the mapper cannot read.
fn map_items<F>(
    payload: &Value,
    shape: &str,
    keys: &[&str],
    mut map: F,
) -> RetrievalResult<RetrievedContent>
where
    F: FnMut(&Map<String, Value>) -> Option<RetrievedItem>,
{
    let list = match payload {
        Value::Null => return Ok(RetrievedContent::Empty),
        Value::Array(list) => list,
        Value::Object(obj) => {
            let found = keys
                .iter()
                .chain(["items", "results", "data"].iter())
                .find_map(|k| obj.get(*k));
            match found {
                Some(Value::Array(list)) => list,
                Some(Value::Null) | None => return Ok(RetrievedContent::Empty),
                Some(_) => return Err(invalid(shape, "item list is not an array")),
            }
        }
        _ => return Err(invalid(shape, "expected an array or object")),
    };

    let mut items = Vec::with_capacity(list.len());
    for (idx, entry) in list.iter().enumerate() {
        let item = match entry {
            Value::String(s) => Some(RetrievedItem::new(s.clone())),
            Value::Object(obj) => map(obj),
            _ => None,
        };
        match item {
            Some(item) => items.push(item),
            None => {
                return Err(invalid(
                    shape,
                    &format!("item {} has no readable content", idx),
                ))
            }
        }
    }

    if items.is_empty() {
        Ok(RetrievedContent::Empty)
    } else {
        Ok(RetrievedContent::Items(items))
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => Some(
            values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn unknown() -> String {
    "unknown".to_string()
}

fn invalid(shape: &str, message: &str) -> RetrievalError {
    RetrievalError::InvalidResponse {
        message: format!("{}: {}", shape, message),
    }
}
