use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub type Row = Map<String, Value>;

/// Server-reported pagination metadata, Laravel naming on the wire
/// (`current_page`, `per_page`, `total`, `last_page`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub last_page: u64,
}

/// A decoded response resolved into one of the two list shapes every screen
/// consumes. The API mixes flat arrays, `{status, data}` wrappers, nested
/// `data.data` envelopes and `media` collections; this is resolved exactly
/// once here instead of per screen.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Paginated { items: Vec<Value>, meta: PageMeta },
    Flat { items: Vec<Value> },
}

#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("response shape not recognized: {reason}")]
    Unrecognized { reason: String },
}

impl Payload {
    pub fn items(&self) -> &[Value] {
        match self {
            Payload::Paginated { items, .. } => items,
            Payload::Flat { items } => items,
        }
    }

    pub fn meta(&self) -> Option<PageMeta> {
        match self {
            Payload::Paginated { meta, .. } => Some(*meta),
            Payload::Flat { .. } => None,
        }
    }

    /// Object items as table rows. Non-object items carry no fields to
    /// filter on and are dropped.
    pub fn rows(&self) -> Vec<Row> {
        self.items()
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

const META_KEYS: [&str; 4] = ["current_page", "per_page", "total", "last_page"];

pub fn normalize(value: Value) -> Result<Payload, ShapeError> {
    match value {
        Value::Array(items) => Ok(Payload::Flat { items }),
        Value::Null => Ok(Payload::Flat { items: Vec::new() }),
        Value::Object(obj) => normalize_object(obj),
        other => Err(ShapeError::Unrecognized {
            reason: format!("top-level {} is not a list shape", kind_name(&other)),
        }),
    }
}

fn normalize_object(obj: Row) -> Result<Payload, ShapeError> {
    let has_meta = META_KEYS.iter().any(|k| obj.contains_key(*k));

    match obj.get("data").cloned() {
        Some(Value::Array(items)) if has_meta => {
            let meta = read_meta(&obj, items.len() as u64);
            Ok(Payload::Paginated { items, meta })
        }
        Some(Value::Array(items)) => Ok(Payload::Flat { items }),
        // {status, data} wrappers and data.data envelopes unwrap one level
        // at a time until a list shape appears.
        Some(Value::Object(inner)) => normalize_object(inner),
        Some(Value::Null) => Ok(Payload::Flat { items: Vec::new() }),
        Some(other) => Err(ShapeError::Unrecognized {
            reason: format!("'data' field holds a {}", kind_name(&other)),
        }),
        None => match obj.get("media") {
            Some(Value::Array(items)) => Ok(Payload::Flat {
                items: items.clone(),
            }),
            _ => Ok(Payload::Flat {
                items: vec![Value::Object(obj)],
            }),
        },
    }
}

fn read_meta(obj: &Row, item_count: u64) -> PageMeta {
    let num = |key: &str| obj.get(key).and_then(Value::as_u64);
    let page = num("current_page").unwrap_or(1).max(1);
    let page_size = num("per_page").unwrap_or(item_count).max(1);
    let total = num("total").unwrap_or(item_count);
    let last_page = num("last_page")
        .unwrap_or_else(|| total.div_ceil(page_size))
        .max(1);
    PageMeta {
        page,
        page_size,
        total,
        last_page,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
