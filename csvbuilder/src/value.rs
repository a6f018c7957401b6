//! Cell values and the per-call context.
//!
//! Cells travel through the pipeline as [`serde_json::Value`] so accessors
//! may return booleans, numbers or whole objects; they are flattened back to
//! text only when a physical row is written.

use serde_json::{Map, Value};

/// Free-form context handed to every hook and accessor.
///
/// On export it also carries the runtime collections that dynamic column
/// templates are bound to (`{"skills": ["Ruby", "Python"]}`).
pub type Context = Map<String, Value>;

/// Render a value as the text of one CSV cell.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Check if a value is "blank" (null, whitespace-only string, empty list/object)
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Display text for a dynamic column entry.
///
/// Strings are used as-is; objects contribute their `name` or `header` key.
pub fn entry_text(entry: &Value) -> String {
    match entry {
        Value::Object(obj) => obj
            .get("header")
            .or_else(|| obj.get("name"))
            .map(cell_text)
            .unwrap_or_else(|| entry.to_string()),
        other => cell_text(other),
    }
}

/// `first_name` -> `First name`
pub fn humanize(name: &str) -> String {
    let spaced = name.trim_end_matches("_id").replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Merge `overrides` on top of `base`, keeping `base` order for shared keys.
pub fn merge_context(base: &Context, overrides: &Context) -> Context {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
