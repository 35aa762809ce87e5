//! Schema normalization: the authored GTS dialect to standard JSON Schema.
//!
//! Authored schemas may use `$$`-prefixed escape keys (for pre-processors
//! that interpret `$ref` eagerly), `gts://` URI identifiers, and the
//! `x-gts-ref` extension keyword. The normalized form is what the
//! JSON-Schema engine compiles; `x-gts-ref` enforcement happens
//! separately against the original schema.

use serde_json::{Map, Value};

/// Combinator keywords whose arrays get ref-only branches pruned.
const COMBINATORS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// The `x-gts-ref` extension keyword.
pub const X_GTS_REF: &str = "x-gts-ref";

/// Depth-first rewrite of a schema tree into the standard dialect.
///
/// - removes every `x-gts-ref` keyword,
/// - renames `$$id`/`$$schema`/`$$ref`/`$$defs` to their canonical forms,
/// - strips the `gts://` prefix from `$id` and `$ref` string values,
/// - drops combinator branches whose original form was exactly
///   `{"x-gts-ref": …}` (intentionally empty `{}` branches survive),
///   dropping the combinator itself if its array empties.
///
/// Idempotent: normalizing a normalized schema is a no-op.
pub fn normalize(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(normalize_object(map)),
        Value::Array(arr) => Value::Array(arr.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

fn normalize_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        if key == X_GTS_REF {
            continue;
        }
        let key = canonical_key(key);
        let value = match key {
            "$id" | "$ref" => strip_uri(value),
            _ if COMBINATORS.contains(&key) => {
                match normalize_combinator(value) {
                    Some(v) => v,
                    None => continue,
                }
            }
            _ => normalize(value),
        };
        out.insert(key.to_owned(), value);
    }
    out
}

fn canonical_key(key: &str) -> &str {
    match key {
        "$$id" => "$id",
        "$$schema" => "$schema",
        "$$ref" => "$ref",
        "$$defs" => "$defs",
        other => other,
    }
}

fn strip_uri(value: &Value) -> Value {
    match value.as_str() {
        Some(s) => Value::String(crate::id::strip_uri_prefix(s).to_owned()),
        None => normalize(value),
    }
}

/// Prunes ref-only branches from a combinator array; `None` drops the
/// combinator entirely.
fn normalize_combinator(value: &Value) -> Option<Value> {
    let Value::Array(branches) = value else {
        return Some(normalize(value));
    };
    let kept: Vec<Value> = branches
        .iter()
        .filter(|branch| !is_ref_only(branch))
        .map(normalize)
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(Value::Array(kept))
    }
}

/// A single-keyword `{"x-gts-ref": …}` subschema; normalization would
/// leave it as `{}`, accepting anything, so the branch is dropped instead.
fn is_ref_only(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.contains_key(X_GTS_REF))
}
