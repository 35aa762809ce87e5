//! Structural schema compatibility analysis across minor versions.
//!
//! Two schemas are compared on their flattened form: `properties` and
//! `required` unioned across the schema's own fields and its `allOf`
//! members, with the top-level `additionalProperties` winning. The
//! backward diff asks whether the new schema still accepts old data;
//! the forward diff is the mirror.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RegistryError;
use crate::id::GtsId;
use crate::normalize::normalize;
use crate::registry::Registry;

/// Direction inferred from the final-segment minor versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionDirection {
    Up,
    Down,
    None,
    Unknown,
}

/// The result record of a compatibility check.
#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityReport {
    pub old_id: String,
    pub new_id: String,
    pub direction: VersionDirection,
    pub is_backward_compatible: bool,
    pub is_forward_compatible: bool,
    pub is_fully_compatible: bool,
    pub backward_errors: Vec<String>,
    pub forward_errors: Vec<String>,
}

/// A schema flattened to one property map, one required set, and the
/// winning `additionalProperties` value.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlatSchema {
    pub properties: Map<String, Value>,
    pub required: BTreeSet<String>,
    pub additional_properties: Option<Value>,
}

impl FlatSchema {
    pub(crate) fn closed(&self) -> bool {
        matches!(self.additional_properties, Some(Value::Bool(false)))
    }
}

/// Union `properties`/`required` across a schema's own fields and its
/// `allOf` members (recursively); the outermost `additionalProperties`
/// wins over any member's.
pub(crate) fn flatten(schema: &Value) -> FlatSchema {
    let mut flat = FlatSchema::default();
    merge_into(&mut flat, schema);
    flat
}

fn merge_into(flat: &mut FlatSchema, schema: &Value) {
    let Value::Object(obj) = schema else {
        return;
    };
    if flat.additional_properties.is_none() {
        if let Some(ap) = obj.get("additionalProperties") {
            flat.additional_properties = Some(ap.clone());
        }
    }
    if let Some(Value::Object(props)) = obj.get("properties") {
        for (name, prop) in props {
            flat.properties.entry(name.clone()).or_insert_with(|| prop.clone());
        }
    }
    if let Some(Value::Array(required)) = obj.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            flat.required.insert(name.to_owned());
        }
    }
    if let Some(Value::Array(members)) = obj.get("allOf") {
        for member in members {
            merge_into(flat, member);
        }
    }
}

/// Analyze two registered schemas.
///
/// # Errors
///
/// `SchemaNotFound` / `NotASchema` when either id does not resolve to a
/// registered schema.
pub fn check_compatibility(
    registry: &Registry,
    old_id: &str,
    new_id: &str,
) -> Result<CompatibilityReport, RegistryError> {
    let old = registry.get_schema(old_id)?;
    let new = registry.get_schema(new_id)?;

    let old_schema = registry
        .normalized_schema(old_id)
        .cloned()
        .unwrap_or_else(|| normalize(&old.content));
    let new_schema = registry
        .normalized_schema(new_id)
        .cloned()
        .unwrap_or_else(|| normalize(&new.content));

    let mut backward_errors = Vec::new();
    let mut forward_errors = Vec::new();
    diff_schemas(&old_schema, &new_schema, "", Direction::Backward, &mut backward_errors);
    diff_schemas(&old_schema, &new_schema, "", Direction::Forward, &mut forward_errors);

    let is_backward = backward_errors.is_empty();
    let is_forward = forward_errors.is_empty();
    Ok(CompatibilityReport {
        old_id: old.id.clone(),
        new_id: new.id.clone(),
        direction: infer_direction(old_id, new_id),
        is_backward_compatible: is_backward,
        is_forward_compatible: is_forward,
        is_fully_compatible: is_backward && is_forward,
        backward_errors,
        forward_errors,
    })
}

/// Compares the final-segment minor versions of the two identifiers.
pub fn infer_direction(old_id: &str, new_id: &str) -> VersionDirection {
    let minor = |id: &str| {
        GtsId::parse(id)
            .ok()
            .and_then(|g| g.segments().last().and_then(|s| s.ver_minor))
    };
    match (minor(old_id), minor(new_id)) {
        (Some(old), Some(new)) if new > old => VersionDirection::Up,
        (Some(old), Some(new)) if new < old => VersionDirection::Down,
        (Some(_), Some(_)) => VersionDirection::None,
        _ => VersionDirection::Unknown,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Backward,
    Forward,
}

/// Numeric/string/array bound keywords; the flag marks lower bounds.
const BOUNDS: &[(&str, bool)] = &[
    ("minimum", true),
    ("maximum", false),
    ("minLength", true),
    ("maxLength", false),
    ("minItems", true),
    ("maxItems", false),
];

fn diff_schemas(
    old: &Value,
    new: &Value,
    prefix: &str,
    dir: Direction,
    errors: &mut Vec<String>,
) {
    let old_flat = flatten(old);
    let new_flat = flatten(new);

    match dir {
        Direction::Backward => {
            for name in new_flat.required.difference(&old_flat.required) {
                errors.push(format!(
                    "property '{}' is newly required",
                    join_path(prefix, name)
                ));
            }
        }
        Direction::Forward => {
            for name in old_flat.required.difference(&new_flat.required) {
                errors.push(format!(
                    "required property '{}' was removed",
                    join_path(prefix, name)
                ));
            }
        }
    }

    for (name, old_prop) in &old_flat.properties {
        if let Some(new_prop) = new_flat.properties.get(name) {
            diff_property(old_prop, new_prop, &join_path(prefix, name), dir, errors);
        }
    }
}

fn diff_property(
    old_prop: &Value,
    new_prop: &Value,
    path: &str,
    dir: Direction,
    errors: &mut Vec<String>,
) {
    let old_type = old_prop.get("type").and_then(Value::as_str);
    let new_type = new_prop.get("type").and_then(Value::as_str);

    if let (Some(ot), Some(nt)) = (old_type, new_type) {
        if ot != nt && !type_widened(ot, nt, dir) {
            errors.push(format!("property '{path}' type changed from {ot} to {nt}"));
        }
    }

    diff_enum(old_prop, new_prop, path, dir, errors);
    diff_bounds(old_prop, new_prop, path, dir, errors);

    if old_type == Some("object") && new_type == Some("object") {
        diff_schemas(old_prop, new_prop, path, dir, errors);
    }
    if old_type == Some("array") && new_type == Some("array") {
        if let (Some(old_items), Some(new_items)) = (old_prop.get("items"), new_prop.get("items"))
        {
            diff_property(old_items, new_items, path, dir, errors);
        }
    }
}

/// `number` ⊇ `integer`: widening is invisible to the reader in each
/// direction's own terms.
fn type_widened(old: &str, new: &str, dir: Direction) -> bool {
    match dir {
        Direction::Backward => old == "integer" && new == "number",
        Direction::Forward => old == "number" && new == "integer",
    }
}

fn diff_enum(
    old_prop: &Value,
    new_prop: &Value,
    path: &str,
    dir: Direction,
    errors: &mut Vec<String>,
) {
    let (Some(old_enum), Some(new_enum)) = (
        old_prop.get("enum").and_then(Value::as_array),
        new_prop.get("enum").and_then(Value::as_array),
    ) else {
        return;
    };
    match dir {
        Direction::Backward => {
            let added: Vec<String> = new_enum
                .iter()
                .filter(|v| !old_enum.contains(*v))
                .map(|v| v.to_string())
                .collect();
            if !added.is_empty() {
                errors.push(format!(
                    "property '{path}' enum gained values: {}",
                    added.join(", ")
                ));
            }
        }
        Direction::Forward => {
            let removed: Vec<String> = old_enum
                .iter()
                .filter(|v| !new_enum.contains(*v))
                .map(|v| v.to_string())
                .collect();
            if !removed.is_empty() {
                errors.push(format!(
                    "property '{path}' enum lost values: {}",
                    removed.join(", ")
                ));
            }
        }
    }
}

fn diff_bounds(
    old_prop: &Value,
    new_prop: &Value,
    path: &str,
    dir: Direction,
    errors: &mut Vec<String>,
) {
    for &(key, is_lower) in BOUNDS {
        let old_bound = old_prop.get(key).and_then(Value::as_f64);
        let new_bound = new_prop.get(key).and_then(Value::as_f64);
        match dir {
            Direction::Backward => match (old_bound, new_bound) {
                (None, Some(_)) => {
                    errors.push(format!("property '{path}' introduced {key}"));
                }
                (Some(o), Some(n)) if tightened(o, n, is_lower) => {
                    errors.push(format!("property '{path}' tightened {key} from {o} to {n}"));
                }
                _ => {}
            },
            Direction::Forward => match (old_bound, new_bound) {
                (Some(_), None) => {
                    errors.push(format!("property '{path}' removed {key}"));
                }
                (Some(o), Some(n)) if tightened(n, o, is_lower) => {
                    errors.push(format!("property '{path}' relaxed {key} from {o} to {n}"));
                }
                _ => {}
            },
        }
    }
}

fn tightened(old: f64, new: f64, is_lower: bool) -> bool {
    if is_lower {
        new > old
    } else {
        new < old
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}
