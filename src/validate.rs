//! Instance validation: normalized schema + JSON-Schema engine + x-gts-ref.
//!
//! Registry-internal `$ref` targets are bundled into `$defs` before
//! compilation (with the `$ref` rewritten to a local pointer), so the
//! engine never resolves anything outside the process.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RegistryError, XrefError};
use crate::id::{strip_uri_prefix, GtsId};
use crate::normalize::normalize;
use crate::registry::Registry;
use crate::xref::{RefLookup, XrefValidator};

/// Validate a registered instance against its registered schema.
///
/// # Errors
///
/// `EntityNotFound` / `NoSchemaId` / `SchemaNotFound` / `NotASchema`
/// for resolution failures; `ValidationFailed` carrying the "; "-joined
/// per-path reasons for engine or `x-gts-ref` violations. Engine
/// compile failures surface as `ValidationFailed` too.
pub fn validate_instance(registry: &Registry, id: &str) -> Result<(), RegistryError> {
    let entity = registry.get_required(id)?;
    let schema_id = entity
        .schema_id
        .as_deref()
        .ok_or_else(|| RegistryError::NoSchemaId(id.to_owned()))?;
    let schema_entity = registry
        .get(schema_id)
        .ok_or_else(|| RegistryError::SchemaNotFound(schema_id.to_owned()))?;
    if !schema_entity.is_schema {
        return Err(RegistryError::NotASchema(schema_id.to_owned()));
    }

    let normalized = registry
        .normalized_schema(schema_id)
        .cloned()
        .unwrap_or_else(|| normalize(&schema_entity.content));
    let prepared = prepare_for_engine(registry, &normalized);

    let messages =
        run_engine(&prepared, &entity.content).map_err(RegistryError::ValidationFailed)?;
    if !messages.is_empty() {
        return Err(RegistryError::ValidationFailed(messages.join("; ")));
    }

    let xref_errors = XrefValidator::new(&schema_entity.content, Some(registry as &dyn RefLookup))
        .validate_instance(&entity.content);
    if !xref_errors.is_empty() {
        return Err(RegistryError::ValidationFailed(XrefError::join(&xref_errors)));
    }

    debug!(id = %id, schema = %schema_id, "instance validated");
    Ok(())
}

/// Validate any registered entity.
///
/// Instances run the full pipeline. Schemas must compile under the
/// engine and carry only well-formed `x-gts-ref` patterns.
pub fn validate_entity(registry: &Registry, id: &str) -> Result<(), RegistryError> {
    let entity = registry.get_required(id)?;
    if !entity.is_schema {
        return validate_instance(registry, id);
    }

    let normalized = registry
        .normalized_schema(id)
        .cloned()
        .unwrap_or_else(|| normalize(&entity.content));
    let prepared = prepare_for_engine(registry, &normalized);
    jsonschema::validator_for(&prepared)
        .map_err(|e| RegistryError::ValidationFailed(e.to_string()))?;

    let errors = XrefValidator::new(&entity.content, None).validate_schema();
    if !errors.is_empty() {
        return Err(RegistryError::ValidationFailed(XrefError::join(&errors)));
    }
    debug!(id = %id, "schema validated");
    Ok(())
}

/// Compile `schema` and collect engine errors for `instance`, formatted
/// as "`instancePath message`". A compile failure is the `Err` string.
pub(crate) fn run_engine(schema: &Value, instance: &Value) -> Result<Vec<String>, String> {
    let validator = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
    Ok(validator.iter_errors(instance).map(format_engine_error).collect())
}

fn format_engine_error(err: jsonschema::ValidationError<'_>) -> String {
    let path = err.instance_path.to_string();
    if let jsonschema::error::ValidationErrorKind::Required { property } = &err.kind {
        let name = property
            .as_str()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| property.to_string());
        return format!("{path} must have required property '{name}'");
    }
    format!("{path} {err}")
}

/// Make a normalized schema compilable in isolation: drop the GTS `$id`
/// (a non-URI identifier) and any non-meta `$schema`, then bundle
/// registry-internal `$ref` targets into `$defs`.
pub(crate) fn prepare_for_engine(registry: &Registry, normalized: &Value) -> Value {
    let mut schema = normalized.clone();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$id");
        let keep_meta = obj
            .get("$schema")
            .and_then(Value::as_str)
            .is_some_and(|s| s.contains("json-schema.org"));
        if !keep_meta {
            obj.remove("$schema");
        }
    }
    bundle_registry_refs(registry, &mut schema);
    schema
}

fn bundle_registry_refs(registry: &Registry, root: &mut Value) {
    let mut pending = Vec::new();
    rewrite_refs(root, &mut pending);
    if pending.is_empty() {
        return;
    }

    let mut defs = Map::new();
    while let Some(id) = pending.pop() {
        let key = def_key(&id);
        if defs.contains_key(&key) {
            continue;
        }
        // A missing target leaves its rewritten pointer dangling; the
        // compile error then surfaces as a validation failure.
        let Some(target) = registry.normalized_schema(&id) else {
            continue;
        };
        let mut def = target.clone();
        if let Some(obj) = def.as_object_mut() {
            obj.remove("$id");
            obj.remove("$schema");
        }
        rewrite_refs(&mut def, &mut pending);
        defs.insert(key, def);
    }
    if defs.is_empty() {
        return;
    }

    if let Some(obj) = root.as_object_mut() {
        let entry = obj
            .entry("$defs")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(map) = entry.as_object_mut() {
            for (key, def) in defs {
                map.entry(key).or_insert(def);
            }
        }
    }
}

/// Rewrites GTS-id `$ref` values to local `#/$defs/…` pointers,
/// queueing the targets for bundling.
fn rewrite_refs(value: &mut Value, pending: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(r)) = obj.get("$ref") {
                let canonical = strip_uri_prefix(r).to_owned();
                if GtsId::is_valid(&canonical) {
                    obj.insert(
                        "$ref".to_owned(),
                        Value::String(format!("#/$defs/{}", def_key(&canonical))),
                    );
                    pending.push(canonical);
                }
            }
            for child in obj.values_mut() {
                rewrite_refs(child, pending);
            }
        }
        Value::Array(arr) => {
            for child in arr {
                rewrite_refs(child, pending);
            }
        }
        _ => {}
    }
}

/// Identifiers cannot contain `-`, so mapping `~` to `-` yields a
/// collision-free, pointer-safe `$defs` key.
fn def_key(id: &str) -> String {
    id.replace('~', "-")
}
