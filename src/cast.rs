//! Instance casting: projecting an instance onto a target schema.
//!
//! A cast fills declared defaults, rewrites GTS-id `const` discriminator
//! fields, prunes properties a closed target does not declare, and
//! validates the outcome against the target with those discriminator
//! consts weakened to plain strings (their literal values legitimately
//! differ across minor versions).

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::compat::{check_compatibility, flatten, VersionDirection};
use crate::error::{CastError, RegistryError};
use crate::id::{strip_uri_prefix, GtsId};
use crate::normalize::normalize;
use crate::registry::Registry;
use crate::validate::{prepare_for_engine, run_engine};

/// The result record of a cast.
#[derive(Debug, Clone, Serialize)]
pub struct CastOutcome {
    pub source_id: String,
    pub source_schema_id: String,
    pub target_schema_id: String,
    pub direction: VersionDirection,
    pub is_backward_compatible: bool,
    pub is_forward_compatible: bool,
    /// Property paths inserted from defaults, sorted and de-duplicated.
    pub added: Vec<String>,
    /// Property paths deleted by `additionalProperties: false` pruning.
    pub removed: Vec<String>,
    /// Why the cast is not fully compatible; empty when `ok`.
    pub incompatibilities: Vec<String>,
    pub ok: bool,
    /// The cast instance, present when fully compatible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Cast a registered instance toward a registered target schema.
///
/// # Errors
///
/// `SourceNotInstance` when the source is a schema,
/// `SchemaOutsideRegistry` when the source's schema id has no registry
/// entry, plus the usual lookup failures. Structural incompatibilities
/// are not errors; they land on the outcome record.
pub fn cast_instance(
    registry: &Registry,
    source_id: &str,
    target_schema_id: &str,
) -> Result<CastOutcome, CastError> {
    let source = registry.get_required(source_id)?;
    if source.is_schema {
        return Err(CastError::SourceNotInstance(source_id.to_owned()));
    }
    let source_schema_id = source
        .schema_id
        .clone()
        .ok_or_else(|| CastError::Registry(RegistryError::NoSchemaId(source_id.to_owned())))?;
    if !registry.contains(&source_schema_id) {
        return Err(CastError::SchemaOutsideRegistry(source_schema_id));
    }
    registry.get_schema(&source_schema_id)?;
    let target = registry.get_schema(target_schema_id)?;

    let report = check_compatibility(registry, &source_schema_id, target_schema_id)?;
    let normalized_target = registry
        .normalized_schema(target_schema_id)
        .cloned()
        .unwrap_or_else(|| normalize(&target.content));

    let mut result = source.content.clone();
    let mut added = BTreeSet::new();
    let mut removed = BTreeSet::new();
    let mut incompatibilities = Vec::new();
    cast_object(
        &mut result,
        &normalized_target,
        "",
        &mut added,
        &mut removed,
        &mut incompatibilities,
    );

    let mut weakened = prepare_for_engine(registry, &normalized_target);
    weaken_gts_consts(&mut weakened);
    match run_engine(&weakened, &result) {
        Ok(messages) => incompatibilities.extend(messages),
        Err(compile) => incompatibilities.push(compile),
    }

    let ok = incompatibilities.is_empty();
    debug!(
        source = %source_id,
        target = %target_schema_id,
        ok,
        added = added.len(),
        removed = removed.len(),
        "cast finished"
    );
    Ok(CastOutcome {
        source_id: source_id.to_owned(),
        source_schema_id,
        target_schema_id: target_schema_id.to_owned(),
        direction: report.direction,
        is_backward_compatible: report.is_backward_compatible,
        is_forward_compatible: report.is_forward_compatible,
        added: added.into_iter().collect(),
        removed: removed.into_iter().collect(),
        incompatibilities,
        ok,
        result: ok.then_some(result),
    })
}

fn cast_object(
    value: &mut Value,
    schema: &Value,
    prefix: &str,
    added: &mut BTreeSet<String>,
    removed: &mut BTreeSet<String>,
    incompatibilities: &mut Vec<String>,
) {
    let flat = flatten(schema);
    let Some(obj) = value.as_object_mut() else {
        return;
    };

    for name in &flat.required {
        if obj.contains_key(name) {
            continue;
        }
        match flat.properties.get(name).and_then(|p| p.get("default")) {
            Some(default) => {
                obj.insert(name.clone(), default.clone());
                added.insert(join_path(prefix, name));
            }
            None => incompatibilities.push(format!(
                "missing required property '{}' with no default",
                join_path(prefix, name)
            )),
        }
    }

    for (name, prop) in &flat.properties {
        if flat.required.contains(name) || obj.contains_key(name) {
            continue;
        }
        if let Some(default) = prop.get("default") {
            obj.insert(name.clone(), default.clone());
            added.insert(join_path(prefix, name));
        }
    }

    // Version-bearing discriminators: a GTS-id const overwrites a
    // differing GTS-id value.
    for (name, prop) in &flat.properties {
        let Some(target_const) = prop.get("const").and_then(Value::as_str) else {
            continue;
        };
        if !GtsId::is_valid(strip_uri_prefix(target_const)) {
            continue;
        }
        let Some(current) = obj.get(name).and_then(Value::as_str) else {
            continue;
        };
        if current != target_const && GtsId::is_valid(strip_uri_prefix(current)) {
            obj.insert(name.clone(), Value::String(target_const.to_owned()));
        }
    }

    if flat.closed() {
        let unknown: Vec<String> = obj
            .keys()
            .filter(|k| !flat.properties.contains_key(*k))
            .cloned()
            .collect();
        for key in unknown {
            obj.remove(&key);
            removed.insert(join_path(prefix, &key));
        }
    }

    for (name, prop) in &flat.properties {
        let Some(child) = obj.get_mut(name) else {
            continue;
        };
        match prop.get("type").and_then(Value::as_str) {
            Some("object") => {
                cast_object(
                    child,
                    prop,
                    &join_path(prefix, name),
                    added,
                    removed,
                    incompatibilities,
                );
            }
            Some("array") => {
                let Some(items) = prop.get("items") else {
                    continue;
                };
                if items.get("type").and_then(Value::as_str) != Some("object") {
                    continue;
                }
                if let Some(elements) = child.as_array_mut() {
                    let base = join_path(prefix, name);
                    for (i, element) in elements.iter_mut().enumerate() {
                        cast_object(
                            element,
                            items,
                            &format!("{base}[{i}]"),
                            added,
                            removed,
                            incompatibilities,
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

/// Replace every `const` whose value is a GTS identifier with a plain
/// string constraint.
fn weaken_gts_consts(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            let weaken = obj
                .get("const")
                .and_then(Value::as_str)
                .is_some_and(|c| GtsId::is_valid(strip_uri_prefix(c)));
            if weaken {
                obj.remove("const");
                obj.entry("type")
                    .or_insert_with(|| Value::String("string".to_owned()));
            }
            for child in obj.values_mut() {
                weaken_gts_consts(child);
            }
        }
        Value::Array(arr) => {
            for child in arr {
                weaken_gts_consts(child);
            }
        }
        _ => {}
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}
