//! Entity extraction: identifier discovery and schema classification.
//!
//! A raw JSON document carries its GTS identifier in one of several
//! candidate fields, checked in priority order. Classification as schema
//! or instance hinges on the `$schema`/`$$schema` meta-field alone.

use serde_json::Value;

use crate::error::ExtractError;
use crate::id::{strip_uri_prefix, GtsId};

/// Candidate fields for the entity identifier, in priority order.
pub const ENTITY_ID_FIELDS: &[&str] = &[
    "$id", "$$id", "gtsId", "gtsIid", "gtsOid", "gtsI", "gts_id", "gts_oid", "gts_iid", "id",
];

/// Candidate fields for the schema identifier, in priority order.
pub const SCHEMA_ID_FIELDS: &[&str] = &[
    "$schema", "$$schema", "gtsTid", "gtsType", "gtsT", "gts_t", "gts_tid", "gts_type", "type",
    "schema",
];

/// Configurable candidate-field lists for extraction.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub entity_id_fields: Vec<String>,
    pub schema_id_fields: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            entity_id_fields: ENTITY_ID_FIELDS.iter().map(|s| (*s).to_owned()).collect(),
            schema_id_fields: SCHEMA_ID_FIELDS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Outcome of extraction: the chosen identifiers and their source fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Canonical entity identifier.
    pub id: String,
    /// Schema identifier, when one could be determined.
    pub schema_id: Option<String>,
    /// Whether the document is a schema (see [`is_schema_document`]).
    pub is_schema: bool,
    /// The field that supplied the entity id.
    pub selected_id_field: String,
    /// The field that supplied the schema id; `None` when the schema id
    /// was derived from the identifier chain.
    pub selected_schema_field: Option<String>,
}

/// A document is a schema iff its `$schema`/`$$schema` value is a
/// JSON-Schema meta-schema URL or a GTS identifier (either form).
///
/// Absence of the meta-field makes the document an instance even when
/// its id ends with `~`; no other hint is consulted.
pub fn is_schema_document(value: &Value) -> bool {
    meta_schema_field(value)
        .map(|(_, v)| v.contains("json-schema.org") || v.starts_with("gts://") || v.starts_with("gts."))
        .unwrap_or(false)
}

fn meta_schema_field(value: &Value) -> Option<(&'static str, &str)> {
    for field in ["$schema", "$$schema"] {
        if let Some(v) = value.get(field).and_then(Value::as_str) {
            if !v.is_empty() {
                return Some((field, v));
            }
        }
    }
    None
}

/// Discover the entity id and schema id of a raw JSON document.
///
/// # Errors
///
/// Returns `ExtractError::NoIdField` when none of the candidate fields
/// holds a string, or `ExtractError::InvalidId` when the chosen value
/// does not parse as a GTS identifier.
pub fn extract(value: &Value, config: &ExtractConfig) -> Result<Extracted, ExtractError> {
    let (selected_id_field, raw_id) = select_entity_id(value, config)?;
    let id_text = if selected_id_field == "$id" || selected_id_field == "$$id" {
        strip_uri_prefix(&raw_id).to_owned()
    } else {
        raw_id
    };
    let id = GtsId::parse(&id_text)?;

    let is_schema = is_schema_document(value);
    let (schema_id, selected_schema_field) = if is_schema {
        schema_id_of_schema(&id, value)
    } else {
        schema_id_of_instance(&id, &selected_id_field, value, config)
    };

    Ok(Extracted {
        id: id.as_str().to_owned(),
        schema_id,
        is_schema,
        selected_id_field,
        selected_schema_field,
    })
}

fn select_entity_id(
    value: &Value,
    config: &ExtractConfig,
) -> Result<(String, String), ExtractError> {
    for field in &config.entity_id_fields {
        if let Some(v) = value.get(field).and_then(Value::as_str) {
            if !v.is_empty() {
                return Ok((field.clone(), v.to_owned()));
            }
        }
    }
    Err(ExtractError::NoIdField {
        checked: config.entity_id_fields.clone(),
    })
}

/// Schema id of a schema document: the parent type for derived schemas
/// (chains with more than one `~` segment), else the meta-schema value.
fn schema_id_of_schema(id: &GtsId, value: &Value) -> (Option<String>, Option<String>) {
    if let Some(parent) = id.parent_id() {
        return (Some(parent), None);
    }
    match meta_schema_field(value) {
        Some((field, v)) => (Some(v.to_owned()), Some(field.to_owned())),
        None => (None, None),
    }
}

fn schema_id_of_instance(
    id: &GtsId,
    selected_id_field: &str,
    value: &Value,
    config: &ExtractConfig,
) -> (Option<String>, Option<String>) {
    let from_dollar_id = selected_id_field == "$id" || selected_id_field == "$$id";

    // A chained id carried by a non-$id field already names its schema.
    if !from_dollar_id {
        if let Some(schema_id) = id.schema_id() {
            return (Some(schema_id), None);
        }
    }

    for field in &config.schema_id_fields {
        if field == "$id" || field == "$$id" {
            continue;
        }
        if let Some(v) = value.get(field).and_then(Value::as_str) {
            let candidate = strip_uri_prefix(v);
            if GtsId::is_valid(candidate) {
                return (Some(candidate.to_owned()), Some(field.clone()));
            }
        }
    }

    (id.schema_id(), None)
}
