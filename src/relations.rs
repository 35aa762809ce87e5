//! Relationship resolution: embedded GTS references and schema graphs.
//!
//! References are recognized at three places while walking a document:
//! any string value that parses as a GTS identifier, any `$ref` value
//! (after `gts://` stripping), and any `x-gts-ref` string value.
//! JSON-Schema meta-schema URLs are excluded.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::RegistryError;
use crate::id::{strip_uri_prefix, GtsId};
use crate::normalize::X_GTS_REF;
use crate::registry::Registry;

/// One discovered reference: the target id and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Canonical target identifier (possibly a wildcard pattern).
    pub id: String,
    /// Dotted + bracketed location, e.g. `a.b[0].c`.
    pub path: String,
}

/// Flat view: every reference of one entity, with the broken subset.
#[derive(Debug, Clone, Serialize)]
pub struct Relationships {
    pub id: String,
    pub relationships: Vec<Reference>,
    /// Referenced ids with no registered target (wildcards count as
    /// broken only when no registered id matches them).
    pub broken: Vec<String>,
}

/// Graph view: a node per entity, descending through reference targets.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipNode {
    pub id: String,
    pub exists: bool,
    pub references: Vec<Reference>,
    pub children: Vec<RelationshipNode>,
    /// Set when this id was already visited higher up; children are not
    /// expanded again.
    pub cycle: bool,
}

/// Collect every GTS reference inside a JSON value, deduplicated by
/// (id, path).
pub fn collect_references(value: &Value) -> Vec<Reference> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    walk(value, String::new(), &mut out, &mut seen);
    out
}

fn walk(value: &Value, path: String, out: &mut Vec<Reference>, seen: &mut HashSet<(String, String)>) {
    match value {
        Value::String(s) => push_if_reference(s, &path, out, seen),
        Value::Object(obj) => {
            for (key, child) in obj {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match (key.as_str(), child.as_str()) {
                    ("$ref" | "$$ref", Some(s)) | (X_GTS_REF, Some(s)) => {
                        push_if_reference(s, &child_path, out, seen);
                    }
                    _ => walk(child, child_path, out, seen),
                }
            }
        }
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                walk(child, format!("{path}[{i}]"), out, seen);
            }
        }
        _ => {}
    }
}

fn push_if_reference(
    raw: &str,
    path: &str,
    out: &mut Vec<Reference>,
    seen: &mut HashSet<(String, String)>,
) {
    if raw.contains("json-schema.org") {
        return;
    }
    let canonical = strip_uri_prefix(raw);
    if !GtsId::is_valid(canonical) {
        return;
    }
    if seen.insert((canonical.to_owned(), path.to_owned())) {
        out.push(Reference {
            id: canonical.to_owned(),
            path: path.to_owned(),
        });
    }
}

/// The flat relationship view for a registered entity.
pub fn resolve_relationships(
    registry: &Registry,
    id: &str,
) -> Result<Relationships, RegistryError> {
    let entity = registry.get_required(id)?;
    let relationships: Vec<Reference> = collect_references(&entity.content)
        .into_iter()
        .filter(|r| r.id != entity.id)
        .collect();

    let mut broken: Vec<String> = relationships
        .iter()
        .filter(|r| !registry.reference_resolved(&r.id))
        .map(|r| r.id.clone())
        .collect();
    broken.sort();
    broken.dedup();

    Ok(Relationships {
        id: entity.id.clone(),
        relationships,
        broken,
    })
}

/// The recursive graph view rooted at `id`.
pub fn resolve_graph(registry: &Registry, id: &str) -> Result<RelationshipNode, RegistryError> {
    registry.get_required(id)?;
    let mut visited = HashSet::new();
    Ok(build_node(registry, id, &mut visited))
}

fn build_node(registry: &Registry, id: &str, visited: &mut HashSet<String>) -> RelationshipNode {
    let exists = registry.contains(id);
    if !visited.insert(id.to_owned()) {
        return RelationshipNode {
            id: id.to_owned(),
            exists,
            references: Vec::new(),
            children: Vec::new(),
            cycle: true,
        };
    }

    let references: Vec<Reference> = match registry.get(id) {
        Some(entity) => collect_references(&entity.content)
            .into_iter()
            .filter(|r| r.id != entity.id)
            .collect(),
        None => Vec::new(),
    };

    // One child per distinct concrete target, in order of appearance;
    // wildcard patterns have no single target to descend into.
    let mut targets = Vec::new();
    for reference in &references {
        if GtsId::parse(&reference.id).map(|g| g.is_wildcard()).unwrap_or(true) {
            continue;
        }
        if !targets.contains(&reference.id) {
            targets.push(reference.id.clone());
        }
    }

    let children = targets
        .iter()
        .map(|target| build_node(registry, target, visited))
        .collect();

    RelationshipNode {
        id: id.to_owned(),
        exists,
        references,
        children,
        cycle: false,
    }
}
