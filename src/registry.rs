//! In-memory entity registry keyed by GTS identifier.
//!
//! The registry is a plain owned value: mutation takes `&mut self` and
//! reads take `&self`, per the single-writer in-process model. Hosts
//! that share one registry across threads wrap it in a mutex.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RegistryError;
use crate::extract::{extract, ExtractConfig};
use crate::id::GtsId;
use crate::normalize::normalize;
use crate::relations::collect_references;
use crate::xref::RefLookup;

/// A registered entity: a schema or an instance, keyed by its id.
///
/// Entities are constructed from raw JSON, inserted once, and never
/// mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    /// Canonical GTS identifier.
    pub id: String,
    /// Schema identifier, when one could be determined.
    pub schema_id: Option<String>,
    /// The raw JSON document.
    pub content: Value,
    /// Whether the document is a schema.
    pub is_schema: bool,
    /// GTS identifiers discovered inside `content`, minus the entity's own.
    pub references: BTreeSet<String>,
}

impl Entity {
    /// Build an entity from a raw JSON document.
    ///
    /// # Errors
    ///
    /// Fails when no identifier field is found, the identifier does not
    /// parse, or it is a wildcard (patterns cannot name entities).
    pub fn from_value(value: &Value, config: &ExtractConfig) -> Result<Self, RegistryError> {
        let extracted = extract(value, config)?;
        let id = GtsId::parse(&extracted.id).map_err(RegistryError::InvalidId)?;
        if id.is_wildcard() {
            return Err(RegistryError::InvalidId(crate::error::IdError::invalid(
                "a wildcard pattern cannot identify an entity",
            )));
        }
        let references = collect_references(value)
            .into_iter()
            .map(|r| r.id)
            .filter(|r| r != &extracted.id)
            .collect();
        Ok(Entity {
            id: extracted.id,
            schema_id: extracted.schema_id,
            content: value.clone(),
            is_schema: extracted.is_schema,
            references,
        })
    }

    /// The deterministic UUID of this entity's identifier.
    pub fn uuid(&self) -> Option<Uuid> {
        GtsId::parse(&self.id).ok().map(|id| id.to_uuid())
    }

    fn primary_segment(&self) -> Option<crate::id::IdSegment> {
        GtsId::parse(&self.id)
            .ok()
            .and_then(|id| id.segments().first().cloned())
    }

    /// Vendor token of the primary segment.
    pub fn vendor(&self) -> Option<String> {
        self.primary_segment().map(|s| s.vendor)
    }

    /// Package token of the primary segment.
    pub fn package(&self) -> Option<String> {
        self.primary_segment().map(|s| s.package)
    }

    /// Namespace token of the primary segment.
    pub fn namespace(&self) -> Option<String> {
        self.primary_segment().map(|s| s.namespace)
    }
}

/// Which segments a [`ListQuery`] token filter inspects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentScope {
    /// Only the first chain segment.
    #[default]
    Primary,
    /// Any chain segment.
    Any,
}

/// Filters for enumerating entities. Every field is optional; `None`
/// applies no filtering for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Wildcard identifier pattern.
    pub pattern: Option<String>,
    /// `true` keeps schemas, `false` keeps instances.
    pub is_schema: Option<bool>,
    pub vendor: Option<String>,
    pub package: Option<String>,
    pub namespace: Option<String>,
    /// Which segments the vendor/package/namespace filters inspect.
    #[serde(default)]
    pub segment_scope: SegmentScope,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_is_schema(mut self, is_schema: bool) -> Self {
        self.is_schema = Some(is_schema);
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_segment_scope(mut self, scope: SegmentScope) -> Self {
        self.segment_scope = scope;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
            && self.is_schema.is_none()
            && self.vendor.is_none()
            && self.package.is_none()
            && self.namespace.is_none()
    }
}

/// Registry behavior flags.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Reject registration whose references are not already registered.
    pub validate_refs: bool,
    /// Reserved; no observable behavior beyond `validate_refs`.
    pub strict_mode: bool,
    /// Candidate-field lists used when registering raw JSON.
    pub extract: ExtractConfig,
}

/// Mapping from identifier to entity, insertion-ordered for enumeration.
#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<String, Entity>,
    order: Vec<String>,
    schemas: HashMap<String, Value>,
    config: RegistryConfig,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Registry {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Extract an entity from raw JSON and register it.
    pub fn register_value(&mut self, value: &Value) -> Result<&Entity, RegistryError> {
        let entity = Entity::from_value(value, &self.config.extract)?;
        self.register(entity)
    }

    /// Register a constructed entity.
    ///
    /// With `validate_refs` set, every reference must already be
    /// registered (wildcard references must match at least one id).
    /// Re-registering an id overwrites the entity; the position from the
    /// first insertion governs enumeration order.
    pub fn register(&mut self, entity: Entity) -> Result<&Entity, RegistryError> {
        if self.config.validate_refs {
            let missing: Vec<String> = entity
                .references
                .iter()
                .filter(|r| !self.reference_resolved(r))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(RegistryError::UnresolvedReference {
                    id: entity.id.clone(),
                    references: missing,
                });
            }
        }

        if entity.is_schema {
            self.schemas
                .insert(entity.id.clone(), normalize(&entity.content));
        }

        let id = entity.id.clone();
        if self.entities.insert(id.clone(), entity).is_some() {
            warn!(id = %id, "overwriting registered entity");
        } else {
            self.order.push(id.clone());
            debug!(id = %id, "registered entity");
        }
        Ok(&self.entities[&id])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Lookup that fails with `EntityNotFound`.
    pub fn get_required(&self, id: &str) -> Result<&Entity, RegistryError> {
        self.get(id)
            .ok_or_else(|| RegistryError::EntityNotFound(id.to_owned()))
    }

    /// Lookup a schema entity, failing when absent or not a schema.
    pub fn get_schema(&self, id: &str) -> Result<&Entity, RegistryError> {
        let entity = self
            .get(id)
            .ok_or_else(|| RegistryError::SchemaNotFound(id.to_owned()))?;
        if !entity.is_schema {
            return Err(RegistryError::NotASchema(id.to_owned()));
        }
        Ok(entity)
    }

    /// The normalized form of a registered schema.
    pub fn normalized_schema(&self, id: &str) -> Option<&Value> {
        self.schemas.get(id)
    }

    /// Insertion-ordered snapshot of all entities.
    pub fn get_all(&self) -> Vec<&Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Enumerate ids matching `pattern` in insertion order, stopping at
    /// `limit` when given.
    pub fn query(&self, pattern: &str, limit: Option<usize>) -> Result<Vec<String>, RegistryError> {
        let pattern = GtsId::parse(pattern).map_err(RegistryError::InvalidId)?;
        let cap = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for id in &self.order {
            if out.len() >= cap {
                break;
            }
            let candidate = GtsId::parse(id).map_err(RegistryError::InvalidId)?;
            if candidate.matches(&pattern).map_err(RegistryError::InvalidId)? {
                out.push(id.clone());
            }
        }
        Ok(out)
    }

    /// Enumerate entities matching a [`ListQuery`], in insertion order.
    ///
    /// # Errors
    ///
    /// Fails only when the query carries an invalid pattern.
    pub fn list(&self, query: &ListQuery) -> Result<Vec<&Entity>, RegistryError> {
        let pattern = query
            .pattern
            .as_deref()
            .map(GtsId::parse)
            .transpose()
            .map_err(RegistryError::InvalidId)?;

        let mut out = Vec::new();
        for id in &self.order {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let Ok(parsed) = GtsId::parse(id) else {
                continue;
            };
            if let Some(pattern) = &pattern {
                if !parsed.matches(pattern).unwrap_or(false) {
                    continue;
                }
            }
            if let Some(want_schema) = query.is_schema {
                if entity.is_schema != want_schema {
                    continue;
                }
            }
            let segments: &[crate::id::IdSegment] = match query.segment_scope {
                SegmentScope::Primary => &parsed.segments()[..1.min(parsed.segments().len())],
                SegmentScope::Any => parsed.segments(),
            };
            if let Some(vendor) = query.vendor.as_deref() {
                if !segments.iter().any(|s| s.vendor == vendor) {
                    continue;
                }
            }
            if let Some(package) = query.package.as_deref() {
                if !segments.iter().any(|s| s.package == package) {
                    continue;
                }
            }
            if let Some(namespace) = query.namespace.as_deref() {
                if !segments.iter().any(|s| s.namespace == namespace) {
                    continue;
                }
            }
            out.push(entity);
        }
        Ok(out)
    }

    /// Whether a reference target exists: exact presence, or for wildcard
    /// patterns, at least one registered id matching.
    pub fn reference_resolved(&self, reference: &str) -> bool {
        if self.entities.contains_key(reference) {
            return true;
        }
        let Ok(pattern) = GtsId::parse(reference) else {
            return false;
        };
        if !pattern.is_wildcard() {
            return false;
        }
        self.order.iter().any(|id| {
            GtsId::parse(id)
                .ok()
                .and_then(|c| c.matches(&pattern).ok())
                .unwrap_or(false)
        })
    }
}

impl RefLookup for Registry {
    fn contains_id(&self, id: &str) -> bool {
        self.contains(id)
    }
}
