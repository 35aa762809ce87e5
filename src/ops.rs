//! Operation facade: serializable result records over the library API.
//!
//! Every operation returns a record with an `ok` boolean and an `error`
//! string (empty on success) instead of propagating errors across the
//! boundary. The out-of-scope HTTP and CLI layers wrap these records
//! without altering their semantics. Identifier fields are always
//! canonical (no `gts://`).

use serde::Serialize;
use serde_json::Value;

use crate::cast::{cast_instance, CastOutcome};
use crate::compat::{check_compatibility, CompatibilityReport};
use crate::extract::extract;
use crate::id::{GtsId, IdSegment};
use crate::path::{resolve_path, split_id_and_path};
use crate::registry::{Entity, ListQuery, Registry, RegistryConfig};
use crate::relations::{resolve_graph, resolve_relationships, Reference, RelationshipNode};
use crate::validate::{validate_entity, validate_instance};

/// Which compatibility direction decides the `ok` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatMode {
    Backward,
    Forward,
    Full,
}

impl CompatMode {
    /// Parse a mode string; unknown strings fall back to `Full`.
    pub fn parse(s: &str) -> CompatMode {
        match s {
            "backward" => CompatMode::Backward,
            "forward" => CompatMode::Forward,
            _ => CompatMode::Full,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateIdResult {
    pub id: String,
    pub ok: bool,
    pub valid: bool,
    pub error: String,
    pub is_wildcard: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseIdResult {
    pub id: String,
    pub ok: bool,
    pub error: String,
    pub segments: Vec<IdSegment>,
    pub is_schema: bool,
    pub is_wildcard: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchPatternResult {
    pub ok: bool,
    pub error: String,
    #[serde(rename = "match")]
    pub matched: bool,
    pub pattern: String,
    pub candidate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdToUuidResult {
    pub id: String,
    pub uuid: String,
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractIdResult {
    pub ok: bool,
    pub error: String,
    pub id: String,
    pub schema_id: String,
    pub is_schema: bool,
    pub selected_entity_field: String,
    pub selected_schema_id_field: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResult {
    pub ok: bool,
    pub error: String,
    pub id: String,
    pub is_schema: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityResult {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub ok: bool,
    pub error: String,
    pub pattern: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub ok: bool,
    pub error: String,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateAllResult {
    pub ok: bool,
    pub error: String,
    pub results: Vec<ValidateInstanceResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateInstanceResult {
    pub id: String,
    pub ok: bool,
    pub valid: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipsResult {
    pub id: String,
    pub ok: bool,
    pub error: String,
    pub relationships: Vec<Reference>,
    pub broken: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphResult {
    pub id: String,
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<RelationshipNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityResult {
    pub ok: bool,
    pub error: String,
    pub mode: CompatMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CompatibilityReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CastResult {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<CastOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeResult {
    pub gts_id: String,
    pub path: String,
    pub resolved: bool,
    pub value: Value,
    pub ok: bool,
    pub error: String,
}

/// The library facade: one method per operation, owning the registry.
#[derive(Debug, Default)]
pub struct GtsOps {
    registry: Registry,
}

impl GtsOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        GtsOps {
            registry: Registry::with_config(config),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn validate_id(&self, id: &str) -> ValidateIdResult {
        match GtsId::parse(id) {
            Ok(parsed) => ValidateIdResult {
                id: parsed.as_str().to_owned(),
                ok: true,
                valid: true,
                error: String::new(),
                is_wildcard: parsed.is_wildcard(),
            },
            Err(e) => ValidateIdResult {
                id: id.to_owned(),
                ok: false,
                valid: false,
                error: e.to_string(),
                is_wildcard: false,
            },
        }
    }

    pub fn parse_id(&self, id: &str) -> ParseIdResult {
        match GtsId::parse(id) {
            Ok(parsed) => ParseIdResult {
                id: parsed.as_str().to_owned(),
                ok: true,
                error: String::new(),
                is_schema: parsed.is_type_id(),
                is_wildcard: parsed.is_wildcard(),
                segments: parsed.segments().to_vec(),
            },
            Err(e) => ParseIdResult {
                id: id.to_owned(),
                ok: false,
                error: e.to_string(),
                segments: Vec::new(),
                is_schema: false,
                is_wildcard: false,
            },
        }
    }

    pub fn match_id_pattern(&self, candidate: &str, pattern: &str) -> MatchPatternResult {
        let outcome = GtsId::parse(candidate).and_then(|c| {
            let p = GtsId::parse(pattern)?;
            c.matches(&p)
        });
        match outcome {
            Ok(matched) => MatchPatternResult {
                ok: true,
                error: String::new(),
                matched,
                pattern: pattern.to_owned(),
                candidate: candidate.to_owned(),
            },
            Err(e) => MatchPatternResult {
                ok: false,
                error: e.to_string(),
                matched: false,
                pattern: pattern.to_owned(),
                candidate: candidate.to_owned(),
            },
        }
    }

    pub fn id_to_uuid(&self, id: &str) -> IdToUuidResult {
        match GtsId::parse(id) {
            Ok(parsed) => IdToUuidResult {
                id: parsed.as_str().to_owned(),
                uuid: parsed.to_uuid().to_string(),
                ok: true,
                error: String::new(),
            },
            Err(e) => IdToUuidResult {
                id: id.to_owned(),
                uuid: String::new(),
                ok: false,
                error: e.to_string(),
            },
        }
    }

    /// Extract the id and schema id of a raw document. When `schema` is
    /// given, its own id fills a schema id the document does not carry.
    pub fn extract_id(&self, value: &Value, schema: Option<&Value>) -> ExtractIdResult {
        let config = &self.registry.config().extract;
        let mut extracted = match extract(value, config) {
            Ok(e) => e,
            Err(e) => {
                return ExtractIdResult {
                    ok: false,
                    error: e.to_string(),
                    id: String::new(),
                    schema_id: String::new(),
                    is_schema: false,
                    selected_entity_field: String::new(),
                    selected_schema_id_field: String::new(),
                }
            }
        };
        if extracted.schema_id.is_none() {
            if let Some(schema_doc) = schema {
                if let Ok(schema_extracted) = extract(schema_doc, config) {
                    extracted.schema_id = Some(schema_extracted.id);
                }
            }
        }
        ExtractIdResult {
            ok: true,
            error: String::new(),
            id: extracted.id,
            schema_id: extracted.schema_id.unwrap_or_default(),
            is_schema: extracted.is_schema,
            selected_entity_field: extracted.selected_id_field,
            selected_schema_id_field: extracted.selected_schema_field.unwrap_or_default(),
        }
    }

    pub fn register(&mut self, value: &Value) -> RegisterResult {
        match self.registry.register_value(value) {
            Ok(entity) => RegisterResult {
                ok: true,
                error: String::new(),
                id: entity.id.clone(),
                is_schema: entity.is_schema,
            },
            Err(e) => RegisterResult {
                ok: false,
                error: e.to_string(),
                id: String::new(),
                is_schema: false,
            },
        }
    }

    pub fn get(&self, id: &str) -> EntityResult {
        match self.registry.get_required(id) {
            Ok(entity) => EntityResult {
                ok: true,
                error: String::new(),
                entity: Some(entity.clone()),
            },
            Err(e) => EntityResult {
                ok: false,
                error: e.to_string(),
                entity: None,
            },
        }
    }

    /// Insertion-ordered snapshot of every registered entity.
    pub fn get_all(&self) -> Vec<Entity> {
        self.registry.get_all().into_iter().cloned().collect()
    }

    pub fn query(&self, pattern: &str, limit: Option<usize>) -> QueryResult {
        match self.registry.query(pattern, limit) {
            Ok(ids) => QueryResult {
                ok: true,
                error: String::new(),
                pattern: pattern.to_owned(),
                ids,
            },
            Err(e) => QueryResult {
                ok: false,
                error: e.to_string(),
                pattern: pattern.to_owned(),
                ids: Vec::new(),
            },
        }
    }

    /// Enumerate entities matching the query filters, insertion-ordered.
    pub fn list(&self, query: &ListQuery) -> ListResult {
        match self.registry.list(query) {
            Ok(entities) => ListResult {
                ok: true,
                error: String::new(),
                entities: entities.into_iter().cloned().collect(),
            },
            Err(e) => ListResult {
                ok: false,
                error: e.to_string(),
                entities: Vec::new(),
            },
        }
    }

    /// Validate every registered entity, reporting a verdict per id.
    pub fn validate_all(&self) -> ValidateAllResult {
        let mut results = Vec::new();
        let mut failures = 0usize;
        for entity in self.registry.get_all() {
            let result = match validate_entity(&self.registry, &entity.id) {
                Ok(()) => ValidateInstanceResult {
                    id: entity.id.clone(),
                    ok: true,
                    valid: true,
                    error: String::new(),
                },
                Err(e) => {
                    failures += 1;
                    ValidateInstanceResult {
                        id: entity.id.clone(),
                        ok: false,
                        valid: false,
                        error: e.to_string(),
                    }
                }
            };
            results.push(result);
        }
        ValidateAllResult {
            ok: failures == 0,
            error: if failures == 0 {
                String::new()
            } else {
                format!("{failures} entities failed validation")
            },
            results,
        }
    }

    pub fn validate_instance(&self, id: &str) -> ValidateInstanceResult {
        match validate_instance(&self.registry, id) {
            Ok(()) => ValidateInstanceResult {
                id: id.to_owned(),
                ok: true,
                valid: true,
                error: String::new(),
            },
            Err(e) => ValidateInstanceResult {
                id: id.to_owned(),
                ok: false,
                valid: false,
                error: e.to_string(),
            },
        }
    }

    pub fn resolve_relationships(&self, id: &str) -> RelationshipsResult {
        match resolve_relationships(&self.registry, id) {
            Ok(view) => RelationshipsResult {
                id: view.id,
                ok: true,
                error: String::new(),
                relationships: view.relationships,
                broken: view.broken,
            },
            Err(e) => RelationshipsResult {
                id: id.to_owned(),
                ok: false,
                error: e.to_string(),
                relationships: Vec::new(),
                broken: Vec::new(),
            },
        }
    }

    pub fn resolve_graph(&self, id: &str) -> GraphResult {
        match resolve_graph(&self.registry, id) {
            Ok(root) => GraphResult {
                id: id.to_owned(),
                ok: true,
                error: String::new(),
                root: Some(root),
            },
            Err(e) => GraphResult {
                id: id.to_owned(),
                ok: false,
                error: e.to_string(),
                root: None,
            },
        }
    }

    pub fn check_compatibility(
        &self,
        old_id: &str,
        new_id: &str,
        mode: CompatMode,
    ) -> CompatibilityResult {
        match check_compatibility(&self.registry, old_id, new_id) {
            Ok(report) => {
                let ok = match mode {
                    CompatMode::Backward => report.is_backward_compatible,
                    CompatMode::Forward => report.is_forward_compatible,
                    CompatMode::Full => report.is_fully_compatible,
                };
                let error = if ok {
                    String::new()
                } else {
                    let mut reasons = Vec::new();
                    if mode != CompatMode::Forward {
                        reasons.extend(report.backward_errors.iter().cloned());
                    }
                    if mode != CompatMode::Backward {
                        reasons.extend(report.forward_errors.iter().cloned());
                    }
                    reasons.join("; ")
                };
                CompatibilityResult {
                    ok,
                    error,
                    mode,
                    report: Some(report),
                }
            }
            Err(e) => CompatibilityResult {
                ok: false,
                error: e.to_string(),
                mode,
                report: None,
            },
        }
    }

    pub fn cast_instance(&self, source_id: &str, target_schema_id: &str) -> CastResult {
        match cast_instance(&self.registry, source_id, target_schema_id) {
            Ok(outcome) => CastResult {
                ok: outcome.ok,
                error: outcome.incompatibilities.join("; "),
                cast: Some(outcome),
            },
            Err(e) => CastResult {
                ok: false,
                error: e.to_string(),
                cast: None,
            },
        }
    }

    /// Resolve a dotted + bracketed attribute path. `path` may instead
    /// ride along in the combined `id@path` form.
    pub fn get_attribute(&self, id: &str, path: Option<&str>) -> AttributeResult {
        let (gts_id, inline_path) = split_id_and_path(id);
        let Some(path) = path.or(inline_path) else {
            return AttributeResult {
                gts_id: gts_id.to_owned(),
                path: String::new(),
                resolved: false,
                value: Value::Null,
                ok: false,
                error: "no attribute path given".to_owned(),
            };
        };

        let entity = match self.registry.get_required(gts_id) {
            Ok(entity) => entity,
            Err(e) => {
                return AttributeResult {
                    gts_id: gts_id.to_owned(),
                    path: path.to_owned(),
                    resolved: false,
                    value: Value::Null,
                    ok: false,
                    error: e.to_string(),
                }
            }
        };

        match resolve_path(&entity.content, path) {
            Ok(Some(value)) => AttributeResult {
                gts_id: gts_id.to_owned(),
                path: path.to_owned(),
                resolved: true,
                value: value.clone(),
                ok: true,
                error: String::new(),
            },
            Ok(None) => AttributeResult {
                gts_id: gts_id.to_owned(),
                path: path.to_owned(),
                resolved: false,
                value: Value::Null,
                ok: true,
                error: String::new(),
            },
            Err(e) => AttributeResult {
                gts_id: gts_id.to_owned(),
                path: path.to_owned(),
                resolved: false,
                value: Value::Null,
                ok: false,
                error: e,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ops_with_person() -> GtsOps {
        let mut ops = GtsOps::new();
        let registered = ops.register(&json!({
            "$id": "gts://gts.test.pkg.ns.person.v1~",
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }));
        assert!(registered.ok, "{}", registered.error);
        ops
    }

    #[test]
    fn successful_records_carry_empty_error() {
        let ops = GtsOps::new();
        let result = ops.validate_id("gts.a.b.c.d.v1~");
        assert!(result.ok && result.valid);
        assert_eq!(result.error, "");

        let result = ops.validate_id("nope");
        assert!(!result.ok && !result.valid);
        assert!(!result.error.is_empty());
    }

    #[test]
    fn parse_id_returns_segments_and_flags() {
        let ops = GtsOps::new();
        let result = ops.parse_id("gts.vendor.pkg.*");
        assert!(result.ok);
        assert!(result.is_wildcard);
        assert!(result.segments[0].is_wildcard);

        let result = ops.parse_id("gts.a.b.c.d.v1~");
        assert!(result.is_schema);
    }

    #[test]
    fn match_record_echoes_inputs() {
        let ops = GtsOps::new();
        let result = ops.match_id_pattern("gts.a.b.c.d.v1~", "gts.a.*");
        assert!(result.ok && result.matched);
        assert_eq!(result.pattern, "gts.a.*");
        assert_eq!(result.candidate, "gts.a.b.c.d.v1~");
    }

    #[test]
    fn uuid_record_is_canonical() {
        let ops = GtsOps::new();
        let result = ops.id_to_uuid("gts://gts.a.b.c.d.v1~");
        assert!(result.ok);
        assert_eq!(result.id, "gts.a.b.c.d.v1~");
        assert_eq!(result.uuid.len(), 36);
    }

    #[test]
    fn extract_uses_provided_schema_as_fallback() {
        let ops = GtsOps::new();
        let doc = json!({ "id": "gts.a.b.c.d.v1" });
        let schema = json!({
            "$id": "gts://gts.a.b.c.d.v1~",
            "$schema": "https://json-schema.org/draft/2020-12/schema"
        });
        let result = ops.extract_id(&doc, Some(&schema));
        assert!(result.ok);
        assert_eq!(result.schema_id, "gts.a.b.c.d.v1~");
    }

    #[test]
    fn register_get_query_round_trip() {
        let mut ops = ops_with_person();
        let entity = ops.get("gts.test.pkg.ns.person.v1~");
        assert!(entity.ok);
        assert!(entity.entity.unwrap().is_schema);

        let missing = ops.get("gts.test.pkg.ns.nobody.v1~");
        assert!(!missing.ok);
        assert!(missing.entity.is_none());

        let query = ops.query("gts.test.*", None);
        assert_eq!(query.ids, ["gts.test.pkg.ns.person.v1~"]);

        let register = ops.register(&json!({ "bogus": true }));
        assert!(!register.ok);
    }

    #[test]
    fn validate_instance_record() {
        let mut ops = ops_with_person();
        ops.register(&json!({
            "id": "gts.test.pkg.ns.person.v1~test.pkg.ns.only_age.v1",
            "age": 30
        }));
        let result = ops.validate_instance("gts.test.pkg.ns.person.v1~test.pkg.ns.only_age.v1");
        assert!(!result.ok && !result.valid);
        assert!(result.error.contains("required"));
    }

    #[test]
    fn attribute_access_supports_combined_syntax() {
        let mut ops = ops_with_person();
        ops.register(&json!({
            "id": "gts.test.pkg.ns.person.v1~test.pkg.ns.alice.v1",
            "name": "alice",
            "tags": [{ "k": "a" }, { "k": "b" }]
        }));

        let result = ops.get_attribute(
            "gts.test.pkg.ns.person.v1~test.pkg.ns.alice.v1@tags[1].k",
            None,
        );
        assert!(result.ok && result.resolved);
        assert_eq!(result.value, "b");

        let result = ops.get_attribute(
            "gts.test.pkg.ns.person.v1~test.pkg.ns.alice.v1",
            Some("name"),
        );
        assert_eq!(result.value, "alice");

        let result = ops.get_attribute(
            "gts.test.pkg.ns.person.v1~test.pkg.ns.alice.v1",
            Some("missing.leaf"),
        );
        assert!(result.ok && !result.resolved);
        assert_eq!(result.value, Value::Null);
    }

    #[test]
    fn compat_mode_selects_verdict() {
        let mut ops = GtsOps::new();
        ops.register(&json!({
            "$id": "gts://gts.test.pkg.ns.t.v1~",
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": { "a": { "type": "string" } }
        }));
        ops.register(&json!({
            "$id": "gts://gts.test.pkg.ns.t.v2~",
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } },
            "required": ["b"]
        }));

        let backward =
            ops.check_compatibility("gts.test.pkg.ns.t.v1~", "gts.test.pkg.ns.t.v2~", CompatMode::Backward);
        assert!(!backward.ok);
        assert!(backward.error.contains("newly required"));

        let forward =
            ops.check_compatibility("gts.test.pkg.ns.t.v1~", "gts.test.pkg.ns.t.v2~", CompatMode::Forward);
        assert!(forward.ok);
        assert_eq!(forward.error, "");
    }

    #[test]
    fn list_filters_through_the_facade() {
        let mut ops = ops_with_person();
        ops.register(&json!({
            "id": "gts.test.pkg.ns.person.v1~test.pkg.ns.alice.v1",
            "name": "alice"
        }));

        let schemas = ops.list(&ListQuery::new().with_is_schema(true));
        assert!(schemas.ok);
        assert_eq!(schemas.entities.len(), 1);
        assert!(schemas.entities[0].is_schema);

        let everything = ops.list(&ListQuery::new());
        assert_eq!(everything.entities.len(), 2);
    }

    #[test]
    fn validate_all_reports_per_entity_verdicts() {
        let mut ops = ops_with_person();
        ops.register(&json!({
            "id": "gts.test.pkg.ns.person.v1~test.pkg.ns.good.v1",
            "name": "good"
        }));
        ops.register(&json!({
            "id": "gts.test.pkg.ns.person.v1~test.pkg.ns.bad.v1",
            "age": 3
        }));

        let outcome = ops.validate_all();
        assert!(!outcome.ok);
        assert_eq!(outcome.results.len(), 3);
        let bad = outcome
            .results
            .iter()
            .find(|r| r.id.ends_with("bad.v1"))
            .unwrap();
        assert!(!bad.valid);
        assert!(bad.error.contains("required"));
    }

    #[test]
    fn compat_mode_parse_defaults_to_full() {
        assert_eq!(CompatMode::parse("backward"), CompatMode::Backward);
        assert_eq!(CompatMode::parse("forward"), CompatMode::Forward);
        assert_eq!(CompatMode::parse("anything"), CompatMode::Full);
    }
}
