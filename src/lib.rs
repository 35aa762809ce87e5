//! GTS Registry
//!
//! A registry and toolkit for the Global Type System (GTS): a
//! human-readable, globally unique identifier scheme for schemas and
//! instances, with operations that validate, relate, compare, and
//! transform JSON documents around those identifiers.
//!
//! Schemas are JSON-Schema documents annotated with GTS fields; the
//! in-memory registry keys every entity by its identifier and enforces
//! cross-entity referential integrity through the `x-gts-ref` keyword.
//!
//! # Example
//!
//! ```
//! use gts_registry::GtsOps;
//! use serde_json::json;
//!
//! let mut ops = GtsOps::new();
//! ops.register(&json!({
//!     "$id": "gts://gts.acme.core.events.user_created.v1~",
//!     "$schema": "https://json-schema.org/draft/2020-12/schema",
//!     "type": "object",
//!     "properties": { "name": { "type": "string" } },
//!     "required": ["name"]
//! }));
//! ops.register(&json!({
//!     "id": "gts.acme.core.events.user_created.v1~acme.core.events.first.v1",
//!     "name": "alice"
//! }));
//!
//! let verdict = ops.validate_instance(
//!     "gts.acme.core.events.user_created.v1~acme.core.events.first.v1",
//! );
//! assert!(verdict.valid);
//!
//! let matched = ops.match_id_pattern("gts.acme.core.events.user_created.v1~", "gts.acme.*");
//! assert!(matched.matched);
//! ```
//!
//! # Identifier shape
//!
//! | Identifier | Meaning |
//! |---|---|
//! | `gts.vendor.pkg.ns.type.v1~` | a type (schema) |
//! | `gts.vendor.pkg.ns.type.v1~v.p.n.inst.v1` | an instance of that type |
//! | `gts.vendor.pkg.*` | a wildcard pattern |
//!
//! The registry is process-local and volatile; persistence, transport,
//! and telemetry subscribers are host concerns.

mod cast;
mod compat;
mod error;
mod extract;
mod id;
mod normalize;
mod ops;
mod path;
mod registry;
mod relations;
mod validate;
mod xref;

pub use cast::{cast_instance, CastOutcome};
pub use compat::{check_compatibility, infer_direction, CompatibilityReport, VersionDirection};
pub use error::{CastError, ExtractError, IdError, RegistryError, XrefError};
pub use extract::{extract, is_schema_document, ExtractConfig, Extracted, ENTITY_ID_FIELDS, SCHEMA_ID_FIELDS};
pub use id::{gts_uuid_namespace, strip_uri_prefix, GtsId, IdSegment, GTS_PREFIX, MAX_ID_LENGTH, URI_PREFIX};
pub use normalize::{normalize, X_GTS_REF};
pub use ops::{
    AttributeResult, CastResult, CompatMode, CompatibilityResult, EntityResult, ExtractIdResult,
    GraphResult, GtsOps, IdToUuidResult, ListResult, MatchPatternResult, ParseIdResult,
    QueryResult, RegisterResult, RelationshipsResult, ValidateAllResult, ValidateIdResult,
    ValidateInstanceResult,
};
pub use path::{parse_path, resolve_path, split_id_and_path, PathToken};
pub use registry::{Entity, ListQuery, Registry, RegistryConfig, SegmentScope};
pub use relations::{
    collect_references, resolve_graph, resolve_relationships, Reference, RelationshipNode,
    Relationships,
};
pub use validate::{validate_entity, validate_instance};
pub use xref::{RefLookup, XrefValidator};
