//! Error types for identifier parsing, registry access, and validation.

use thiserror::Error;

/// Errors from parsing or matching GTS identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },

    #[error("invalid segment {ordinal} at offset {offset}: {reason}")]
    InvalidSegment {
        ordinal: usize,
        offset: usize,
        reason: String,
    },
}

impl IdError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        IdError::InvalidIdentifier {
            reason: reason.into(),
        }
    }

    pub(crate) fn segment(ordinal: usize, offset: usize, reason: impl Into<String>) -> Self {
        IdError::InvalidSegment {
            ordinal,
            offset,
            reason: reason.into(),
        }
    }
}

/// Errors from entity extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("no identifier field found (checked: {})", checked.join(", "))]
    NoIdField { checked: Vec<String> },

    #[error(transparent)]
    InvalidId(#[from] IdError),
}

/// Errors from registry lookups and registration.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("entity is not a schema: {0}")]
    NotASchema(String),

    #[error("instance has no schema identifier: {0}")]
    NoSchemaId(String),

    #[error("unresolved references for {id}: {}", references.join(", "))]
    UnresolvedReference { id: String, references: Vec<String> },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    InvalidId(#[from] IdError),
}

/// A single `x-gts-ref` violation with instance-path context.
///
/// Rendered violations are joined with "; " into the validation error
/// string, matching the shape of JSON-Schema engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum XrefError {
    #[error("{path} x-gts-ref pattern is malformed: {pattern}")]
    PatternMalformed { path: String, pattern: String },

    #[error("{path} x-gts-ref pointer cannot be resolved: {pointer}")]
    Unresolvable { path: String, pointer: String },

    #[error("{path} value {value:?} is not a valid GTS identifier: {reason}")]
    InvalidValue {
        path: String,
        value: String,
        reason: String,
    },

    #[error("{path} value {value:?} does not match x-gts-ref pattern {pattern:?}")]
    PatternMismatch {
        path: String,
        value: String,
        pattern: String,
    },

    #[error("{path} referenced entity is not in the registry: {id}")]
    NotInRegistry { path: String, id: String },

    #[error("{path} matches {count} oneOf branches but must match exactly one")]
    MultipleOneOfMatches { path: String, count: usize },
}

impl XrefError {
    /// Joins a batch of violations into a single "; "-separated message.
    pub fn join(errors: &[XrefError]) -> String {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Hard failures from the cast operation.
///
/// Structural incompatibilities discovered during the cast are not
/// errors; they accumulate as reasons on the cast result record.
#[derive(Debug, Clone, Error)]
pub enum CastError {
    #[error("source entity is a schema, not an instance: {0}")]
    SourceNotInstance(String),

    #[error("source schema is outside the registry: {0}")]
    SchemaOutsideRegistry(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
