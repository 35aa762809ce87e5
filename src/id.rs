//! GTS identifier grammar: parsing, wildcard matching, UUID derivation.
//!
//! A GTS identifier is a lowercase ASCII string prefixed `gts.`, split at
//! every `~` into chain segments. A segment ending in `~` names a type;
//! a final segment without `~` names an instance. Each segment carries up
//! to six dot-separated tokens: `vendor.package.namespace.type.vMAJOR[.MINOR]`,
//! where a trailing `*` token turns the identifier into a wildcard pattern.

use serde::Serialize;
use uuid::Uuid;

use crate::error::IdError;

/// Canonical identifier prefix.
pub const GTS_PREFIX: &str = "gts.";

/// URI form prefix; accepted on input, never stored.
pub const URI_PREFIX: &str = "gts://";

/// Maximum identifier length in bytes.
pub const MAX_ID_LENGTH: usize = 1024;

const MAX_TOKENS: usize = 6;

/// Strips the `gts://` URI prefix if present, yielding the canonical form.
pub fn strip_uri_prefix(id: &str) -> &str {
    id.strip_prefix(URI_PREFIX).unwrap_or(id)
}

/// One `~`-delimited chain segment of a parsed identifier.
///
/// Token fields that the wildcard cuts short are left empty; version
/// fields are `None` when absent. `offset` is the byte position of the
/// segment start within the full identifier text, so concatenating
/// `text` values at their offsets reconstructs the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdSegment {
    pub ordinal: usize,
    pub offset: usize,
    pub text: String,
    pub vendor: String,
    pub package: String,
    pub namespace: String,
    pub type_name: String,
    pub ver_major: Option<u64>,
    pub ver_minor: Option<u64>,
    pub is_type: bool,
    pub is_wildcard: bool,
}

/// A parsed, validated GTS identifier in canonical (no `gts://`) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtsId {
    text: String,
    segments: Vec<IdSegment>,
    is_wildcard: bool,
}

impl GtsId {
    /// Parse and validate an identifier.
    ///
    /// Accepts both the bare (`gts.…`) and URI (`gts://gts.…`) forms and
    /// stores the bare form.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidIdentifier` for whole-string violations
    /// (case, charset, length, prefix, `..`/`~~`/trailing `.`), or
    /// `IdError::InvalidSegment` with ordinal and byte offset for
    /// segment-level violations (token count, token charset, versions,
    /// wildcard placement).
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let text = strip_uri_prefix(input);
        validate_text(text)?;

        let body = &text[GTS_PREFIX.len()..];
        let mut segments = Vec::new();
        let mut offset = GTS_PREFIX.len();
        for raw in body.split_inclusive('~') {
            if raw.is_empty() {
                continue;
            }
            let ordinal = segments.len();
            segments.push(parse_segment(ordinal, offset, raw)?);
            offset += raw.len();
        }

        if segments.is_empty() {
            return Err(IdError::invalid("identifier has no segments"));
        }

        // The wildcard terminates the identifier: one per id, tail position only.
        let wildcards = segments.iter().filter(|s| s.is_wildcard).count();
        if wildcards > 1 {
            return Err(IdError::invalid("more than one wildcard"));
        }
        if wildcards == 1 && !segments.last().is_some_and(|s| s.is_wildcard) {
            return Err(IdError::invalid(
                "wildcard is only allowed in the final segment",
            ));
        }

        Ok(GtsId {
            text: text.to_owned(),
            segments,
            is_wildcard: wildcards == 1,
        })
    }

    /// Whether `input` parses as a valid identifier (wildcards included).
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    /// Canonical identifier text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The chain segments in order.
    pub fn segments(&self) -> &[IdSegment] {
        &self.segments
    }

    /// Whether the identifier contains a wildcard terminator.
    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard
    }

    /// A type identifier: every chain segment ends in `~`.
    pub fn is_type_id(&self) -> bool {
        !self.is_wildcard && self.segments.iter().all(|s| s.is_type)
    }

    /// An instance identifier: the final segment does not end in `~`.
    pub fn is_instance_id(&self) -> bool {
        !self.is_wildcard && self.segments.last().is_some_and(|s| !s.is_type)
    }

    /// The canonical URI form: `gts://` + identifier.
    pub fn to_uri(&self) -> String {
        format!("{URI_PREFIX}{}", self.text)
    }

    /// The schema identifier of an instance: everything up to and
    /// including the `~` that precedes the final (non-`~`) segment.
    ///
    /// Returns `None` for type identifiers, wildcards, and chainless
    /// instances (no `~` to anchor the schema id).
    pub fn schema_id(&self) -> Option<String> {
        if !self.is_instance_id() {
            return None;
        }
        let pos = self.text.rfind('~')?;
        Some(self.text[..=pos].to_owned())
    }

    /// The parent type of a derived schema: for `A~B~` this is `A~`.
    ///
    /// Returns `None` unless the identifier is a type with at least two
    /// chain segments.
    pub fn parent_id(&self) -> Option<String> {
        if !self.is_type_id() || self.segments.len() < 2 {
            return None;
        }
        let last = self.segments.last()?;
        Some(self.text[..last.offset].to_owned())
    }

    /// Deterministic name-based UUIDv5 over the canonical identifier
    /// text, namespaced under `uuidv5(URL, "gts")`. Pure and stable
    /// across processes.
    pub fn to_uuid(&self) -> Uuid {
        Uuid::new_v5(&gts_uuid_namespace(), self.text.as_bytes())
    }

    /// Match this concrete identifier against a pattern.
    ///
    /// The pattern may carry at most one wildcard, at its tail. A
    /// pattern segment that omits the minor version matches any
    /// candidate minor; a supplied minor requires equality. A pattern
    /// with fewer segments than the candidate matches as a prefix once
    /// all of its segments match.
    ///
    /// # Errors
    ///
    /// Returns an error when `self` is itself a wildcard — candidates
    /// must be concrete.
    pub fn matches(&self, pattern: &GtsId) -> Result<bool, IdError> {
        if self.is_wildcard {
            return Err(IdError::invalid("candidate must be a concrete identifier"));
        }
        if pattern.segments.len() > self.segments.len() {
            return Ok(false);
        }
        for (pat, cand) in pattern.segments.iter().zip(&self.segments) {
            if pat.is_wildcard {
                // Tokens set before the `*` must agree; the wildcard then
                // swallows the rest of the candidate, trailing segments included.
                return Ok(wildcard_segment_matches(pat, cand));
            }
            if !concrete_segment_matches(pat, cand) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl std::fmt::Display for GtsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// The UUIDv5 namespace for GTS identifiers: `uuidv5(URL, "gts")`.
pub fn gts_uuid_namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, b"gts")
}

fn wildcard_segment_matches(pat: &IdSegment, cand: &IdSegment) -> bool {
    if !pat.vendor.is_empty() && pat.vendor != cand.vendor {
        return false;
    }
    if !pat.package.is_empty() && pat.package != cand.package {
        return false;
    }
    if !pat.namespace.is_empty() && pat.namespace != cand.namespace {
        return false;
    }
    if !pat.type_name.is_empty() && pat.type_name != cand.type_name {
        return false;
    }
    if pat.ver_major.is_some() && pat.ver_major != cand.ver_major {
        return false;
    }
    if pat.ver_minor.is_some() && pat.ver_minor != cand.ver_minor {
        return false;
    }
    true
}

fn concrete_segment_matches(pat: &IdSegment, cand: &IdSegment) -> bool {
    pat.vendor == cand.vendor
        && pat.package == cand.package
        && pat.namespace == cand.namespace
        && pat.type_name == cand.type_name
        && pat.ver_major == cand.ver_major
        && pat.is_type == cand.is_type
        // Omitted minor is a wildcard; a supplied minor requires equality.
        && (pat.ver_minor.is_none() || pat.ver_minor == cand.ver_minor)
}

fn validate_text(text: &str) -> Result<(), IdError> {
    if text.len() > MAX_ID_LENGTH {
        return Err(IdError::invalid(format!(
            "length {} exceeds {MAX_ID_LENGTH} bytes",
            text.len()
        )));
    }
    if !text.is_ascii() {
        return Err(IdError::invalid("contains non-ASCII characters"));
    }
    if text.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(IdError::invalid("contains uppercase characters"));
    }
    if text.contains('-') {
        return Err(IdError::invalid("contains '-'"));
    }
    if !text.starts_with(GTS_PREFIX) {
        return Err(IdError::invalid(format!("missing '{GTS_PREFIX}' prefix")));
    }
    if text == GTS_PREFIX || text == "gts.~" {
        return Err(IdError::invalid("identifier has no segments"));
    }
    if text.contains("..") {
        return Err(IdError::invalid("contains '..'"));
    }
    if text.ends_with('.') {
        return Err(IdError::invalid("ends with '.'"));
    }
    if text.contains("~~") {
        return Err(IdError::invalid("contains '~~'"));
    }
    Ok(())
}

fn parse_segment(ordinal: usize, offset: usize, raw: &str) -> Result<IdSegment, IdError> {
    let is_type = raw.ends_with('~');
    let core = raw.strip_suffix('~').unwrap_or(raw);
    let tokens: Vec<&str> = core.split('.').collect();

    if tokens.len() > MAX_TOKENS {
        return Err(IdError::segment(
            ordinal,
            offset,
            format!("{} tokens exceed the maximum of {MAX_TOKENS}", tokens.len()),
        ));
    }
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(IdError::segment(ordinal, offset, "empty token"));
    }

    let wildcard_pos = tokens.iter().position(|t| *t == "*");
    if let Some(pos) = wildcard_pos {
        if pos != tokens.len() - 1 {
            return Err(IdError::segment(
                ordinal,
                offset,
                "wildcard must be the final token",
            ));
        }
        if is_type {
            return Err(IdError::segment(
                ordinal,
                offset,
                "wildcard segment cannot end with '~'",
            ));
        }
    } else if tokens.len() < 5 {
        return Err(IdError::segment(
            ordinal,
            offset,
            format!(
                "{} tokens; a segment without a wildcard needs 5 or 6",
                tokens.len()
            ),
        ));
    }

    let set_len = wildcard_pos.unwrap_or(tokens.len());
    let mut segment = IdSegment {
        ordinal,
        offset,
        text: raw.to_owned(),
        vendor: String::new(),
        package: String::new(),
        namespace: String::new(),
        type_name: String::new(),
        ver_major: None,
        ver_minor: None,
        is_type,
        is_wildcard: wildcard_pos.is_some(),
    };

    for (i, token) in tokens[..set_len].iter().enumerate() {
        match i {
            0..=3 => {
                if !is_name_token(token) {
                    return Err(IdError::segment(
                        ordinal,
                        offset,
                        format!("token {token:?} must match [a-z_][a-z0-9_]*"),
                    ));
                }
                match i {
                    0 => segment.vendor = (*token).to_owned(),
                    1 => segment.package = (*token).to_owned(),
                    2 => segment.namespace = (*token).to_owned(),
                    _ => segment.type_name = (*token).to_owned(),
                }
            }
            4 => {
                let digits = token.strip_prefix('v').ok_or_else(|| {
                    IdError::segment(
                        ordinal,
                        offset,
                        format!("major version {token:?} must start with 'v'"),
                    )
                })?;
                segment.ver_major = Some(parse_version(digits).ok_or_else(|| {
                    IdError::segment(
                        ordinal,
                        offset,
                        format!("major version {token:?} is not a canonical number"),
                    )
                })?);
            }
            _ => {
                segment.ver_minor = Some(parse_version(token).ok_or_else(|| {
                    IdError::segment(
                        ordinal,
                        offset,
                        format!("minor version {token:?} is not a canonical number"),
                    )
                })?);
            }
        }
    }

    Ok(segment)
}

fn is_name_token(token: &str) -> bool {
    let mut bytes = token.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == b'_')
        && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Canonical non-negative decimal: digits only, no leading zeros beyond "0".
fn parse_version(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}
