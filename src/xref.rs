//! `x-gts-ref` cross-reference validation.
//!
//! The `x-gts-ref` keyword constrains a string value to be a GTS
//! identifier matching a pattern. Patterns are either absolute
//! (`gts.…`, possibly `*`-terminated) or JSON pointers into the
//! enclosing root schema. Validation runs against the original,
//! un-normalized schema — normalization strips the keyword.

use serde_json::Value;

use crate::error::XrefError;
use crate::id::{strip_uri_prefix, GtsId};
use crate::normalize::X_GTS_REF;

/// Read-only presence check over registered identifiers.
pub trait RefLookup {
    fn contains_id(&self, id: &str) -> bool;
}

impl<F: Fn(&str) -> bool> RefLookup for F {
    fn contains_id(&self, id: &str) -> bool {
        self(id)
    }
}

/// Validates `x-gts-ref` constraints for one root schema.
pub struct XrefValidator<'a> {
    root: &'a Value,
    lookup: Option<&'a dyn RefLookup>,
}

impl<'a> XrefValidator<'a> {
    /// `root` is the original schema; `lookup`, when given, additionally
    /// requires referenced identifiers to be registered.
    pub fn new(root: &'a Value, lookup: Option<&'a dyn RefLookup>) -> Self {
        Self { root, lookup }
    }

    /// Check an instance against the schema's `x-gts-ref` constraints.
    ///
    /// Returns all violations; an empty vector means the instance passes.
    pub fn validate_instance(&self, instance: &Value) -> Vec<XrefError> {
        let mut errors = Vec::new();
        let _ = self.check_node(instance, self.root, "", &mut errors);
        errors
    }

    /// Check that every `x-gts-ref` in the schema itself is well-formed:
    /// a valid identifier or pattern, or a resolvable pointer.
    pub fn validate_schema(&self) -> Vec<XrefError> {
        let mut errors = Vec::new();
        self.check_schema_node(self.root, "", &mut errors);
        errors
    }

    /// Walks an instance/schema pair, returning how many `x-gts-ref`
    /// checks actually applied (a non-string value at a ref node applies
    /// none).
    fn check_node(
        &self,
        instance: &Value,
        schema: &Value,
        path: &str,
        errors: &mut Vec<XrefError>,
    ) -> usize {
        let Value::Object(schema_obj) = schema else {
            return 0;
        };
        let mut checks = 0usize;

        if let Some(pattern) = schema_obj.get(X_GTS_REF).and_then(Value::as_str) {
            if let Some(value) = instance.as_str() {
                self.check_value(value, pattern, path, errors);
                checks += 1;
            }
        }

        if let Some(Value::Array(branches)) = schema_obj.get("allOf") {
            for branch in branches {
                checks += self.check_node(instance, branch, path, errors);
            }
        }

        for combinator in ["anyOf", "oneOf"] {
            if let Some(Value::Array(branches)) = schema_obj.get(combinator) {
                checks += self.check_choice(instance, branches, combinator, path, errors);
            }
        }

        if let (Some(Value::Object(props)), Value::Object(obj)) =
            (schema_obj.get("properties"), instance)
        {
            for (name, subschema) in props {
                if let Some(child) = obj.get(name) {
                    let child_path = format!("{path}/{name}");
                    checks += self.check_node(child, subschema, &child_path, errors);
                }
            }
        }

        if let (Some(items), Value::Array(elements)) = (schema_obj.get("items"), instance) {
            if items.is_object() {
                for (i, element) in elements.iter().enumerate() {
                    let child_path = format!("{path}/{i}");
                    checks += self.check_node(element, items, &child_path, errors);
                }
            }
        }

        checks
    }

    /// `anyOf`/`oneOf` enforcement applies only when every branch carries
    /// an `x-gts-ref` somewhere; mixed combinators defer to the base
    /// JSON-Schema engine. A branch counts as passing only when at least
    /// one check applied to the instance and none failed.
    fn check_choice(
        &self,
        instance: &Value,
        branches: &[Value],
        combinator: &str,
        path: &str,
        errors: &mut Vec<XrefError>,
    ) -> usize {
        if branches.is_empty() || !branches.iter().all(contains_ref) {
            return 0;
        }

        let mut passing = 0usize;
        let mut total_checks = 0usize;
        let mut branch_errors = Vec::new();
        for branch in branches {
            let mut errs = Vec::new();
            let checks = self.check_node(instance, branch, path, &mut errs);
            total_checks += checks;
            if errs.is_empty() && checks > 0 {
                passing += 1;
            } else {
                branch_errors.extend(errs);
            }
        }
        if total_checks == 0 {
            return 0;
        }

        match combinator {
            "anyOf" => {
                if passing == 0 {
                    errors.extend(branch_errors);
                }
            }
            _ => match passing {
                1 => {}
                0 => errors.extend(branch_errors),
                n => errors.push(XrefError::MultipleOneOfMatches {
                    path: path.to_owned(),
                    count: n,
                }),
            },
        }
        total_checks
    }

    fn check_value(&self, value: &str, pattern: &str, path: &str, errors: &mut Vec<XrefError>) {
        let resolved = match self.resolve_pattern(pattern, path) {
            Ok(p) => p,
            Err(e) => {
                errors.push(e);
                return;
            }
        };

        let canonical = strip_uri_prefix(value);
        let id = match GtsId::parse(canonical) {
            Ok(id) => id,
            Err(e) => {
                errors.push(XrefError::InvalidValue {
                    path: path.to_owned(),
                    value: value.to_owned(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let matched = if resolved == "gts.*" {
            true
        } else if let Some(prefix) = resolved.strip_suffix('*') {
            canonical.starts_with(prefix)
        } else {
            canonical.starts_with(&resolved)
        };
        if !matched {
            errors.push(XrefError::PatternMismatch {
                path: path.to_owned(),
                value: value.to_owned(),
                pattern: resolved,
            });
            return;
        }

        if let Some(lookup) = self.lookup {
            if !lookup.contains_id(id.as_str()) {
                errors.push(XrefError::NotInRegistry {
                    path: path.to_owned(),
                    id: id.as_str().to_owned(),
                });
            }
        }
    }

    /// Resolves a pattern to its absolute form. Pointers resolve against
    /// the root schema with at most one further indirection.
    fn resolve_pattern(&self, raw: &str, path: &str) -> Result<String, XrefError> {
        if !raw.starts_with('/') {
            let pattern = strip_uri_prefix(raw);
            if pattern.starts_with("gts.") {
                return Ok(pattern.to_owned());
            }
            return Err(XrefError::PatternMalformed {
                path: path.to_owned(),
                pattern: raw.to_owned(),
            });
        }

        let unresolvable = || XrefError::Unresolvable {
            path: path.to_owned(),
            pointer: raw.to_owned(),
        };

        let first = self.root.pointer(raw).ok_or_else(unresolvable)?;
        let target = match first {
            Value::String(s) if s.starts_with('/') => {
                self.root.pointer(s).ok_or_else(unresolvable)?
            }
            other => other,
        };

        let pattern = match target {
            Value::String(s) => strip_uri_prefix(s),
            Value::Object(obj) => {
                if let Some(r) = obj.get(X_GTS_REF).and_then(Value::as_str) {
                    strip_uri_prefix(r)
                } else if let Some(id) = obj.get("$id").and_then(Value::as_str) {
                    strip_uri_prefix(id)
                } else {
                    return Err(unresolvable());
                }
            }
            _ => return Err(unresolvable()),
        };
        if pattern.starts_with("gts.") {
            Ok(pattern.to_owned())
        } else {
            Err(XrefError::PatternMalformed {
                path: path.to_owned(),
                pattern: pattern.to_owned(),
            })
        }
    }

    fn check_schema_node(&self, node: &Value, path: &str, errors: &mut Vec<XrefError>) {
        match node {
            Value::Object(obj) => {
                if let Some(raw) = obj.get(X_GTS_REF) {
                    match raw.as_str() {
                        Some(s) => self.check_schema_pattern(s, path, errors),
                        None => errors.push(XrefError::PatternMalformed {
                            path: path.to_owned(),
                            pattern: raw.to_string(),
                        }),
                    }
                }
                for (key, value) in obj {
                    let child_path = format!("{path}/{key}");
                    self.check_schema_node(value, &child_path, errors);
                }
            }
            Value::Array(arr) => {
                for (i, value) in arr.iter().enumerate() {
                    let child_path = format!("{path}/{i}");
                    self.check_schema_node(value, &child_path, errors);
                }
            }
            _ => {}
        }
    }

    fn check_schema_pattern(&self, raw: &str, path: &str, errors: &mut Vec<XrefError>) {
        match self.resolve_pattern(raw, path) {
            Ok(pattern) => {
                if !GtsId::is_valid(&pattern) {
                    errors.push(XrefError::PatternMalformed {
                        path: path.to_owned(),
                        pattern,
                    });
                }
            }
            Err(e) => errors.push(e),
        }
    }
}

/// Whether a subtree carries an `x-gts-ref` anywhere.
fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(obj) => {
            obj.contains_key(X_GTS_REF) || obj.values().any(contains_ref)
        }
        Value::Array(arr) => arr.iter().any(contains_ref),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(schema: &Value, instance: &Value) -> Vec<XrefError> {
        XrefValidator::new(schema, None).validate_instance(instance)
    }

    #[test]
    fn exact_pattern_accepts_prefix_equality() {
        let schema = json!({
            "properties": {
                "target": { "type": "string", "x-gts-ref": "gts.a.b.c.d.v1~" }
            }
        });
        let ok = json!({ "target": "gts.a.b.c.d.v1~e.f.g.h.v1" });
        assert!(validate(&schema, &ok).is_empty());

        let exact = json!({ "target": "gts.a.b.c.d.v1~" });
        assert!(validate(&schema, &exact).is_empty());

        let wrong = json!({ "target": "gts.z.b.c.d.v1~" });
        let errors = validate(&schema, &wrong);
        assert!(matches!(errors[0], XrefError::PatternMismatch { .. }));
    }

    #[test]
    fn star_pattern_is_prefix_check() {
        let schema = json!({
            "properties": {
                "target": { "x-gts-ref": "gts.test.pkg.*" }
            }
        });
        assert!(validate(&schema, &json!({ "target": "gts.test.pkg.ns.thing.v1~" })).is_empty());
        assert!(!validate(&schema, &json!({ "target": "gts.other.pkg.ns.thing.v1~" })).is_empty());
    }

    #[test]
    fn universal_pattern_accepts_any_valid_id() {
        let schema = json!({
            "properties": { "target": { "x-gts-ref": "gts.*" } }
        });
        assert!(validate(&schema, &json!({ "target": "gts.a.b.c.d.v1" })).is_empty());

        let errors = validate(&schema, &json!({ "target": "not an id" }));
        assert!(matches!(errors[0], XrefError::InvalidValue { .. }));
    }

    #[test]
    fn uri_form_values_are_canonicalized_before_checking() {
        let schema = json!({
            "properties": { "target": { "x-gts-ref": "gts.a.*" } }
        });
        assert!(validate(&schema, &json!({ "target": "gts://gts.a.b.c.d.v1~" })).is_empty());
    }

    #[test]
    fn pointer_patterns_resolve_against_root() {
        let schema = json!({
            "$defs": {
                "ref_target": "gts.a.b.*"
            },
            "properties": {
                "target": { "x-gts-ref": "/$defs/ref_target" }
            }
        });
        assert!(validate(&schema, &json!({ "target": "gts.a.b.c.d.v1~" })).is_empty());
        assert!(!validate(&schema, &json!({ "target": "gts.x.b.c.d.v1~" })).is_empty());
    }

    #[test]
    fn pointer_follows_one_indirection() {
        let schema = json!({
            "$defs": {
                "hop": "/$defs/target",
                "target": { "x-gts-ref": "gts.a.*" },
                "by_id": { "$id": "gts://gts.b.c.d.e.v1~" }
            },
            "properties": {
                "one": { "x-gts-ref": "/$defs/hop" },
                "two": { "x-gts-ref": "/$defs/by_id" }
            }
        });
        assert!(validate(&schema, &json!({ "one": "gts.a.b.c.d.v1~" })).is_empty());
        assert!(validate(&schema, &json!({ "two": "gts.b.c.d.e.v1~x.y.z.w.v1" })).is_empty());
    }

    #[test]
    fn unresolvable_pointer_is_reported() {
        let schema = json!({
            "properties": { "target": { "x-gts-ref": "/$defs/missing" } }
        });
        let errors = validate(&schema, &json!({ "target": "gts.a.b.c.d.v1~" }));
        assert!(matches!(errors[0], XrefError::Unresolvable { .. }));
    }

    #[test]
    fn registry_presence_is_required_when_lookup_given() {
        let schema = json!({
            "properties": { "target": { "x-gts-ref": "gts.a.*" } }
        });
        let lookup = |id: &str| id == "gts.a.b.c.d.v1~";
        let validator = XrefValidator::new(&schema, Some(&lookup));

        assert!(validator
            .validate_instance(&json!({ "target": "gts.a.b.c.d.v1~" }))
            .is_empty());

        let errors = validator.validate_instance(&json!({ "target": "gts.a.b.c.d.v2~" }));
        assert!(matches!(errors[0], XrefError::NotInRegistry { .. }));
    }

    #[test]
    fn all_of_accumulates_branch_errors() {
        let schema = json!({
            "properties": {
                "target": {
                    "allOf": [
                        { "x-gts-ref": "gts.a.*" },
                        { "x-gts-ref": "gts.a.b.*" }
                    ]
                }
            }
        });
        let errors = validate(&schema, &json!({ "target": "gts.z.z.c.d.v1~" }));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn any_of_needs_one_passing_branch() {
        let schema = json!({
            "properties": {
                "target": {
                    "anyOf": [
                        { "x-gts-ref": "gts.a.*" },
                        { "x-gts-ref": "gts.b.*" }
                    ]
                }
            }
        });
        assert!(validate(&schema, &json!({ "target": "gts.b.x.y.z.v1~" })).is_empty());

        let errors = validate(&schema, &json!({ "target": "gts.c.x.y.z.v1~" }));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn mixed_any_of_defers_to_base_engine() {
        let schema = json!({
            "properties": {
                "target": {
                    "anyOf": [
                        { "x-gts-ref": "gts.a.*" },
                        { "type": "string" }
                    ]
                }
            }
        });
        // Would fail the ref branch, but the non-ref branch disables enforcement.
        assert!(validate(&schema, &json!({ "target": "gts.z.x.y.w.v1~" })).is_empty());
    }

    #[test]
    fn one_of_rejects_overlapping_matches() {
        let schema = json!({
            "properties": {
                "target": {
                    "oneOf": [
                        { "x-gts-ref": "gts.test.pkg.ns.*" },
                        { "x-gts-ref": "gts.test.pkg.ns.target_a.*" }
                    ]
                }
            }
        });
        let errors = validate(&schema, &json!({ "target": "gts.test.pkg.ns.target_a.v1~" }));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("oneOf"));

        // A value matching exactly one branch passes.
        assert!(validate(&schema, &json!({ "target": "gts.test.pkg.ns.other.v1~" })).is_empty());
    }

    #[test]
    fn one_of_zero_matches_reports_union() {
        let schema = json!({
            "properties": {
                "target": {
                    "oneOf": [
                        { "x-gts-ref": "gts.a.*" },
                        { "x-gts-ref": "gts.b.*" }
                    ]
                }
            }
        });
        let errors = validate(&schema, &json!({ "target": "gts.c.x.y.z.v1~" }));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn non_string_value_skips_choice_enforcement() {
        let schema = json!({
            "properties": {
                "target": {
                    "oneOf": [
                        { "x-gts-ref": "gts.a.*" },
                        { "x-gts-ref": "gts.b.*" }
                    ]
                }
            }
        });
        // No check applies to a number; the base engine owns this failure.
        assert!(validate(&schema, &json!({ "target": 42 })).is_empty());
    }

    #[test]
    fn array_items_are_checked_elementwise() {
        let schema = json!({
            "properties": {
                "targets": {
                    "type": "array",
                    "items": { "x-gts-ref": "gts.a.*" }
                }
            }
        });
        let errors = validate(
            &schema,
            &json!({ "targets": ["gts.a.b.c.d.v1~", "gts.z.b.c.d.v1~"] }),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("/targets/1"));
    }

    #[test]
    fn schema_side_walk_flags_malformed_patterns() {
        let schema = json!({
            "properties": {
                "good": { "x-gts-ref": "gts.a.b.*" },
                "bad": { "x-gts-ref": "not a pattern" },
                "dangling": { "x-gts-ref": "/$defs/nope" }
            }
        });
        let errors = XrefValidator::new(&schema, None).validate_schema();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| matches!(e, XrefError::PatternMalformed { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, XrefError::Unresolvable { .. })));
    }

    #[test]
    fn schema_side_walk_accepts_pointer_and_wildcard_patterns() {
        let schema = json!({
            "$defs": { "target": "gts.a.b.*" },
            "properties": {
                "one": { "x-gts-ref": "/$defs/target" },
                "two": { "x-gts-ref": "gts.*" }
            }
        });
        assert!(XrefValidator::new(&schema, None).validate_schema().is_empty());
    }
}
