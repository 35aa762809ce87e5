//! Multi-version evolution scenarios: a schema family growing across
//! minor versions, with casts, compatibility checks, and reference
//! graphs over the same registry.

use gts_registry::{CompatMode, GtsOps, ListQuery, VersionDirection};
use serde_json::json;

/// Registry holding three minor versions of an `order` schema plus a
/// `customer` schema the orders reference.
fn seeded() -> GtsOps {
    let mut ops = GtsOps::new();

    let customer = ops.register(&json!({
        "$id": "gts://gts.shop.sales.entities.customer.v1~",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": {
            "name": { "type": "string" }
        },
        "required": ["name"]
    }));
    assert!(customer.ok, "{}", customer.error);

    // v1.0: minimal order.
    let v1 = ops.register(&json!({
        "$id": "gts://gts.shop.sales.entities.order.v1.0~",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": {
            "kind": { "type": "string", "const": "gts.shop.sales.entities.order.v1.0~" },
            "customer": { "type": "string", "x-gts-ref": "gts.shop.sales.entities.customer.v1~" },
            "total": { "type": "number", "minimum": 0 }
        },
        "required": ["customer", "total"]
    }));
    assert!(v1.ok, "{}", v1.error);

    // v1.1: adds an optional currency with a default. Compatible.
    let v1_1 = ops.register(&json!({
        "$id": "gts://gts.shop.sales.entities.order.v1.1~",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": {
            "kind": { "type": "string", "const": "gts.shop.sales.entities.order.v1.1~" },
            "customer": { "type": "string", "x-gts-ref": "gts.shop.sales.entities.customer.v1~" },
            "total": { "type": "number", "minimum": 0 },
            "currency": { "type": "string", "default": "usd" }
        },
        "required": ["customer", "total"]
    }));
    assert!(v1_1.ok, "{}", v1_1.error);

    // v1.2: requires the currency and tightens the total. Breaking backward.
    let v1_2 = ops.register(&json!({
        "$id": "gts://gts.shop.sales.entities.order.v1.2~",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": {
            "kind": { "type": "string", "const": "gts.shop.sales.entities.order.v1.2~" },
            "customer": { "type": "string", "x-gts-ref": "gts.shop.sales.entities.customer.v1~" },
            "total": { "type": "number", "minimum": 1 },
            "currency": { "type": "string", "default": "usd" }
        },
        "required": ["customer", "total", "currency"]
    }));
    assert!(v1_2.ok, "{}", v1_2.error);

    ops
}

fn register_order_instance(ops: &mut GtsOps) {
    let customer = ops.register(&json!({
        "id": "gts.shop.sales.entities.customer.v1~shop.sales.entities.c_1.v1",
        "name": "ada"
    }));
    assert!(customer.ok, "{}", customer.error);

    let order = ops.register(&json!({
        "id": "gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_1.v1",
        "kind": "gts.shop.sales.entities.order.v1.0~",
        "customer": "gts.shop.sales.entities.customer.v1~shop.sales.entities.c_1.v1",
        "total": 10.5
    }));
    assert!(order.ok, "{}", order.error);
}

#[test]
fn minor_bump_with_optional_default_is_fully_compatible() {
    let ops = seeded();
    let result = ops.check_compatibility(
        "gts.shop.sales.entities.order.v1.0~",
        "gts.shop.sales.entities.order.v1.1~",
        CompatMode::Full,
    );
    assert!(result.ok, "{}", result.error);
    let report = result.report.unwrap();
    assert_eq!(report.direction, VersionDirection::Up);
    assert!(report.is_fully_compatible);
}

#[test]
fn requiring_an_existing_optional_breaks_backward_only() {
    let ops = seeded();
    let result = ops.check_compatibility(
        "gts.shop.sales.entities.order.v1.1~",
        "gts.shop.sales.entities.order.v1.2~",
        CompatMode::Full,
    );
    assert!(!result.ok);
    let report = result.report.unwrap();
    assert!(!report.is_backward_compatible);
    assert!(report
        .backward_errors
        .iter()
        .any(|e| e.contains("'currency'")));
    assert!(report
        .backward_errors
        .iter()
        .any(|e| e.contains("tightened minimum")));
    // Nothing was removed or relaxed.
    assert!(report.is_forward_compatible);
}

#[test]
fn downgrade_direction_is_inferred() {
    let ops = seeded();
    let result = ops.check_compatibility(
        "gts.shop.sales.entities.order.v1.2~",
        "gts.shop.sales.entities.order.v1.0~",
        CompatMode::Forward,
    );
    let report = result.report.unwrap();
    assert_eq!(report.direction, VersionDirection::Down);
    // Going down drops the currency requirement and relaxes the minimum.
    assert!(!report.is_forward_compatible);
}

#[test]
fn cast_up_one_minor_fills_currency_and_rewrites_kind() {
    let mut ops = seeded();
    register_order_instance(&mut ops);

    let result = ops.cast_instance(
        "gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_1.v1",
        "gts.shop.sales.entities.order.v1.1~",
    );
    assert!(result.ok, "{}", result.error);
    let cast = result.cast.unwrap();
    assert_eq!(cast.direction, VersionDirection::Up);
    assert_eq!(cast.added, ["currency"]);
    let value = cast.result.unwrap();
    assert_eq!(value["currency"], "usd");
    assert_eq!(value["kind"], "gts.shop.sales.entities.order.v1.1~");
    assert_eq!(value["total"], 10.5);
}

#[test]
fn cast_two_minors_up_satisfies_new_requirement_via_default() {
    let mut ops = seeded();
    register_order_instance(&mut ops);

    let result = ops.cast_instance(
        "gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_1.v1",
        "gts.shop.sales.entities.order.v1.2~",
    );
    // currency is required in v1.2 but carries a default, so the cast
    // succeeds; the tightened minimum still admits 10.5.
    assert!(result.ok, "{}", result.error);
    let value = result.cast.unwrap().result.unwrap();
    assert_eq!(value["currency"], "usd");
    assert_eq!(value["kind"], "gts.shop.sales.entities.order.v1.2~");
}

#[test]
fn cast_violating_tightened_bound_is_reported() {
    let mut ops = seeded();
    let order = ops.register(&json!({
        "id": "gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_free.v1",
        "kind": "gts.shop.sales.entities.order.v1.0~",
        "customer": "gts.shop.sales.entities.customer.v1~",
        "total": 0
    }));
    assert!(order.ok, "{}", order.error);

    let result = ops.cast_instance(
        "gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_free.v1",
        "gts.shop.sales.entities.order.v1.2~",
    );
    // total 0 violates v1.2's minimum of 1.
    assert!(!result.ok);
    assert!(result.error.contains("/total"), "{}", result.error);
}

#[test]
fn instance_validation_enforces_customer_reference() {
    let mut ops = seeded();
    register_order_instance(&mut ops);

    let verdict = ops
        .validate_instance("gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_1.v1");
    assert!(verdict.valid, "{}", verdict.error);

    // An order pointing at an unregistered customer fails the xref pass.
    ops.register(&json!({
        "id": "gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_2.v1",
        "kind": "gts.shop.sales.entities.order.v1.0~",
        "customer": "gts.shop.sales.entities.customer.v1~shop.sales.entities.ghost.v1",
        "total": 3
    }));
    let verdict = ops
        .validate_instance("gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_2.v1");
    assert!(!verdict.valid);
    assert!(verdict.error.contains("not in the registry"), "{}", verdict.error);
}

#[test]
fn relationship_graph_spans_order_and_customer() {
    let mut ops = seeded();
    register_order_instance(&mut ops);

    let graph =
        ops.resolve_graph("gts.shop.sales.entities.order.v1.0~shop.sales.entities.o_1.v1");
    assert!(graph.ok);
    let root = graph.root.unwrap();

    // The order references its kind discriminator and the customer instance.
    let child_ids: Vec<&str> = root.children.iter().map(|c| c.id.as_str()).collect();
    assert!(child_ids.contains(&"gts.shop.sales.entities.order.v1.0~"));
    assert!(child_ids
        .contains(&"gts.shop.sales.entities.customer.v1~shop.sales.entities.c_1.v1"));

    // The customer instance exists but embeds no further references.
    let customer_node = root
        .children
        .iter()
        .find(|c| c.id.ends_with("c_1.v1"))
        .unwrap();
    assert!(customer_node.exists);
    assert!(customer_node.children.is_empty());

    // The order type's x-gts-ref descends into the customer type.
    let type_node = root
        .children
        .iter()
        .find(|c| c.id == "gts.shop.sales.entities.order.v1.0~")
        .unwrap();
    assert!(type_node
        .children
        .iter()
        .any(|c| c.id == "gts.shop.sales.entities.customer.v1~"));
}

#[test]
fn list_partitions_the_version_family() {
    let mut ops = seeded();
    register_order_instance(&mut ops);

    let schemas = ops.list(&ListQuery::new().with_is_schema(true));
    assert_eq!(schemas.entities.len(), 4);

    let orders = ops.list(&ListQuery::new().with_pattern("gts.shop.sales.entities.order.*"));
    assert_eq!(orders.entities.len(), 4); // three schemas + one instance

    let instances = ops.list(&ListQuery::new().with_is_schema(false));
    assert_eq!(instances.entities.len(), 2);
}

#[test]
fn validate_all_covers_schemas_and_instances() {
    let mut ops = seeded();
    register_order_instance(&mut ops);

    let outcome = ops.validate_all();
    assert!(outcome.ok, "{}", outcome.error);
    assert_eq!(outcome.results.len(), 6);
    assert!(outcome.results.iter().all(|r| r.valid));
}

#[test]
fn query_orders_by_minor_wildcard() {
    let ops = seeded();
    let result = ops.query("gts.shop.sales.entities.order.v1.*", None);
    assert!(result.ok, "{}", result.error);
    assert_eq!(result.ids.len(), 3);
}
