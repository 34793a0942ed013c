//! Integration tests for query construction and cache keys.

use pretty_assertions::assert_eq;
use tabula_core::catalog::{
    ColumnDescriptor, ReferenceDescriptor, Registry, SqlType, TableDescriptor,
};
use tabula_core::query::{
    ConditionNode, JoinKey, JoinType, Operator, ParameterExpr, QueryBuilder, QueryDescriptor,
};
use tabula_core::{CacheCodec, CodecConfig, Connective, Error};

fn setup_order_schema() -> Registry {
    let registry = Registry::new();

    let order = TableDescriptor::new("Order", "orders")
        .in_schema("sales")
        .cacheable(true)
        .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
        .with_column(ColumnDescriptor::new("customerId", "customer_id", SqlType::BigInt))
        .with_column(ColumnDescriptor::field("amount", SqlType::Decimal).with_precision(12, 2))
        .with_column(ColumnDescriptor::field("status", SqlType::Varchar).with_length(16))
        .with_reference(ReferenceDescriptor::new("customer", "Customer").on("customerId", "id"));

    let customer = TableDescriptor::new("Customer", "customers")
        .in_schema("sales")
        .cacheable(true)
        .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
        .with_column(ColumnDescriptor::field("name", SqlType::Varchar))
        .with_column(ColumnDescriptor::field("regionId", SqlType::BigInt));

    let region = TableDescriptor::new("Region", "regions")
        .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key())
        .with_column(ColumnDescriptor::field("code", SqlType::Char));

    registry.register(order).unwrap();
    registry.register(customer).unwrap();
    registry.register(region).unwrap();
    registry
}

fn open_orders_forward(registry: &Registry) -> QueryDescriptor {
    let mut builder = QueryBuilder::new(registry, "Order").unwrap();
    builder
        .join("Customer")
        .unwrap()
        .equal_to("Order", "status", "OPEN")
        .unwrap()
        .order_by_desc("Order", "amount")
        .unwrap();
    builder.seal().unwrap()
}

fn open_orders_reversed(registry: &Registry) -> QueryDescriptor {
    let mut builder = QueryBuilder::new(registry, "Order").unwrap();
    builder
        .order_by_desc("Order", "AMOUNT")
        .unwrap()
        .equal_to("Order", "Status", "OPEN")
        .unwrap()
        .join("Customer")
        .unwrap();
    builder.seal().unwrap()
}

#[test]
fn test_order_customer_query_shape() {
    let registry = setup_order_schema();
    let query = open_orders_forward(&registry);

    assert_eq!(query.root_table(), "orders");
    assert_eq!(query.root_schema(), Some("sales"));

    assert_eq!(query.joins().len(), 1);
    let edge = &query.joins()[0];
    assert_eq!(edge.source(), "Order");
    assert_eq!(edge.target(), "Customer");
    assert_eq!(edge.target_table(), "sales.customers");
    assert_eq!(edge.join_type(), JoinType::Inner);
    assert_eq!(edge.keys(), &[JoinKey::new("customerId", "id")]);

    assert_eq!(query.conditions().len(), 1);
    let ConditionNode::Leaf(leaf) = &query.conditions()[0] else {
        panic!("expected a leaf condition");
    };
    assert_eq!(leaf.operator(), Operator::Equal);
    assert_eq!(leaf.key(), "status");
    assert_eq!(leaf.operand(), Some(&ParameterExpr::constant("OPEN")));

    assert_eq!(query.order_by().len(), 1);
    assert_eq!(query.order_by()[0].column().field(), "amount");
    assert!(query.cacheable());
}

#[test]
fn test_reversed_call_order_yields_same_key() {
    let registry = setup_order_schema();
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();

    let forward = open_orders_forward(&registry);
    let reversed = open_orders_reversed(&registry);

    assert_eq!(codec.cache_key(&forward), codec.cache_key(&reversed));
    assert_eq!(codec.cache_key(&forward).as_str().len(), 64);
}

#[test]
fn test_projection_and_condition_order_do_not_change_key() {
    let registry = setup_order_schema();
    let codec = CacheCodec::new(CodecConfig::new().with_key_prefix("orders:")).unwrap();

    let mut a = QueryBuilder::new(&registry, "Order").unwrap();
    a.select("Order", "id")
        .unwrap()
        .select("Order", "amount")
        .unwrap()
        .greater("Order", "amount", 100i64)
        .unwrap()
        .not_null("Order", "customerId")
        .unwrap();

    let mut b = QueryBuilder::new(&registry, "Order").unwrap();
    b.not_null("Order", "customer_id")
        .unwrap()
        .greater("Order", "amount", 100i64)
        .unwrap()
        .select("Order", "amount")
        .unwrap()
        .select("Order", "ID")
        .unwrap();

    let (a, b) = (a.seal().unwrap(), b.seal().unwrap());
    let key = codec.cache_key(&a);
    assert_eq!(key, codec.cache_key(&b));
    assert!(key.as_str().starts_with("orders:"));
}

#[test]
fn test_result_shaping_changes_key() {
    let registry = setup_order_schema();
    let codec = CacheCodec::new(CodecConfig::default()).unwrap();
    let base = codec.cache_key(&open_orders_forward(&registry));

    let mut paged = QueryBuilder::new(&registry, "Order").unwrap();
    paged
        .join("Customer")
        .unwrap()
        .equal_to("Order", "status", "OPEN")
        .unwrap()
        .order_by_desc("Order", "amount")
        .unwrap()
        .page(2, 25)
        .unwrap();
    assert_ne!(base, codec.cache_key(&paged.seal().unwrap()));

    let mut other_value = QueryBuilder::new(&registry, "Order").unwrap();
    other_value
        .join("Customer")
        .unwrap()
        .equal_to("Order", "status", "PAID")
        .unwrap()
        .order_by_desc("Order", "amount")
        .unwrap();
    assert_ne!(base, codec.cache_key(&other_value.seal().unwrap()));

    let mut named = QueryBuilder::new(&registry, "Order").unwrap();
    named
        .name("open orders")
        .unwrap()
        .join("Customer")
        .unwrap()
        .equal_to("Order", "status", "OPEN")
        .unwrap()
        .order_by_desc("Order", "amount")
        .unwrap();
    assert_eq!(base, codec.cache_key(&named.seal().unwrap()));
}

#[test]
fn test_column_exists_invariant_to_case_and_form() {
    let registry = setup_order_schema();
    for key in ["customerId", "customerid", "CUSTOMERID", "customer_id", "CUSTOMER_ID"] {
        assert!(registry.column_exists("Order", key), "{key}");
    }
    assert!(!registry.column_exists("Order", "customer"));
}

#[test]
fn test_unregistered_entity_and_empty_group() {
    let registry = setup_order_schema();
    let mut builder = QueryBuilder::new(&registry, "Order").unwrap();

    assert!(matches!(
        builder.equal_to("Invoice", "id", 1i64),
        Err(Error::UnregisteredEntity(e)) if e == "Invoice"
    ));
    assert!(matches!(
        builder.conditions().group(0, Connective::And, vec![]),
        Err(Error::EmptyConditionGroup)
    ));
}

#[test]
fn test_join_to_unregistered_entity_is_unresolved() {
    let registry = Registry::new();
    registry
        .register(
            TableDescriptor::new("Order", "orders")
                .with_column(ColumnDescriptor::field("id", SqlType::BigInt).primary_key()),
        )
        .unwrap();

    let mut builder = QueryBuilder::new(&registry, "Order").unwrap();
    let err = builder.join("Invoice").unwrap_err();
    assert!(
        matches!(&err, Error::UnresolvedJoin { target, .. } if target == "Invoice"),
        "{err:?}"
    );
    assert!(builder.seal().unwrap().joins().is_empty());
}

#[test]
fn test_grouped_conditions_and_chained_join() {
    let registry = setup_order_schema();
    let mut builder = QueryBuilder::new(&registry, "Order").unwrap();
    let conditions = builder.conditions();

    let status = conditions
        .group(
            1,
            Connective::And,
            vec![
                conditions.equal_to("Order", "status", "OPEN").unwrap(),
                conditions
                    .leaf(
                        0,
                        Connective::Or,
                        Operator::Equal,
                        "Order",
                        "status",
                        Some("PAID".into()),
                    )
                    .unwrap(),
            ],
        )
        .unwrap();

    builder
        .join_table("Order", "Customer", JoinType::Left)
        .unwrap()
        .join_on("Customer", "Region", JoinType::Inner, &[JoinKey::new("regionId", "id")])
        .unwrap()
        .add_condition(status)
        .unwrap()
        .equal_to("Region", "code", "EU")
        .unwrap()
        .select("Order", "id")
        .unwrap()
        .select_as("Customer", "name", "customer_name")
        .unwrap();

    let query = builder.seal().unwrap();
    assert_eq!(query.entities(), vec!["Order", "Customer", "Region"]);
    assert_eq!(query.conditions()[0].leaf_count(), 2);
    assert_eq!(query.joins()[1].source(), "Customer");
    assert!(query.cacheable());
}

#[test]
fn test_sub_query_operand() {
    let registry = setup_order_schema();

    let mut vip = QueryBuilder::new(&registry, "Customer").unwrap();
    vip.select("Customer", "id")
        .unwrap()
        .like("Customer", "name", "VIP%")
        .unwrap();
    let vip = vip.seal().unwrap();

    let mut builder = QueryBuilder::new(&registry, "Order").unwrap();
    builder.in_sub_query("Order", "customerId", vip).unwrap();
    let query = builder.seal().unwrap();

    assert_eq!(query.depth(), 1);
    let ConditionNode::Leaf(leaf) = &query.conditions()[0] else {
        panic!("expected a leaf condition");
    };
    assert!(matches!(leaf.operand(), Some(ParameterExpr::SubQuery(_))));
}

#[test]
fn test_descriptor_serializes_for_execution() {
    let registry = setup_order_schema();
    let query = open_orders_forward(&registry);

    let json = serde_json::to_value(&query).unwrap();
    assert_eq!(json["root_table"], "orders");
    assert_eq!(json["joins"][0]["target"], "Customer");
    assert_eq!(json["cacheable"], true);
}
