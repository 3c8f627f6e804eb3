use queryflow::{
    CompileError, Error, ExecutionError, MemoryConnector, QueryFlow, ResolutionError, SourceKind,
    Table, Value,
};
use std::sync::Arc;

fn orders() -> Table {
    let row = |id: i64, customer: &str, product: &str, quantity: Option<i64>, price: f64| {
        vec![
            Value::Integer(id),
            Value::from(customer),
            Value::from(product),
            quantity.map_or(Value::Null, Value::Integer),
            Value::Float(price),
        ]
    };
    Table::from_rows(
        ["order_id", "customer", "product", "quantity", "price"],
        vec![
            row(1, "alice", "widget", Some(2), 9.5),
            row(2, "bob", "gadget", Some(1), 25.0),
            row(3, "alice", "gadget", Some(3), 25.0),
            row(4, "carol", "widget", Some(5), 9.5),
            row(5, "bob", "widget", None, 9.5),
        ],
    )
    .unwrap()
}

fn flow() -> QueryFlow {
    let memory = Arc::new(MemoryConnector::new().with_table("orders.csv", orders()).unwrap());
    QueryFlow::new().with_connector(SourceKind::Csv, memory)
}

fn column(table: &Table, name: &str) -> Vec<Value> {
    let index = table.column_index(name).unwrap();
    table.column_values(index).cloned().collect()
}

fn single(table: &Table) -> &[Value] {
    assert_eq!(table.num_rows(), 1);
    &table.rows()[0]
}

#[test]
fn test_whole_table_aggregates() {
    let result = flow()
        .run(
            "SELECT COUNT(*), sum(quantity), mean(quantity), median(price), \
             nunique(customer), min(customer), max(price) FROM {csv:orders.csv} ;",
        )
        .unwrap();
    assert_eq!(
        result.columns(),
        &[
            "count_rows",
            "sum_quantity",
            "mean_quantity",
            "median_price",
            "nunique_customer",
            "min_customer",
            "max_price",
        ]
        .map(String::from)
    );
    assert_eq!(
        single(&result),
        &[
            Value::Integer(5),
            Value::Integer(11),
            Value::Float(2.75),
            Value::Float(9.5),
            Value::Integer(3),
            Value::from("alice"),
            Value::Float(25.0),
        ]
    );
}

#[test]
fn test_count_includes_nulls() {
    let result = flow()
        .run("SELECT count(quantity), size(*) FROM {csv:orders.csv} ;")
        .unwrap();
    assert_eq!(single(&result), &[Value::Integer(5), Value::Integer(5)]);
}

#[test]
fn test_first_and_last_skip_nulls() {
    let result = flow()
        .run("SELECT first(customer), last(quantity) FROM {csv:orders.csv} ;")
        .unwrap();
    assert_eq!(single(&result), &[Value::from("alice"), Value::Integer(5)]);
}

#[test]
fn test_aggregate_alias() {
    let result = flow()
        .run("SELECT sum(quantity) AS units FROM {csv:orders.csv} WHERE product == \"widget\" ;")
        .unwrap();
    assert_eq!(result.columns(), &["units".to_string()]);
    assert_eq!(single(&result), &[Value::Integer(7)]);
}

#[test]
fn test_group_by_single_key() {
    let result = flow()
        .run("SELECT customer, sum(quantity), COUNT(*) FROM {csv:orders.csv} GROUP BY customer ;")
        .unwrap();
    assert_eq!(
        result.columns(),
        &["customer", "sum_quantity", "count_rows"].map(String::from)
    );
    assert_eq!(
        column(&result, "customer"),
        vec![Value::from("alice"), Value::from("bob"), Value::from("carol")]
    );
    assert_eq!(
        column(&result, "sum_quantity"),
        vec![Value::Integer(5), Value::Integer(1), Value::Integer(5)]
    );
    assert_eq!(
        column(&result, "count_rows"),
        vec![Value::Integer(2), Value::Integer(2), Value::Integer(1)]
    );
}

#[test]
fn test_group_by_multiple_keys() {
    let result = flow()
        .run(
            "SELECT product, customer, max(price) FROM {csv:orders.csv} \
             GROUP BY product, customer ;",
        )
        .unwrap();
    assert_eq!(result.num_rows(), 5);
    assert_eq!(
        result.rows()[0],
        vec![Value::from("gadget"), Value::from("alice"), Value::Float(25.0)]
    );
    assert_eq!(
        result.rows()[4],
        vec![Value::from("widget"), Value::from("carol"), Value::Float(9.5)]
    );
}

#[test]
fn test_group_by_order_by_aggregate() {
    let result = flow()
        .run(
            "SELECT customer, sum(quantity) AS units FROM {csv:orders.csv} \
             GROUP BY customer ORDER BY sum(quantity) DESC, customer DESC ;",
        )
        .unwrap();
    assert_eq!(result.columns(), &["customer", "units"].map(String::from));
    assert_eq!(
        column(&result, "customer"),
        vec![Value::from("carol"), Value::from("alice"), Value::from("bob")]
    );
}

#[test]
fn test_group_by_with_where_and_limit() {
    let result = flow()
        .run(
            "SELECT product, mean(price) FROM {csv:orders.csv} WHERE quantity >= 2 \
             GROUP BY product ORDER BY product DESC LIMIT 1 ;",
        )
        .unwrap();
    assert_eq!(
        result.rows(),
        &[vec![Value::from("widget"), Value::Float(9.5)]]
    );
}

#[test]
fn test_group_by_errors() {
    let err = flow()
        .run("SELECT product, sum(quantity) FROM {csv:orders.csv} GROUP BY customer ;")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::Resolution(ResolutionError::NotInGroupBy(_)))
    ));

    let err = flow()
        .run("SELECT customer, quantity FROM {csv:orders.csv} ORDER BY sum(quantity) ;")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::Resolution(
            ResolutionError::OrderByAggregateWithoutGroupBy
        ))
    ));

    let err = flow()
        .run("SELECT customer, sum(quantity) FROM {csv:orders.csv} ;")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::Resolution(ResolutionError::MixedAggregation))
    ));
}

#[test]
fn test_invalid_aggregate_input() {
    let err = flow()
        .run("SELECT mean(customer) FROM {csv:orders.csv} ;")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::Resolution(ResolutionError::InvalidAggregate { .. }))
    ));
}

#[test]
fn test_wildcard_only_for_count_and_size() {
    let err = flow().run("SELECT sum(*) FROM {csv:orders.csv} ;").unwrap_err();
    assert!(matches!(err, Error::Compile(CompileError::Parse(_))));
}
