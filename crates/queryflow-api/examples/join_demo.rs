/// Joining two datasources
///
/// Customers come from a CSV connector and orders from a JSON connector; the
/// join runs entirely in the engine.
use queryflow::{MemoryConnector, QueryFlow, SourceKind, Table, Value};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== QueryFlow Join Demo ===\n");

    let customers = Table::from_rows(
        ["id", "name", "country"],
        vec![
            vec![Value::Integer(1), "Alice".into(), "US".into()],
            vec![Value::Integer(2), "Bob".into(), "UK".into()],
            vec![Value::Integer(3), "Chen".into(), "US".into()],
        ],
    )?;
    let orders = Table::from_rows(
        ["order_id", "customer_id", "amount"],
        vec![
            vec![Value::Integer(100), Value::Integer(2), Value::Float(12.5)],
            vec![Value::Integer(101), Value::Integer(1), Value::Float(40.0)],
            vec![Value::Integer(102), Value::Integer(2), Value::Float(7.5)],
            vec![Value::Integer(103), Value::Integer(3), Value::Float(18.0)],
        ],
    )?;

    let flow = QueryFlow::new()
        .with_connector(
            SourceKind::Csv,
            Arc::new(MemoryConnector::new().with_table("customers.csv", customers)?),
        )
        .with_connector(
            SourceKind::Json,
            Arc::new(MemoryConnector::new().with_table("orders.json", orders)?),
        );

    println!("1. Every order with its customer\n");
    let result = flow.run(
        "SELECT c.name, o.order_id, o.amount FROM {csv:customers.csv} AS c \
         INNER JOIN {json:orders.json} AS o ON c.id == o.customer_id ;",
    )?;
    println!("{}\n", result);

    println!("2. Revenue per country\n");
    let result = flow.run(
        "SELECT c.country, sum(o.amount) AS revenue FROM {csv:customers.csv} AS c \
         INNER JOIN {json:orders.json} AS o ON c.id == o.customer_id \
         GROUP BY c.country ORDER BY sum(o.amount) DESC ;",
    )?;
    println!("{}\n", result);

    println!("3. Small orders only\n");
    let result = flow.run(
        "SELECT c.name, o.amount FROM {csv:customers.csv} AS c \
         INNER JOIN {json:orders.json} AS o ON c.id == o.customer_id AND o.amount < 15 ;",
    )?;
    println!("{}", result);

    Ok(())
}
