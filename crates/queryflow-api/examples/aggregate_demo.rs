/// Example demonstrating aggregate functions and GROUP BY queries in QueryFlow
use queryflow::{MemoryConnector, QueryFlow, SourceKind, Table, Value};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("QueryFlow Aggregate Functions Demo");
    println!("==================================\n");

    let sales = Table::from_rows(
        ["sale_id", "category", "amount"],
        vec![
            create_sale(1, "Electronics", 1000),
            create_sale(2, "Electronics", 1500),
            create_sale(3, "Books", 200),
            create_sale(4, "Books", 300),
            create_sale(5, "Clothing", 400),
        ],
    )?;
    let memory = Arc::new(MemoryConnector::new().with_table("sales.json", sales)?);
    let flow = QueryFlow::new().with_connector(SourceKind::Json, memory);

    let examples = [
        (
            "Total number of sales",
            "SELECT COUNT(*) AS total_sales FROM {json:sales.json} ;",
        ),
        (
            "Revenue statistics",
            "SELECT sum(amount), mean(amount), median(amount), std(amount) FROM {json:sales.json} ;",
        ),
        (
            "Revenue per category",
            "SELECT category, sum(amount) AS revenue, COUNT(*) AS sales \
             FROM {json:sales.json} GROUP BY category ;",
        ),
        (
            "Categories by best single sale",
            "SELECT category FROM {json:sales.json} GROUP BY category ORDER BY max(amount) DESC ;",
        ),
        (
            "Large sales per category",
            "SELECT category, nunique(sale_id) FROM {json:sales.json} WHERE amount >= 400 \
             GROUP BY category ;",
        ),
    ];

    for (i, (title, query)) in examples.iter().enumerate() {
        println!("{}. {}:", i + 1, title);
        println!("   {}\n", query);
        println!("{}\n", flow.run(query)?);
    }

    Ok(())
}

fn create_sale(id: i64, category: &str, amount: i64) -> Vec<Value> {
    vec![Value::Integer(id), Value::from(category), Value::Integer(amount)]
}
