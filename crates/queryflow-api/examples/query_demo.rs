/// Query Engine Demo
///
/// Filtering, ordering, projection and limits over an in-memory table.
use queryflow::{MemoryConnector, QueryFlow, SourceKind, Table, Value};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== QueryFlow Query Engine Demo ===\n");

    let users = Table::from_rows(
        ["id", "name", "age", "city"],
        vec![
            vec![Value::Integer(1), "Alice".into(), Value::Integer(30), "NYC".into()],
            vec![Value::Integer(2), "Bob".into(), Value::Integer(25), "LA".into()],
            vec![Value::Integer(3), "Charlie".into(), Value::Integer(35), "NYC".into()],
            vec![Value::Integer(4), "Diana".into(), Value::Null, "Boston".into()],
        ],
    )?;
    let memory = Arc::new(MemoryConnector::new().with_table("users.csv", users)?);
    let flow = QueryFlow::new().with_connector(SourceKind::Csv, memory.clone());

    let queries = [
        "SELECT * FROM {csv:users.csv} ;",
        "SELECT name, age FROM {csv:users.csv} WHERE age > 26 ORDER BY age DESC ;",
        "SELECT name FROM {csv:users.csv} WHERE city == \"NYC\" OR name LIKE \"B.*\" ;",
        "SELECT DISTINCT city FROM {csv:users.csv} ORDER BY city ;",
        "SELECT [1], [3] FROM {csv:users.csv} TAIL 2 ;",
    ];
    for (i, query) in queries.iter().enumerate() {
        println!("{}. {}\n", i + 1, query);
        println!("{}\n", flow.run(query)?);
    }

    println!("{}. Writing a result with INTO", queries.len() + 1);
    flow.run("SELECT name INTO {csv:adults.csv} FROM {csv:users.csv} WHERE age >= 30 ;")?;
    if let Some(adults) = memory.get("adults.csv")? {
        println!("{}\n", adults);
    }

    println!("{}. A statement that does not compile", queries.len() + 2);
    if let Err(e) = flow.run("SELECT name\nFROM {csv:users.csv} WHERE age 30 ;") {
        println!("   {}", e);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
