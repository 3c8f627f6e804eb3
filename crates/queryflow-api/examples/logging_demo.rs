use queryflow::logging::LogConfig;
use queryflow::{MemoryConnector, QueryFlow, SourceKind, Table, Value};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Debug level shows every pipeline stage; RUST_LOG overrides it
    let _guard = LogConfig::debug().init()?;

    println!("=== QueryFlow Logging Demo ===\n");

    let readings = Table::from_rows(
        ["sensor", "value"],
        vec![
            vec!["a".into(), Value::Float(0.5)],
            vec!["b".into(), Value::Float(1.5)],
            vec!["a".into(), Value::Float(2.5)],
        ],
    )?;
    let memory = Arc::new(MemoryConnector::new().with_table("readings.csv", readings)?);
    let flow = QueryFlow::new().with_connector(SourceKind::Csv, memory);

    println!("\n1. Grouped query...");
    flow.run(
        "SELECT sensor, mean(value) FROM {csv:readings.csv} WHERE value > 0 \
         GROUP BY sensor ORDER BY sensor DESC ;",
    )?;

    println!("\n2. Insert...");
    flow.run("INSERT INTO {csv:copy.csv} VALUES (\"c\", 3.5) ;")?;

    println!("\n3. Update (parsed, not executed)...");
    flow.run("UPDATE {csv:readings.csv} SET value == 0 ;")?;

    println!("\n=== Demo Complete ===");
    println!("Check the logs above to see tracing output!");

    Ok(())
}
