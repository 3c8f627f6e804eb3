//! # QueryFlow
//!
//! Compile a small SQL-like language into table transformations and run them
//! against pluggable datasource connectors.
//!
//! ## Quick Start
//!
//! ```rust
//! use queryflow::{MemoryConnector, QueryFlow, SourceKind, Table, Value};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let people = Table::from_rows(
//!         ["name", "age"],
//!         vec![
//!             vec![Value::from("A"), Value::Integer(25)],
//!             vec![Value::from("B"), Value::Integer(40)],
//!             vec![Value::from("C"), Value::Integer(35)],
//!         ],
//!     )?;
//!     let memory = Arc::new(MemoryConnector::new().with_table("people.csv", people)?);
//!     let flow = QueryFlow::new().with_connector(SourceKind::Csv, memory);
//!
//!     let result = flow.run(
//!         "SELECT name, age FROM {csv:people.csv} WHERE age > 30 ORDER BY age DESC LIMIT 2 ;",
//!     )?;
//!     assert_eq!(result.num_rows(), 2);
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```
//!
//! ## Connectors
//!
//! Statements name their tables with `{type:path}` descriptors. The engine
//! hands those to whatever [`Extractor`] or [`Loader`] is registered for the
//! type; [`MemoryConnector`] is bundled for embedding and tests.
//!
//! ## Statements
//!
//! - `SELECT [DISTINCT] items FROM source [INNER JOIN source ON cond] [INTO dest]
//!   [WHERE cond] [GROUP BY cols] [ORDER BY params] [LIMIT n | TAIL n] ;`
//! - `INSERT INTO dest [(cols)] VALUES (...), ... ;`
//! - `UPDATE` and `DELETE` are recognised but do not execute.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use tracing::debug;

pub use queryflow_core::query::{
    AggregateFunction, Condition, LimitMode, SelectPlan, SortDirection,
};
pub use queryflow_core::{
    compile, transform_select, CompileError, ConnectorError, ConnectorRegistry, DataSource,
    Error, ExecutablePlan, ExecutionError, Executor, Extractor, Loader, MemoryConnector,
    ResolutionError, Result, Row, SourceKind, Statement, Table, Value,
};

/// Logging configuration
pub mod logging;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handle that compiles statements and runs them against registered connectors.
///
/// Cheap to clone and safe to share between threads; every call works on
/// its own tables.
///
/// # Examples
///
/// ```rust
/// use queryflow::{MemoryConnector, QueryFlow, SourceKind};
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemoryConnector::new());
/// let flow = QueryFlow::new().with_connector(SourceKind::Csv, memory.clone());
///
/// let inserted = flow.run("INSERT INTO {csv:out.csv} VALUES (1, \"a\"), (2, \"b\") ;")?;
/// assert_eq!(inserted.num_rows(), 2);
/// assert!(memory.get("out.csv")?.is_some());
/// # Ok::<(), queryflow::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryFlow {
    registry: Arc<ConnectorRegistry>,
    insert_schema: Option<Arc<[String]>>,
}

impl QueryFlow {
    /// Creates a handle with no connectors registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle that dispatches through an existing registry.
    pub fn with_registry(registry: ConnectorRegistry) -> Self {
        QueryFlow {
            registry: Arc::new(registry),
            insert_schema: None,
        }
    }

    /// Registers `connector` as both extractor and loader for `kind`.
    pub fn with_connector<C>(mut self, kind: SourceKind, connector: Arc<C>) -> Self
    where
        C: Extractor + Loader + 'static,
    {
        Arc::make_mut(&mut self.registry).register(kind, connector);
        self
    }

    /// Registers a read-side connector for `kind`.
    pub fn with_extractor(mut self, kind: SourceKind, extractor: Arc<dyn Extractor>) -> Self {
        Arc::make_mut(&mut self.registry).register_extractor(kind, extractor);
        self
    }

    /// Registers a write-side connector for `kind`.
    pub fn with_loader(mut self, kind: SourceKind, loader: Arc<dyn Loader>) -> Self {
        Arc::make_mut(&mut self.registry).register_loader(kind, loader);
        self
    }

    /// Column names given to INSERT tuples that carry no explicit column list.
    ///
    /// Without a schema the columns are named by position (`"0"`, `"1"`, ...).
    pub fn with_insert_schema<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_schema = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// The registry statements are dispatched through
    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Compiles query text into an executable plan without running it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use queryflow::{QueryFlow, Statement};
    ///
    /// let flow = QueryFlow::new();
    /// let plan = flow.compile("SELECT * FROM {csv:people.csv} LIMIT 5 ;")?;
    /// assert!(matches!(plan, Statement::Select(_)));
    /// # Ok::<(), queryflow::Error>(())
    /// ```
    pub fn compile(&self, text: &str) -> Result<Statement> {
        Ok(compile(text)?)
    }

    /// Executes a compiled plan and returns its result table.
    pub fn execute(&self, statement: &Statement) -> Result<Table> {
        let registry: &ConnectorRegistry = &self.registry;
        let mut executor = Executor::new(registry, registry);
        if let Some(schema) = &self.insert_schema {
            executor = executor.with_insert_schema(schema);
        }
        Ok(executor.execute(statement)?)
    }

    /// Compiles and executes query text.
    pub fn run(&self, text: &str) -> Result<Table> {
        let statement = self.compile(text)?;
        debug!(statement = %statement, "running statement");
        self.execute(&statement)
    }
}
