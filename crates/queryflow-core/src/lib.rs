//! # QueryFlow Core
//!
//! Compiler and execution engine for the QueryFlow query language.
//!
//! Query text is compiled into a [`Statement`] (the executable plan), which an
//! [`Executor`] runs against tables supplied by an [`Extractor`]. Results can
//! be handed to a [`Loader`].
//!
//! ```
//! use queryflow_core::{compile, Executor, MemoryConnector, Table, Value};
//!
//! let people = Table::from_rows(
//!     ["name", "age"],
//!     vec![
//!         vec![Value::from("A"), Value::Integer(25)],
//!         vec![Value::from("B"), Value::Integer(40)],
//!     ],
//! )
//! .unwrap();
//! let memory = MemoryConnector::new().with_table("people.csv", people).unwrap();
//!
//! let plan = compile("SELECT name FROM {csv:people.csv} WHERE age > 30 ;").unwrap();
//! let result = Executor::new(&memory, &memory).execute(&plan).unwrap();
//! assert_eq!(result.rows(), &[vec![Value::from("B")]]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

#[allow(missing_docs)]
pub mod connector;
pub mod error;
pub mod query;
#[allow(missing_docs)]
pub mod table;

pub use connector::{ConnectorRegistry, Extractor, Loader, MemoryConnector, SourceKind};
pub use error::{CompileError, ConnectorError, Error, ExecutionError, ResolutionError, Result};
pub use query::{compile, transform_select, DataSource, Executor, Statement};
pub use table::{Row, Table, Value};

/// A compiled statement, ready to execute
pub type ExecutablePlan = Statement;
