//! Error types for QueryFlow.
//!
//! Compilation and execution fail independently: a plan that compiled can
//! still fail once the real table schema is known.

use crate::query::ast::AggregateFunction;
use crate::query::lexer::LexError;
use crate::query::parser::ParseError;
use std::fmt;

/// Errors raised while turning query text into a plan
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Illegal character in the query text
    Lex(LexError),
    /// Token sequence not accepted by the grammar
    Parse(ParseError),
}

impl CompileError {
    /// Line of the offending character or token
    pub fn line(&self) -> usize {
        match self {
            CompileError::Lex(e) => e.line,
            CompileError::Parse(e) => e.line(),
        }
    }

    /// Column of the offending character or token
    pub fn column(&self) -> usize {
        match self {
            CompileError::Lex(e) => e.column,
            CompileError::Parse(e) => e.column(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "Scanning error: {}", e),
            CompileError::Parse(e) => write!(f, "Syntax error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Lex(e) => Some(e),
            CompileError::Parse(e) => Some(e),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

/// Errors raised when a plan does not fit the table it runs against
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// No column with this name
    UnknownColumn(String),
    /// Positional reference past the last column
    ColumnIndexOutOfRange { index: usize, columns: usize },
    /// A literal sits where a column is required
    LiteralAsColumn(String),
    /// Aggregations mixed with plain columns without GROUP BY
    MixedAggregation,
    /// Plain column that is not a GROUP BY key
    NotInGroupBy(String),
    /// The same sort key appears twice in ORDER BY
    DuplicateOrderKey(String),
    /// ORDER BY on an aggregation without GROUP BY
    OrderByAggregateWithoutGroupBy,
    /// SELECT * combined with GROUP BY
    WildcardWithGroupBy,
    /// Two output columns share a name
    DuplicateColumn(String),
    /// LIKE pattern is not a valid regular expression
    InvalidPattern { pattern: String, reason: String },
    /// Aggregation applied to values it cannot combine
    InvalidAggregate {
        function: AggregateFunction,
        column: String,
        reason: String,
    },
    /// A row does not have one value per column
    RowWidthMismatch { expected: usize, found: usize },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::UnknownColumn(name) => write!(f, "Unknown column '{}'", name),
            ResolutionError::ColumnIndexOutOfRange { index, columns } => write!(
                f,
                "Column index [{}] out of range (table has {} columns)",
                index, columns
            ),
            ResolutionError::LiteralAsColumn(lit) => {
                write!(f, "Expected a column but found literal {}", lit)
            }
            ResolutionError::MixedAggregation => write!(
                f,
                "There are aggregation columns in SELECT, you should use GROUP BY"
            ),
            ResolutionError::NotInGroupBy(name) => {
                write!(f, "Column '{}' is not in GROUP BY", name)
            }
            ResolutionError::DuplicateOrderKey(name) => {
                write!(f, "Duplicate column '{}' in ORDER BY", name)
            }
            ResolutionError::OrderByAggregateWithoutGroupBy => write!(
                f,
                "There are aggregation columns in ORDER BY, you should use GROUP BY"
            ),
            ResolutionError::WildcardWithGroupBy => {
                write!(f, "SELECT * cannot be combined with GROUP BY")
            }
            ResolutionError::DuplicateColumn(name) => {
                write!(f, "Duplicate output column '{}'", name)
            }
            ResolutionError::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid LIKE pattern \"{}\": {}", pattern, reason)
            }
            ResolutionError::InvalidAggregate {
                function,
                column,
                reason,
            } => write!(f, "Cannot apply {} to column '{}': {}", function, column, reason),
            ResolutionError::RowWidthMismatch { expected, found } => write!(
                f,
                "Row has {} values but the table has {} columns",
                found, expected
            ),
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Errors raised by extractors and loaders, surfaced unchanged
#[derive(Debug)]
pub enum ConnectorError {
    /// Tag does not name a known datasource type
    UnsupportedType(String),
    /// Known type with no connector registered for it
    Unregistered(String),
    /// Type cannot be written to
    NotWritable(String),
    /// Source or destination does not exist
    NotFound(String),
    /// A lock was poisoned (internal error)
    LockPoisoned,
    /// Failure reported by the connector implementation
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ConnectorError {
    /// Wrap an arbitrary connector failure
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        ConnectorError::Other(err.into())
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorError::UnsupportedType(tag) => {
                write!(f, "{} is not supported datasource type", tag)
            }
            ConnectorError::Unregistered(tag) => {
                write!(f, "No connector registered for datasource type {}", tag)
            }
            ConnectorError::NotWritable(tag) => {
                write!(f, "{} is not supported data destination type", tag)
            }
            ConnectorError::NotFound(path) => write!(f, "Datasource not found: {}", path),
            ConnectorError::LockPoisoned => write!(f, "Lock poisoned"),
            ConnectorError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConnectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectorError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(err: std::io::Error) -> Self {
        ConnectorError::Other(Box::new(err))
    }
}

/// Errors raised while running a compiled plan
#[derive(Debug)]
pub enum ExecutionError {
    /// Plan does not fit the table it runs against
    Resolution(ResolutionError),
    /// Extractor or loader failure
    Connector(ConnectorError),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Resolution(e) => write!(f, "Resolution error: {}", e),
            ExecutionError::Connector(e) => write!(f, "Connector error: {}", e),
        }
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutionError::Resolution(e) => Some(e),
            ExecutionError::Connector(e) => Some(e),
        }
    }
}

impl From<ResolutionError> for ExecutionError {
    fn from(err: ResolutionError) -> Self {
        ExecutionError::Resolution(err)
    }
}

impl From<ConnectorError> for ExecutionError {
    fn from(err: ConnectorError) -> Self {
        ExecutionError::Connector(err)
    }
}

/// The main error type for QueryFlow operations.
#[derive(Debug)]
pub enum Error {
    /// Query text did not compile
    Compile(CompileError),
    /// Compiled plan failed at run time
    Execution(ExecutionError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Compile(e) => write!(f, "{}", e),
            Error::Execution(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Compile(e) => Some(e),
            Error::Execution(e) => Some(e),
        }
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Error::Compile(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Error::Execution(err)
    }
}

impl From<ResolutionError> for Error {
    fn from(err: ResolutionError) -> Self {
        Error::Execution(ExecutionError::Resolution(err))
    }
}

impl From<ConnectorError> for Error {
    fn from(err: ConnectorError) -> Self {
        Error::Execution(ExecutionError::Connector(err))
    }
}

/// A specialized `Result` type for QueryFlow operations.
pub type Result<T> = std::result::Result<T, Error>;
