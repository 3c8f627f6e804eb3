//! In-memory table model.
//!
//! A [`Table`] is an ordered list of uniquely named columns plus row-major
//! storage. Every stage of the execution pipeline consumes a table and
//! produces a new one; tables are never shared between statements.

use crate::error::ResolutionError;
use crate::query::ast::{ColumnRef, Literal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single scalar cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Null,
}

impl Value {
    /// Returns true for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare two values the way a predicate sees them.
    ///
    /// Integers and floats compare numerically, strings lexicographically.
    /// Nulls and mismatched types are incomparable and yield `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }

    /// Total ordering used for sorting and group enumeration.
    ///
    /// Numbers sort before strings; nulls are handled by the caller.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::String(_), Value::Integer(_) | Value::Float(_)) => Ordering::Greater,
            (Value::Integer(_) | Value::Float(_), Value::String(_)) => Ordering::Less,
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            _ => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Text form used for pattern matching.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

// Row identity (DISTINCT, grouping, join keys) needs hashing, so NaN equals
// NaN and 0.0 equals -0.0 here.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => {
                let bits = if *f == 0.0 {
                    0u64
                } else if f.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    f.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) if fl.is_finite() && fl.fract() == 0.0 => write!(f, "{:.1}", fl),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// A table row
pub type Row = Vec<Value>;

/// Ordered, uniquely named columns sharing one row count
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given column names.
    pub fn new<I, S>(columns: I) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ResolutionError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table and fill it with rows.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Row>) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// A table with no columns and no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a row; its width must match the column count.
    pub fn push_row(&mut self, row: Row) -> Result<(), ResolutionError> {
        if row.len() != self.columns.len() {
            return Err(ResolutionError::RowWidthMismatch {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve a column reference against the current column order.
    pub fn resolve(&self, column: &ColumnRef) -> Result<usize, ResolutionError> {
        match column {
            ColumnRef::Name(name) => self
                .column_index(name)
                .ok_or_else(|| ResolutionError::UnknownColumn(name.clone())),
            ColumnRef::Index(index) if *index < self.columns.len() => Ok(*index),
            ColumnRef::Index(index) => Err(ResolutionError::ColumnIndexOutOfRange {
                index: *index,
                columns: self.columns.len(),
            }),
        }
    }

    /// Resolve a column reference to the column's name.
    pub fn resolve_name(&self, column: &ColumnRef) -> Result<String, ResolutionError> {
        self.resolve(column).map(|idx| self.columns[idx].clone())
    }

    /// Iterate over the values of one column
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Value at (row, column)
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Keep the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Project onto `indices`, naming the output columns `names`.
    pub fn project(&self, indices: &[usize], names: Vec<String>) -> Result<Table, ResolutionError> {
        let mut table = Table::new(names)?;
        table.rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(table)
    }

    /// Prefix every column name, e.g. `"l."` for a table aliased `l`.
    pub fn add_prefix(mut self, prefix: &str) -> Table {
        for name in &mut self.columns {
            name.insert_str(0, prefix);
        }
        self
    }

    /// Keep the first `count` rows
    pub fn head(mut self, count: usize) -> Table {
        self.rows.truncate(count);
        self
    }

    /// Keep the last `count` rows
    pub fn tail(mut self, count: usize) -> Table {
        let skip = self.rows.len().saturating_sub(count);
        self.rows.drain(..skip);
        self
    }

    /// Same columns, no rows
    pub fn cleared(mut self) -> Table {
        self.rows.clear();
        self
    }

    /// Remove duplicate rows, keeping the first occurrence.
    pub fn distinct(mut self) -> Table {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|row| seen.insert(row.clone()));
        self
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join(" | "))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}
