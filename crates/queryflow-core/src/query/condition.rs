//! Condition evaluation over tables.
//!
//! Conditions are evaluated as sets of row positions of the input table, so
//! `NOT` is a set difference and `AND`/`OR` combine the two sides' matches.

use super::ast::{ComparisonOp, Condition, Operand};
use crate::error::ResolutionError;
use crate::table::{Table, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Keep the rows of `table` that satisfy `condition`, in match order.
pub fn filter(table: &Table, condition: &Condition) -> Result<Table, ResolutionError> {
    let rows = matching_rows(table, condition)?;
    Ok(table.take_rows(&rows))
}

/// Positions of the rows matched by `condition`.
///
/// `OR` lists left matches first, then right-only matches.
pub fn matching_rows(table: &Table, condition: &Condition) -> Result<Vec<usize>, ResolutionError> {
    match condition {
        Condition::Not(operand) => {
            let matched: HashSet<usize> = matching_rows(table, operand)?.into_iter().collect();
            Ok((0..table.num_rows())
                .filter(|i| !matched.contains(i))
                .collect())
        }
        Condition::And(left, right) => {
            let left = matching_rows(table, left)?;
            let right: HashSet<usize> = matching_rows(table, right)?.into_iter().collect();
            Ok(left.into_iter().filter(|i| right.contains(i)).collect())
        }
        Condition::Or(left, right) => {
            let mut rows = matching_rows(table, left)?;
            let seen: HashSet<usize> = rows.iter().copied().collect();
            rows.extend(
                matching_rows(table, right)?
                    .into_iter()
                    .filter(|i| !seen.contains(i)),
            );
            Ok(rows)
        }
        Condition::Compare { left, op, right } => compare_rows(table, left, *op, right),
        Condition::Like { left, pattern } => like_rows(table, left, pattern),
    }
}

fn column_of(table: &Table, operand: &Operand) -> Result<usize, ResolutionError> {
    match operand {
        Operand::Column(column) => table.resolve(column),
        Operand::Literal(lit) => Err(ResolutionError::LiteralAsColumn(lit.to_string())),
    }
}

fn compare_rows(
    table: &Table,
    left: &Operand,
    op: ComparisonOp,
    right: &Operand,
) -> Result<Vec<usize>, ResolutionError> {
    let left = column_of(table, left)?;
    let right = match right {
        Operand::Column(column) => Rhs::Column(table.resolve(column)?),
        Operand::Literal(lit) => Rhs::Value(Value::from(lit)),
    };

    Ok(table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            let rhs = match &right {
                Rhs::Column(idx) => &row[*idx],
                Rhs::Value(v) => v,
            };
            satisfies(row[left].compare(rhs), op)
        })
        .map(|(i, _)| i)
        .collect())
}

enum Rhs {
    Column(usize),
    Value(Value),
}

/// Incomparable pairs only satisfy `!=`.
fn satisfies(ordering: Option<Ordering>, op: ComparisonOp) -> bool {
    match (ordering, op) {
        (Some(Ordering::Equal), ComparisonOp::Eq) => true,
        (_, ComparisonOp::Eq) => false,
        (Some(Ordering::Equal), ComparisonOp::Ne) => false,
        (_, ComparisonOp::Ne) => true,
        (None, _) => false,
        (Some(ord), ComparisonOp::Lt) => ord == Ordering::Less,
        (Some(ord), ComparisonOp::Le) => ord != Ordering::Greater,
        (Some(ord), ComparisonOp::Gt) => ord == Ordering::Greater,
        (Some(ord), ComparisonOp::Ge) => ord != Ordering::Less,
    }
}

fn like_rows(table: &Table, left: &Operand, pattern: &str) -> Result<Vec<usize>, ResolutionError> {
    let column = column_of(table, left)?;
    // Match from the start of the text, not necessarily to its end.
    let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
        ResolutionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(table
        .column_values(column)
        .enumerate()
        .filter(|(_, value)| !value.is_null() && regex.is_match(&value.to_text()))
        .map(|(i, _)| i)
        .collect())
}
