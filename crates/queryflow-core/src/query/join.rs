//! Inner join of two extracted tables.
//!
//! Equality leaves reachable through `AND` become hash-join keys; without
//! any, the join degrades to a cross product. The full condition is then
//! applied to the joined rows.

use super::ast::{ColumnRef, ComparisonOp, Condition, Operand};
use super::condition;
use crate::error::ResolutionError;
use crate::table::{Row, Table, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A pair of (left column, right column) positions compared with `==`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KeyPair {
    left: usize,
    right: usize,
}

/// Inner-join `left` and `right` on `condition`.
///
/// Aliased sides have their columns prefixed with `"{alias}."` first.
pub fn inner_join(
    left: Table,
    right: Table,
    condition: &Condition,
    left_alias: Option<&str>,
    right_alias: Option<&str>,
) -> Result<Table, ResolutionError> {
    let left = prefixed(left, left_alias);
    let right = prefixed(right, right_alias);

    let keys = key_pairs(&left, &right, condition);
    let matches = if keys.is_empty() {
        warn!(
            left_rows = left.num_rows(),
            right_rows = right.num_rows(),
            "join condition has no equality keys, falling back to a cross join"
        );
        cross_matches(&left, &right)
    } else {
        hash_matches(&left, &right, &keys)
    };
    debug!(keys = keys.len(), candidates = matches.len(), "join matched rows");

    let joined = combine(&left, &right, &keys, &matches)?;
    condition::filter(&joined, condition)
}

fn prefixed(table: Table, alias: Option<&str>) -> Table {
    match alias {
        Some(alias) => table.add_prefix(&format!("{}.", alias)),
        None => table,
    }
}

/// Equality leaves under top-level `AND`s that name one column on each side.
fn key_pairs(left: &Table, right: &Table, condition: &Condition) -> Vec<KeyPair> {
    let mut pairs = Vec::new();
    collect_keys(left, right, condition, &mut pairs);
    let mut seen = HashSet::new();
    pairs.retain(|pair| seen.insert(*pair));
    pairs
}

fn collect_keys(left: &Table, right: &Table, condition: &Condition, pairs: &mut Vec<KeyPair>) {
    match condition {
        Condition::And(a, b) => {
            collect_keys(left, right, a, pairs);
            collect_keys(left, right, b, pairs);
        }
        Condition::Compare {
            left: Operand::Column(ColumnRef::Name(a)),
            op: ComparisonOp::Eq,
            right: Operand::Column(ColumnRef::Name(b)),
        } => {
            let pair = match (
                left.column_index(a),
                right.column_index(b),
                left.column_index(b),
                right.column_index(a),
            ) {
                (Some(l), Some(r), _, _) | (_, _, Some(l), Some(r)) => KeyPair { left: l, right: r },
                _ => return,
            };
            pairs.push(pair);
        }
        _ => {}
    }
}

fn cross_matches(left: &Table, right: &Table) -> Vec<(usize, usize)> {
    (0..left.num_rows())
        .flat_map(|l| (0..right.num_rows()).map(move |r| (l, r)))
        .collect()
}

/// Hash form of a key cell: numbers collapse to floats so `1` meets `1.0`
/// the way `==` sees them. Any extra candidates this admits are removed by
/// the post-filter.
fn key_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Integer(_) | Value::Float(_) => value.as_f64().map(Value::Float),
        Value::String(_) => Some(value.clone()),
    }
}

/// Matching (left, right) row pairs in left order; null keys never match.
fn hash_matches(left: &Table, right: &Table, keys: &[KeyPair]) -> Vec<(usize, usize)> {
    let key_of = |row: &Row, side: fn(&KeyPair) -> usize| -> Option<Vec<Value>> {
        keys.iter().map(|k| key_value(&row[side(k)])).collect()
    };

    let mut index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let Some(key) = key_of(row, |k| k.right) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut matches = Vec::new();
    for (l, row) in left.rows().iter().enumerate() {
        let Some(key) = key_of(row, |k| k.left) else {
            continue;
        };
        if let Some(rights) = index.get(&key) {
            matches.extend(rights.iter().map(|&r| (l, r)));
        }
    }
    matches
}

/// Build the joined table.
///
/// A key pair whose columns share a name is emitted once; any other name
/// present on both sides gets `_x` (left) and `_y` (right) suffixes.
fn combine(
    left: &Table,
    right: &Table,
    keys: &[KeyPair],
    matches: &[(usize, usize)],
) -> Result<Table, ResolutionError> {
    let coalesced: HashSet<usize> = keys
        .iter()
        .filter(|k| left.columns()[k.left] == right.columns()[k.right])
        .map(|k| k.right)
        .collect();
    let right_kept: Vec<usize> = (0..right.num_columns())
        .filter(|i| !coalesced.contains(i))
        .collect();

    let left_names: HashSet<&str> = left.columns().iter().map(String::as_str).collect();
    let right_names: HashSet<&str> = right_kept
        .iter()
        .map(|&i| right.columns()[i].as_str())
        .collect();

    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .map(|name| suffixed(name, right_names.contains(name.as_str()), "_x"))
        .collect();
    columns.extend(right_kept.iter().map(|&i| {
        let name = &right.columns()[i];
        suffixed(name, left_names.contains(name.as_str()), "_y")
    }));

    let rows = matches
        .iter()
        .map(|&(l, r)| {
            let mut row = left.rows()[l].clone();
            row.extend(right_kept.iter().map(|&i| right.rows()[r][i].clone()));
            row
        })
        .collect();
    Table::from_rows(columns, rows)
}

fn suffixed(name: &str, clashes: bool, suffix: &str) -> String {
    if clashes {
        format!("{}{}", name, suffix)
    } else {
        name.to_string()
    }
}
