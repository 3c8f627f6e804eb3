//! Aggregation kernels.
//!
//! Every kernel except `count` and `size` skips nulls. Numeric results
//! follow the usual dataframe conventions: sample statistics use one degree
//! of freedom, empty inputs yield null (or the identity for `sum`/`prod`).

use super::ast::AggregateFunction;
use crate::error::ResolutionError;
use crate::table::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Apply `function` to the values of `column`.
pub fn aggregate<'a, I>(
    function: AggregateFunction,
    column: &str,
    values: I,
) -> Result<Value, ResolutionError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let all: Vec<&Value> = values.into_iter().collect();
    let rows = all.len();
    let values: Vec<&Value> = all.into_iter().filter(|v| !v.is_null()).collect();
    let invalid = |reason: &str| ResolutionError::InvalidAggregate {
        function,
        column: column.to_string(),
        reason: reason.to_string(),
    };

    let result = match function {
        AggregateFunction::Count | AggregateFunction::Size => Value::Integer(rows as i64),
        AggregateFunction::Sum => sum(&values).ok_or_else(|| invalid("mixed strings and numbers"))?,
        AggregateFunction::Prod => {
            let numbers = numeric(&values).ok_or_else(|| invalid("non-numeric value"))?;
            product(&values, &numbers)
        }
        AggregateFunction::Mean => {
            let numbers = numeric(&values).ok_or_else(|| invalid("non-numeric value"))?;
            mean(&numbers).map_or(Value::Null, Value::Float)
        }
        AggregateFunction::Median | AggregateFunction::Quantile => {
            let numbers = numeric(&values).ok_or_else(|| invalid("non-numeric value"))?;
            median(numbers).map_or(Value::Null, Value::Float)
        }
        AggregateFunction::Var => {
            let numbers = numeric(&values).ok_or_else(|| invalid("non-numeric value"))?;
            variance(&numbers).map_or(Value::Null, Value::Float)
        }
        AggregateFunction::Std => {
            let numbers = numeric(&values).ok_or_else(|| invalid("non-numeric value"))?;
            variance(&numbers).map_or(Value::Null, |v| Value::Float(v.sqrt()))
        }
        AggregateFunction::Sem => {
            let numbers = numeric(&values).ok_or_else(|| invalid("non-numeric value"))?;
            let n = numbers.len() as f64;
            variance(&numbers).map_or(Value::Null, |v| Value::Float(v.sqrt() / n.sqrt()))
        }
        AggregateFunction::Min => extreme(&values, Ordering::Less)
            .ok_or_else(|| invalid("mixed strings and numbers"))?,
        AggregateFunction::Max => extreme(&values, Ordering::Greater)
            .ok_or_else(|| invalid("mixed strings and numbers"))?,
        AggregateFunction::NUnique => {
            let distinct: HashSet<&Value> = values.iter().copied().collect();
            Value::Integer(distinct.len() as i64)
        }
        AggregateFunction::First => values.first().map_or(Value::Null, |v| (*v).clone()),
        AggregateFunction::Last => values.last().map_or(Value::Null, |v| (*v).clone()),
    };
    Ok(result)
}

fn all_integers(values: &[&Value]) -> bool {
    values.iter().all(|v| matches!(v, Value::Integer(_)))
}

/// Numeric view of non-null values, `None` if any is a string
fn numeric(values: &[&Value]) -> Option<Vec<f64>> {
    values.iter().map(|v| v.as_f64()).collect()
}

/// `None` when strings and numbers are mixed
fn sum(values: &[&Value]) -> Option<Value> {
    if values.is_empty() {
        return Some(Value::Integer(0));
    }
    if values.iter().all(|v| matches!(v, Value::String(_))) {
        let mut text = String::new();
        for value in values {
            if let Value::String(s) = value {
                text.push_str(s);
            }
        }
        return Some(Value::String(text));
    }

    let numbers = numeric(values)?;
    if all_integers(values) {
        let total = values.iter().try_fold(0i64, |acc, v| match v {
            Value::Integer(i) => acc.checked_add(*i),
            _ => None,
        });
        if let Some(total) = total {
            return Some(Value::Integer(total));
        }
    }
    Some(Value::Float(numbers.iter().sum()))
}

fn product(values: &[&Value], numbers: &[f64]) -> Value {
    if all_integers(values) {
        let total = values.iter().try_fold(1i64, |acc, v| match v {
            Value::Integer(i) => acc.checked_mul(*i),
            _ => None,
        });
        if let Some(total) = total {
            return Value::Integer(total);
        }
    }
    Value::Float(numbers.iter().product())
}

fn mean(numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// Linear-interpolated 0.5 quantile
fn median(mut numbers: Vec<f64>) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_by(f64::total_cmp);
    let position = (numbers.len() - 1) as f64 * 0.5;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(numbers[lower] + (numbers[upper] - numbers[lower]) * fraction)
}

/// Sample variance (one degree of freedom), `None` below two values
fn variance(numbers: &[f64]) -> Option<f64> {
    if numbers.len() < 2 {
        return None;
    }
    let mean = mean(numbers)?;
    let squares: f64 = numbers.iter().map(|x| (x - mean).powi(2)).sum();
    Some(squares / (numbers.len() - 1) as f64)
}

/// Smallest (`Less`) or largest (`Greater`) value, keeping its type.
///
/// `None` when strings and numbers are mixed.
fn extreme(values: &[&Value], wanted: Ordering) -> Option<Value> {
    let numbers = values.iter().all(|v| v.as_f64().is_some());
    let strings = values.iter().all(|v| matches!(v, Value::String(_)));
    if !numbers && !strings {
        return None;
    }
    let mut best: Option<&Value> = None;
    for value in values {
        best = match best {
            Some(current) if value.sort_cmp(current) != wanted => Some(current),
            _ => Some(*value),
        };
    }
    Some(best.map_or(Value::Null, |v| v.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&i| Value::Integer(i)).collect()
    }

    fn run(function: AggregateFunction, values: &[Value]) -> Value {
        aggregate(function, "x", values).unwrap()
    }

    #[test]
    fn test_count_and_size_include_nulls() {
        let values = vec![Value::Integer(1), Value::Null, Value::Integer(3)];
        assert_eq!(run(AggregateFunction::Count, &values), Value::Integer(3));
        assert_eq!(run(AggregateFunction::Size, &values), Value::Integer(3));
        assert_eq!(run(AggregateFunction::NUnique, &values), Value::Integer(2));
    }

    #[test]
    fn test_sum_keeps_integers() {
        assert_eq!(run(AggregateFunction::Sum, &ints(&[1, 2, 3])), Value::Integer(6));
        assert_eq!(
            run(AggregateFunction::Sum, &[Value::Integer(1), Value::Float(0.5)]),
            Value::Float(1.5)
        );
        assert_eq!(run(AggregateFunction::Sum, &[]), Value::Integer(0));
        assert_eq!(
            run(AggregateFunction::Sum, &[Value::from("ab"), Value::from("cd")]),
            Value::from("abcd")
        );
    }

    #[test]
    fn test_sum_overflow_falls_back_to_float() {
        let result = run(AggregateFunction::Sum, &ints(&[i64::MAX, 1]));
        assert!(matches!(result, Value::Float(_)));
    }

    #[test]
    fn test_mixed_types_rejected() {
        let values = vec![Value::Integer(1), Value::from("a")];
        let err = aggregate(AggregateFunction::Sum, "x", &values).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::InvalidAggregate {
                function: AggregateFunction::Sum,
                ..
            }
        ));
        assert!(aggregate(AggregateFunction::Max, "x", &values).is_err());
        assert!(aggregate(AggregateFunction::Mean, "x", &[Value::from("a")]).is_err());
    }

    #[test]
    fn test_mean_median_quantile() {
        let values = ints(&[1, 2, 3, 10]);
        assert_eq!(run(AggregateFunction::Mean, &values), Value::Float(4.0));
        assert_eq!(run(AggregateFunction::Median, &values), Value::Float(2.5));
        assert_eq!(run(AggregateFunction::Quantile, &values), Value::Float(2.5));
        assert_eq!(run(AggregateFunction::Median, &[]), Value::Null);
    }

    #[test]
    fn test_sample_statistics() {
        let values = ints(&[2, 4, 4, 4, 5, 5, 7, 9]);
        let Value::Float(var) = run(AggregateFunction::Var, &values) else {
            panic!("expected float");
        };
        assert!((var - 32.0 / 7.0).abs() < 1e-12);
        let Value::Float(std) = run(AggregateFunction::Std, &values) else {
            panic!("expected float");
        };
        assert!((std - var.sqrt()).abs() < 1e-12);
        let Value::Float(sem) = run(AggregateFunction::Sem, &values) else {
            panic!("expected float");
        };
        assert!((sem - std / 8f64.sqrt()).abs() < 1e-12);
        assert_eq!(run(AggregateFunction::Std, &ints(&[1])), Value::Null);
    }

    #[test]
    fn test_min_max_preserve_type() {
        let values = vec![Value::Integer(3), Value::Float(1.5), Value::Null, Value::Integer(7)];
        assert_eq!(run(AggregateFunction::Min, &values), Value::Float(1.5));
        assert_eq!(run(AggregateFunction::Max, &values), Value::Integer(7));
        let names = vec![Value::from("pear"), Value::from("apple")];
        assert_eq!(run(AggregateFunction::Min, &names), Value::from("apple"));
        assert_eq!(run(AggregateFunction::Max, &[]), Value::Null);
    }

    #[test]
    fn test_prod_first_last() {
        assert_eq!(run(AggregateFunction::Prod, &ints(&[2, 3, 4])), Value::Integer(24));
        assert_eq!(run(AggregateFunction::Prod, &[]), Value::Integer(1));
        let values = vec![Value::Null, Value::Integer(5), Value::Integer(6), Value::Null];
        assert_eq!(run(AggregateFunction::First, &values), Value::Integer(5));
        assert_eq!(run(AggregateFunction::Last, &values), Value::Integer(6));
    }
}
