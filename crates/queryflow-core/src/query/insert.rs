//! Turning INSERT value tuples into a table.

use super::ast::{ColumnRef, InsertPlan};
use crate::error::ResolutionError;
use crate::table::{Row, Table, Value};

impl InsertPlan {
    /// Build the table this statement inserts.
    ///
    /// Column names come from the explicit column list, else `schema`, else
    /// positions `"0"`, `"1"`, ... Without an explicit list, short tuples
    /// are padded with nulls to the widest one.
    pub fn to_table(&self, schema: Option<&[String]>) -> Result<Table, ResolutionError> {
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .map(|tuple| tuple.iter().map(Value::from).collect())
            .collect();

        if let Some(columns) = &self.columns {
            let names: Vec<String> = columns.iter().map(column_name).collect();
            return Table::from_rows(names, rows);
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Value::Null);
        }
        let names: Vec<String> = match schema {
            Some(schema) => schema.to_vec(),
            None => (0..width).map(|i| i.to_string()).collect(),
        };
        Table::from_rows(names, rows)
    }
}

fn column_name(column: &ColumnRef) -> String {
    match column {
        ColumnRef::Name(name) => name.clone(),
        ColumnRef::Index(index) => index.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{DataSource, Literal};

    fn plan(columns: Option<Vec<ColumnRef>>, rows: Vec<Vec<Literal>>) -> InsertPlan {
        InsertPlan {
            destination: DataSource::new("csv", "out.csv"),
            columns,
            rows,
        }
    }

    #[test]
    fn test_positional_names() {
        let table = plan(
            None,
            vec![
                vec![Literal::Integer(1), Literal::String("a".into())],
                vec![Literal::Integer(2), Literal::String("b".into())],
            ],
        )
        .to_table(None)
        .unwrap();
        assert_eq!(table.columns(), &["0", "1"].map(String::from));
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows()[1][1], Value::from("b"));
    }

    #[test]
    fn test_ragged_rows_padded() {
        let table = plan(
            None,
            vec![vec![Literal::Integer(1)], vec![Literal::Integer(2), Literal::Float(0.5)]],
        )
        .to_table(None)
        .unwrap();
        assert_eq!(table.rows()[0], vec![Value::Integer(1), Value::Null]);
    }

    #[test]
    fn test_schema_names() {
        let schema = vec!["id".to_string(), "label".to_string()];
        let table = plan(None, vec![vec![Literal::Integer(1), Literal::String("x".into())]])
            .to_table(Some(&schema))
            .unwrap();
        assert_eq!(table.columns(), schema.as_slice());
    }

    #[test]
    fn test_explicit_columns_width_checked() {
        let columns = Some(vec![ColumnRef::Name("id".into()), ColumnRef::Index(1)]);
        let table = plan(
            columns.clone(),
            vec![vec![Literal::Integer(1), Literal::Integer(2)]],
        )
        .to_table(None)
        .unwrap();
        assert_eq!(table.columns(), &["id", "1"].map(String::from));

        let err = plan(columns, vec![vec![Literal::Integer(1)]])
            .to_table(None)
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::RowWidthMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
