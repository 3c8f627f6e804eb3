/// Query executor
///
/// Runs a compiled [`Statement`] against tables produced by an
/// [`Extractor`], handing results to a [`Loader`] when the statement names a
/// destination. SELECT runs a fixed pipeline:
///
/// 1. WHERE filter
/// 2. ORDER BY on the filtered rows (only without GROUP BY)
/// 3. GROUP BY with aggregation, or plain projection
/// 4. DISTINCT
/// 5. LIMIT / TAIL
use super::aggregate::aggregate;
use super::ast::*;
use super::condition;
use super::join::inner_join;
use crate::connector::{Extractor, Loader};
use crate::error::{ExecutionError, ResolutionError};
use crate::table::{Row, Table, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Statement executor bound to a pair of connectors
pub struct Executor<'a> {
    extractor: &'a dyn Extractor,
    loader: &'a dyn Loader,
    insert_schema: Option<&'a [String]>,
}

impl<'a> Executor<'a> {
    /// Create new executor
    pub fn new(extractor: &'a dyn Extractor, loader: &'a dyn Loader) -> Self {
        Self {
            extractor,
            loader,
            insert_schema: None,
        }
    }

    /// Column names for INSERT statements that do not list their columns
    pub fn with_insert_schema(mut self, schema: &'a [String]) -> Self {
        self.insert_schema = Some(schema);
        self
    }

    /// Execute a statement and return its result table.
    ///
    /// INSERT returns the table handed to the loader; UPDATE, DELETE and
    /// empty statements return an empty table.
    pub fn execute(&self, statement: &Statement) -> Result<Table, ExecutionError> {
        match statement {
            Statement::Select(plan) => self.execute_select(plan),
            Statement::Insert(plan) => self.execute_insert(plan),
            Statement::Update(plan) => {
                warn!(target_source = %plan.target, "UPDATE is not supported, statement ignored");
                Ok(Table::empty())
            }
            Statement::Delete(plan) => {
                warn!(target_source = %plan.target, "DELETE is not supported, statement ignored");
                Ok(Table::empty())
            }
            Statement::Empty => Ok(Table::empty()),
        }
    }

    fn execute_select(&self, plan: &SelectPlan) -> Result<Table, ExecutionError> {
        let source = match &plan.from {
            FromClause::Source(source) => {
                let table = self.extractor.extract(&source.source)?;
                match &source.alias {
                    Some(alias) => table.add_prefix(&format!("{}.", alias)),
                    None => table,
                }
            }
            FromClause::Join(join) => {
                let left = self.extractor.extract(&join.left.source)?;
                let right = self.extractor.extract(&join.right.source)?;
                inner_join(
                    left,
                    right,
                    &join.condition,
                    join.left.alias.as_deref(),
                    join.right.alias.as_deref(),
                )?
            }
        };
        debug!(
            rows = source.num_rows(),
            columns = source.num_columns(),
            "extracted source"
        );

        let result = transform_select(source, plan)?;

        if let Some(destination) = &plan.into {
            self.loader.load(&result, destination)?;
            debug!(destination = %destination, "loaded result");
        }
        info!(
            rows = result.num_rows(),
            columns = result.num_columns(),
            "executed SELECT"
        );
        Ok(result)
    }

    fn execute_insert(&self, plan: &InsertPlan) -> Result<Table, ExecutionError> {
        let table = plan.to_table(self.insert_schema)?;
        self.loader.load(&table, &plan.destination)?;
        info!(
            rows = table.num_rows(),
            destination = %plan.destination,
            "executed INSERT"
        );
        Ok(table)
    }
}

/// Apply every SELECT stage after extraction to `table`.
pub fn transform_select(table: Table, plan: &SelectPlan) -> Result<Table, ResolutionError> {
    let table = match &plan.filter {
        Some(filter) => {
            let filtered = condition::filter(&table, filter)?;
            debug!(before = table.num_rows(), after = filtered.num_rows(), "applied WHERE");
            filtered
        }
        None => table,
    };

    let table = match (&plan.group_by, &plan.order_by) {
        (None, Some(order)) if !plan.is_aggregation_only() => order_ungrouped(table, order)?,
        _ => table,
    };

    let table = match &plan.group_by {
        Some(keys) => group(table, plan, keys)?,
        None => select_columns(table, &plan.columns)?,
    };

    let table = if plan.distinct {
        let distinct = table.distinct();
        debug!(rows = distinct.num_rows(), "applied DISTINCT");
        distinct
    } else {
        table
    };

    Ok(apply_limit(table, plan.limit))
}

#[derive(Debug, Clone, Copy)]
struct SortKey {
    column: usize,
    direction: SortDirection,
}

/// Stable multi-key sort; nulls go last in either direction.
fn sort_by_keys(table: Table, keys: &[SortKey]) -> Table {
    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], keys));
    table.take_rows(&order)
}

fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let (x, y) = (&a[key.column], &b[key.column]);
        let ordering = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match key.direction {
                SortDirection::Ascending => x.sort_cmp(y),
                SortDirection::Descending => y.sort_cmp(x),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn push_sort_key(
    keys: &mut Vec<SortKey>,
    column: usize,
    direction: SortDirection,
    table: &Table,
) -> Result<(), ResolutionError> {
    if keys.iter().any(|k| k.column == column) {
        return Err(ResolutionError::DuplicateOrderKey(
            table.columns()[column].clone(),
        ));
    }
    keys.push(SortKey { column, direction });
    Ok(())
}

fn order_ungrouped(table: Table, order: &[OrderByParameter]) -> Result<Table, ResolutionError> {
    let mut keys = Vec::with_capacity(order.len());
    for param in order {
        let column = match &param.parameter {
            ColumnExpr::Column(column) => table.resolve(column)?,
            ColumnExpr::Aggregate(_) => return Err(ResolutionError::OrderByAggregateWithoutGroupBy),
        };
        push_sort_key(&mut keys, column, param.direction, &table)?;
    }
    debug!(keys = keys.len(), "applied ORDER BY");
    Ok(sort_by_keys(table, &keys))
}

/// A resolved aggregation over the pre-group table
struct AggregateRequest {
    function: AggregateFunction,
    column: Option<usize>,
    field: String,
}

impl AggregateRequest {
    fn resolve(table: &Table, aggregation: &Aggregation) -> Result<Self, ResolutionError> {
        let function = aggregation.function;
        match &aggregation.argument {
            AggregateArg::Wildcard => Ok(Self {
                function,
                column: None,
                field: format!("{}_rows", function),
            }),
            AggregateArg::Column(column) => {
                let index = table.resolve(column)?;
                Ok(Self {
                    function,
                    column: Some(index),
                    field: format!("{}_{}", function, table.columns()[index]),
                })
            }
        }
    }

    fn evaluate(&self, table: &Table, rows: &[usize]) -> Result<Value, ResolutionError> {
        match self.column {
            Some(index) => aggregate(
                self.function,
                &table.columns()[index],
                rows.iter().map(|&r| &table.rows()[r][index]),
            ),
            None if self.function.accepts_wildcard() => Ok(Value::Integer(rows.len() as i64)),
            None => Err(ResolutionError::InvalidAggregate {
                function: self.function,
                column: "*".to_string(),
                reason: "only size and count accept *".to_string(),
            }),
        }
    }
}

/// SELECT list without GROUP BY
fn select_columns(table: Table, columns: &SelectColumns) -> Result<Table, ResolutionError> {
    let items = match columns {
        SelectColumns::Wildcard => return Ok(table),
        SelectColumns::Items(items) => items,
    };

    let aggregations = items.iter().filter(|i| i.aggregation().is_some()).count();
    if aggregations == items.len() {
        return aggregate_table(&table, items);
    }
    if aggregations > 0 {
        return Err(ResolutionError::MixedAggregation);
    }

    let mut indices = Vec::with_capacity(items.len());
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let column = item.column().ok_or(ResolutionError::MixedAggregation)?;
        let index = table.resolve(column)?;
        names.push(output_name(item, &table.columns()[index]));
        indices.push(index);
    }
    let projected = table.project(&indices, names)?;
    debug!(columns = projected.num_columns(), "applied projection");
    Ok(projected)
}

/// One row aggregating the whole table
fn aggregate_table(table: &Table, items: &[SelectItem]) -> Result<Table, ResolutionError> {
    let all_rows: Vec<usize> = (0..table.num_rows()).collect();
    let mut names = Vec::with_capacity(items.len());
    let mut row = Vec::with_capacity(items.len());
    for item in items {
        let Some(aggregation) = item.aggregation() else {
            return Err(ResolutionError::MixedAggregation);
        };
        let request = AggregateRequest::resolve(table, aggregation)?;
        row.push(request.evaluate(table, &all_rows)?);
        names.push(output_name(item, &request.field));
    }
    debug!(columns = names.len(), "aggregated whole table");
    Table::from_rows(names, vec![row])
}

fn output_name(item: &SelectItem, default: &str) -> String {
    item.alias().unwrap_or(default).to_string()
}

/// Something that must be located in the grouped table
enum Target<'a> {
    Column(&'a ColumnRef),
    Aggregate(&'a Aggregation),
}

impl<'a> From<&'a SelectItem> for Target<'a> {
    fn from(item: &'a SelectItem) -> Self {
        match item {
            SelectItem::Column(c)
            | SelectItem::Aliased {
                expr: ColumnExpr::Column(c),
                ..
            } => Target::Column(c),
            SelectItem::Aggregate(a)
            | SelectItem::Aliased {
                expr: ColumnExpr::Aggregate(a),
                ..
            } => Target::Aggregate(a),
        }
    }
}

impl<'a> From<&'a ColumnExpr> for Target<'a> {
    fn from(expr: &'a ColumnExpr) -> Self {
        match expr {
            ColumnExpr::Column(c) => Target::Column(c),
            ColumnExpr::Aggregate(a) => Target::Aggregate(a),
        }
    }
}

/// Grouping keys and the table they were resolved against
struct Grouping<'t> {
    source: &'t Table,
    keys: Vec<usize>,
}

impl Grouping<'_> {
    /// Position of a group key in the grouped table
    fn key_position(&self, column: &ColumnRef) -> Result<usize, ResolutionError> {
        let index = self.source.resolve(column)?;
        self.keys
            .iter()
            .position(|&k| k == index)
            .ok_or_else(|| ResolutionError::NotInGroupBy(self.source.columns()[index].clone()))
    }

    fn position(&self, target: Target<'_>, grouped: &Table) -> Result<usize, ResolutionError> {
        match target {
            Target::Column(column) => self.key_position(column),
            Target::Aggregate(aggregation) => {
                let field = AggregateRequest::resolve(self.source, aggregation)?.field;
                grouped
                    .column_index(&field)
                    .ok_or(ResolutionError::UnknownColumn(field))
            }
        }
    }

    /// Row positions per key combination, in ascending key order.
    ///
    /// Rows with a null in any key column belong to no group.
    fn groups(&self) -> Vec<(Row, Vec<usize>)> {
        let mut groups: HashMap<Row, Vec<usize>> = HashMap::new();
        for (i, row) in self.source.rows().iter().enumerate() {
            let key: Row = self.keys.iter().map(|&k| row[k].clone()).collect();
            if key.iter().any(Value::is_null) {
                continue;
            }
            groups.entry(key).or_default().push(i);
        }

        let mut groups: Vec<(Row, Vec<usize>)> = groups.into_iter().collect();
        groups.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b)
                .map(|(x, y)| x.sort_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        groups
    }
}

fn group(table: Table, plan: &SelectPlan, keys: &[ColumnRef]) -> Result<Table, ResolutionError> {
    let SelectColumns::Items(items) = &plan.columns else {
        return Err(ResolutionError::WildcardWithGroupBy);
    };

    let mut grouping = Grouping {
        source: &table,
        keys: Vec::with_capacity(keys.len()),
    };
    for key in keys {
        let index = table.resolve(key)?;
        if !grouping.keys.contains(&index) {
            grouping.keys.push(index);
        }
    }
    for column in items.iter().filter_map(SelectItem::column) {
        grouping.key_position(column)?;
    }

    let order_aggregations = plan
        .order_by
        .iter()
        .flatten()
        .filter_map(|param| match &param.parameter {
            ColumnExpr::Aggregate(a) => Some(a),
            ColumnExpr::Column(_) => None,
        });
    let mut requests: Vec<AggregateRequest> = Vec::new();
    for aggregation in items
        .iter()
        .filter_map(SelectItem::aggregation)
        .chain(order_aggregations)
    {
        let request = AggregateRequest::resolve(&table, aggregation)?;
        if !requests.iter().any(|r| r.field == request.field) {
            requests.push(request);
        }
    }

    let mut names: Vec<String> = grouping
        .keys
        .iter()
        .map(|&k| table.columns()[k].clone())
        .collect();
    names.extend(requests.iter().map(|r| r.field.clone()));
    let mut grouped = Table::new(names)?;

    for (mut row, members) in grouping.groups() {
        for request in &requests {
            row.push(request.evaluate(&table, &members)?);
        }
        grouped.push_row(row)?;
    }
    debug!(
        keys = grouping.keys.len(),
        groups = grouped.num_rows(),
        aggregations = requests.len(),
        "applied GROUP BY"
    );

    if let Some(order) = &plan.order_by {
        let mut sort_keys = Vec::with_capacity(order.len());
        for param in order {
            let column = grouping.position(Target::from(&param.parameter), &grouped)?;
            push_sort_key(&mut sort_keys, column, param.direction, &grouped)?;
        }
        grouped = sort_by_keys(grouped, &sort_keys);
        debug!(keys = sort_keys.len(), "applied ORDER BY to groups");
    }

    let mut indices = Vec::with_capacity(items.len());
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let index = grouping.position(Target::from(item), &grouped)?;
        names.push(output_name(item, &grouped.columns()[index]));
        indices.push(index);
    }
    grouped.project(&indices, names)
}

fn apply_limit(table: Table, limit: Option<RowLimit>) -> Table {
    match limit {
        None => table,
        Some(RowLimit { count: 0, .. }) => table.cleared(),
        Some(RowLimit {
            mode: LimitMode::Limit,
            count,
        }) => table.head(count),
        Some(RowLimit {
            mode: LimitMode::Tail,
            count,
        }) => table.tail(count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MemoryConnector;
    use crate::query::compile;

    fn people() -> Table {
        Table::from_rows(
            ["name", "age", "dept"],
            vec![
                vec!["A".into(), Value::Integer(25), "X".into()],
                vec!["B".into(), Value::Integer(40), "Y".into()],
                vec!["C".into(), Value::Integer(35), "X".into()],
            ],
        )
        .unwrap()
    }

    fn select(query: &str) -> SelectPlan {
        match compile(query).unwrap() {
            Statement::Select(plan) => plan,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    fn run(query: &str) -> Result<Table, ResolutionError> {
        transform_select(people(), &select(query))
    }

    fn column(table: &Table, index: usize) -> Vec<Value> {
        table.column_values(index).cloned().collect()
    }

    #[test]
    fn test_wildcard_returns_input() {
        assert_eq!(run("SELECT * FROM {csv:p} ;").unwrap(), people());
    }

    #[test]
    fn test_filter_order_limit() {
        let result =
            run("SELECT name, age FROM {csv:p} WHERE age > 30 ORDER BY age DESC LIMIT 2 ;").unwrap();
        assert_eq!(result.columns(), &["name", "age"].map(String::from));
        assert_eq!(column(&result, 0), vec![Value::from("B"), Value::from("C")]);
    }

    #[test]
    fn test_order_by_unselected_column() {
        let result = run("SELECT name FROM {csv:p} ORDER BY age ;").unwrap();
        assert_eq!(
            column(&result, 0),
            vec![Value::from("A"), Value::from("C"), Value::from("B")]
        );
    }

    #[test]
    fn test_nulls_sort_last_in_both_directions() {
        let table = Table::from_rows(
            ["v"],
            vec![
                vec![Value::Integer(2)],
                vec![Value::Null],
                vec![Value::Integer(1)],
            ],
        )
        .unwrap();
        let asc = transform_select(table.clone(), &select("SELECT * FROM {csv:t} ORDER BY v ;"))
            .unwrap();
        assert_eq!(
            column(&asc, 0),
            vec![Value::Integer(1), Value::Integer(2), Value::Null]
        );
        let desc =
            transform_select(table, &select("SELECT * FROM {csv:t} ORDER BY v DESC ;")).unwrap();
        assert_eq!(
            column(&desc, 0),
            vec![Value::Integer(2), Value::Integer(1), Value::Null]
        );
    }

    #[test]
    fn test_duplicate_order_keys_rejected() {
        let err = run("SELECT * FROM {csv:p} ORDER BY age ASC, [1] DESC ;").unwrap_err();
        assert_eq!(err, ResolutionError::DuplicateOrderKey("age".to_string()));
    }

    #[test]
    fn test_order_by_aggregate_without_group_by() {
        let err = run("SELECT name FROM {csv:p} ORDER BY max(age) ;").unwrap_err();
        assert_eq!(err, ResolutionError::OrderByAggregateWithoutGroupBy);
    }

    #[test]
    fn test_group_by_count_rows() {
        let result = run("SELECT dept, COUNT(*) FROM {csv:p} GROUP BY dept ;").unwrap();
        assert_eq!(result.columns(), &["dept", "count_rows"].map(String::from));
        assert_eq!(column(&result, 0), vec![Value::from("X"), Value::from("Y")]);
        assert_eq!(column(&result, 1), vec![Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn test_group_by_order_by_aggregate_not_selected() {
        let result = run(
            "SELECT dept AS d FROM {csv:p} GROUP BY dept ORDER BY sum(age) DESC ;",
        )
        .unwrap();
        assert_eq!(result.columns(), &["d".to_string()]);
        assert_eq!(column(&result, 0), vec![Value::from("X"), Value::from("Y")]);
    }

    #[test]
    fn test_group_by_rejects_ungrouped_column() {
        let err = run("SELECT name, COUNT(*) FROM {csv:p} GROUP BY dept ;").unwrap_err();
        assert_eq!(err, ResolutionError::NotInGroupBy("name".to_string()));
        let err = run("SELECT * FROM {csv:p} GROUP BY dept ;").unwrap_err();
        assert_eq!(err, ResolutionError::WildcardWithGroupBy);
    }

    #[test]
    fn test_aggregation_only_select() {
        let result = run("SELECT max(age), mean(age) AS avg FROM {csv:p} ;").unwrap();
        assert_eq!(result.columns(), &["max_age", "avg"].map(String::from));
        assert_eq!(result.rows()[0][0], Value::Integer(40));
        assert_eq!(result.rows()[0][1].to_string(), "33.333333333333336");
    }

    #[test]
    fn test_mixed_aggregation_rejected() {
        let err = run("SELECT name, max(age) FROM {csv:p} ;").unwrap_err();
        assert_eq!(err, ResolutionError::MixedAggregation);
    }

    #[test]
    fn test_limit_and_tail_zero() {
        let result = run("SELECT name FROM {csv:p} LIMIT 0 ;").unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns(), &["name".to_string()]);
        let result = run("SELECT * FROM {csv:p} TAIL 2 ;").unwrap();
        assert_eq!(column(&result, 0), vec![Value::from("B"), Value::from("C")]);
    }

    #[test]
    fn test_distinct() {
        let result = run("SELECT DISTINCT dept FROM {csv:p} ;").unwrap();
        assert_eq!(column(&result, 0), vec![Value::from("X"), Value::from("Y")]);
    }

    #[test]
    fn test_executor_select_into_and_insert() {
        let memory = MemoryConnector::new().with_table("p.csv", people()).unwrap();
        let executor = Executor::new(&memory, &memory);

        let statement = compile("SELECT name INTO {csv:names.csv} FROM {csv:p.csv} ;").unwrap();
        let result = executor.execute(&statement).unwrap();
        assert_eq!(memory.get("names.csv").unwrap(), Some(result));

        let statement = compile("INSERT INTO {csv:out.csv} VALUES (1, \"a\"), (2, \"b\");").unwrap();
        let inserted = executor.execute(&statement).unwrap();
        assert_eq!(inserted.num_rows(), 2);
        assert_eq!(memory.get("out.csv").unwrap(), Some(inserted));
    }

    #[test]
    fn test_update_and_delete_are_no_ops() {
        let memory = MemoryConnector::new().with_table("p.csv", people()).unwrap();
        let executor = Executor::new(&memory, &memory);
        let statement = compile("DELETE FROM {csv:p.csv} WHERE age > 1 ;").unwrap();
        assert!(executor.execute(&statement).unwrap().is_empty());
        assert_eq!(memory.get("p.csv").unwrap(), Some(people()));
    }

    #[test]
    fn test_single_source_alias_prefixes_columns() {
        let memory = MemoryConnector::new().with_table("p.csv", people()).unwrap();
        let executor = Executor::new(&memory, &memory);
        let statement = compile("SELECT p.name FROM {csv:p.csv} AS p WHERE p.age < 30 ;").unwrap();
        let result = executor.execute(&statement).unwrap();
        assert_eq!(result.columns(), &["p.name".to_string()]);
        assert_eq!(result.num_rows(), 1);
    }
}
