/// Abstract Syntax Tree (AST) node types for QueryFlow statements
///
/// A parsed statement is directly the executable plan: the engine consumes
/// these types without any intermediate code generation.
use super::lexer::TokenKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(SelectPlan),
    Insert(InsertPlan),
    /// Parsed but never executed
    Update(UpdatePlan),
    /// Parsed but never executed
    Delete(DeletePlan),
    /// Empty or comment-only input
    Empty,
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectPlan {
    pub columns: SelectColumns,
    pub distinct: bool,
    pub from: FromClause,
    pub into: Option<DataSource>,
    pub filter: Option<Condition>,
    pub group_by: Option<Vec<ColumnRef>>,
    pub order_by: Option<Vec<OrderByParameter>>,
    pub limit: Option<RowLimit>,
}

impl SelectPlan {
    /// True when every SELECT item is an aggregation (possibly aliased)
    pub fn is_aggregation_only(&self) -> bool {
        match &self.columns {
            SelectColumns::Wildcard => false,
            SelectColumns::Items(items) => items.iter().all(|i| i.aggregation().is_some()),
        }
    }
}

/// Columns requested by SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectColumns {
    /// SELECT *
    Wildcard,
    Items(Vec<SelectItem>),
}

/// A reference to a column, by name or by position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRef {
    /// `name`, `[name with spaces]`
    Name(String),
    /// `[n]`, resolved against the table at the stage that uses it
    Index(usize),
}

/// Aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    NUnique,
    Std,
    Var,
    First,
    Last,
    Prod,
    Sem,
    Size,
    Quantile,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 15] = [
        AggregateFunction::Sum,
        AggregateFunction::Mean,
        AggregateFunction::Median,
        AggregateFunction::Min,
        AggregateFunction::Max,
        AggregateFunction::Count,
        AggregateFunction::NUnique,
        AggregateFunction::Std,
        AggregateFunction::Var,
        AggregateFunction::First,
        AggregateFunction::Last,
        AggregateFunction::Prod,
        AggregateFunction::Sem,
        AggregateFunction::Size,
        AggregateFunction::Quantile,
    ];

    /// Lower-case function name, as used in output column names
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Mean => "mean",
            AggregateFunction::Median => "median",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Count => "count",
            AggregateFunction::NUnique => "nunique",
            AggregateFunction::Std => "std",
            AggregateFunction::Var => "var",
            AggregateFunction::First => "first",
            AggregateFunction::Last => "last",
            AggregateFunction::Prod => "prod",
            AggregateFunction::Sem => "sem",
            AggregateFunction::Size => "size",
            AggregateFunction::Quantile => "quantile",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|f| f.name() == lower)
    }

    /// Whether `function(*)` is accepted
    pub fn accepts_wildcard(&self) -> bool {
        matches!(self, AggregateFunction::Size | AggregateFunction::Count)
    }
}

/// Argument of an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateArg {
    Column(ColumnRef),
    /// `*`, rendered as the pseudo-column `rows`
    Wildcard,
}

/// `function(column)` or `function(*)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub argument: AggregateArg,
}

impl Aggregation {
    pub fn new(function: AggregateFunction, argument: AggregateArg) -> Self {
        Self { function, argument }
    }
}

/// A column or an aggregation, shared by SELECT and ORDER BY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnExpr {
    Column(ColumnRef),
    Aggregate(Aggregation),
}

/// An item of the SELECT list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Column(ColumnRef),
    Aggregate(Aggregation),
    /// `expr AS alias`
    Aliased { expr: ColumnExpr, alias: String },
}

impl SelectItem {
    /// The plain column this item selects, if any
    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            SelectItem::Column(c)
            | SelectItem::Aliased {
                expr: ColumnExpr::Column(c),
                ..
            } => Some(c),
            _ => None,
        }
    }

    /// The aggregation this item computes, if any
    pub fn aggregation(&self) -> Option<&Aggregation> {
        match self {
            SelectItem::Aggregate(a)
            | SelectItem::Aliased {
                expr: ColumnExpr::Aggregate(a),
                ..
            } => Some(a),
            _ => None,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            SelectItem::Aliased { alias, .. } => Some(alias),
            _ => None,
        }
    }
}

/// `{type:path}` datasource descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSource {
    /// Connector tag, e.g. `csv`
    pub tag: String,
    /// Connector-specific location
    pub path: String,
}

impl DataSource {
    pub fn new(tag: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            path: path.into(),
        }
    }

    /// Split a raw descriptor on the first of the given separators.
    pub fn split(descriptor: &str, separators: &[char]) -> Option<Self> {
        let at = descriptor.find(|c: char| separators.contains(&c))?;
        Some(Self::new(&descriptor[..at], &descriptor[at + 1..]))
    }

    /// `|`-separated path segments, interpreted by the connector
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('|').collect()
    }
}

/// A datasource with an optional table alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: DataSource,
    pub alias: Option<String>,
}

/// FROM clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromClause {
    Source(SourceRef),
    Join(JoinPlan),
}

/// `left INNER JOIN right ON condition`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPlan {
    pub left: SourceRef,
    pub right: SourceRef,
    pub kind: JoinKind,
    pub condition: Condition,
}

/// Types of joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
}

/// Boolean condition for WHERE and JOIN ... ON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Compare {
        left: Operand,
        op: ComparisonOp,
        right: Operand,
    },
    /// `left LIKE "regex"`
    Like { left: Operand, pattern: String },
}

/// Leaf operand of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Column(ColumnRef),
    Literal(Literal),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq, // ==
    Ne, // != or <>
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

/// Literal values in queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
}

/// ORDER BY entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByParameter {
    pub parameter: ColumnExpr,
    pub direction: SortDirection,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// LIMIT n / TAIL n
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLimit {
    pub mode: LimitMode,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitMode {
    /// Keep the first rows
    Limit,
    /// Keep the last rows
    Tail,
}

/// INSERT INTO {type:path} [(cols)] VALUES (...), ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertPlan {
    pub destination: DataSource,
    pub columns: Option<Vec<ColumnRef>>,
    pub rows: Vec<Vec<Literal>>,
}

/// UPDATE {type:path} SET col == value, ... [WHERE cond]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub target: DataSource,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Condition>,
}

/// `column == value` inside UPDATE ... SET
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Literal,
}

/// DELETE FROM {type:path} [WHERE cond]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePlan {
    pub target: DataSource,
    pub filter: Option<Condition>,
}

// Display implementations for debugging and error messages

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(plan) => write!(f, "{}", plan),
            Statement::Insert(plan) => write!(f, "{}", plan),
            Statement::Update(plan) => write!(f, "{}", plan),
            Statement::Delete(plan) => write!(f, "{}", plan),
            Statement::Empty => Ok(()),
        }
    }
}

impl fmt::Display for SelectPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write!(f, "{}", self.columns)?;
        if let Some(ref into) = self.into {
            write!(f, " INTO {}", into)?;
        }
        write!(f, " FROM {}", self.from)?;
        if let Some(ref filter) = self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        if let Some(ref group_by) = self.group_by {
            write!(f, " GROUP BY ")?;
            write_list(f, group_by)?;
        }
        if let Some(ref order_by) = self.order_by {
            write!(f, " ORDER BY ")?;
            write_list(f, order_by)?;
        }
        if let Some(ref limit) = self.limit {
            write!(f, " {}", limit)?;
        }
        write!(f, " ;")
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for SelectColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectColumns::Wildcard => write!(f, "*"),
            SelectColumns::Items(items) => write_list(f, items),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Name(name) => write!(f, "{}", Name(name)),
            ColumnRef::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A column name or alias, bracketed when it would not lex back as itself
struct Name<'a>(&'a str);

impl fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_plain_identifier(self.0) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "[{}]", self.0)
        }
    }
}

/// Whether `name` lexes back as a single identifier without brackets
fn is_plain_identifier(name: &str) -> bool {
    let segment_ok = |segment: &str| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if !name.split('.').all(segment_ok) {
        return false;
    }
    // Qualified names never lex as keywords or aggregate names
    name.contains('.')
        || (TokenKind::keyword(name).is_none() && AggregateFunction::from_name(name).is_none())
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for AggregateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateArg::Column(c) => write!(f, "{}", c),
            AggregateArg::Wildcard => write!(f, "*"),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function, self.argument)
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnExpr::Column(c) => write!(f, "{}", c),
            ColumnExpr::Aggregate(a) => write!(f, "{}", a),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Column(c) => write!(f, "{}", c),
            SelectItem::Aggregate(a) => write!(f, "{}", a),
            SelectItem::Aliased { expr, alias } => write!(f, "{} AS {}", expr, Name(alias)),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}:{}}}", self.tag, self.path)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(ref alias) = self.alias {
            write!(f, " AS {}", Name(alias))?;
        }
        Ok(())
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromClause::Source(source) => write!(f, "{}", source),
            FromClause::Join(join) => write!(f, "{}", join),
        }
    }
}

impl fmt::Display for JoinPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} JOIN {} ON {}",
            self.left, self.kind, self.right, self.condition
        )
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::And(left, right) => write!(f, "({} AND {})", left, right),
            Condition::Or(left, right) => write!(f, "({} OR {})", left, right),
            Condition::Not(operand) => write!(f, "NOT ({})", operand),
            Condition::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Condition::Like { left, pattern } => write!(f, "{} LIKE \"{}\"", left, pattern),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(c) => write!(f, "{}", c),
            Operand::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "=="),
            ComparisonOp::Ne => write!(f, "!="),
            ComparisonOp::Lt => write!(f, "<"),
            ComparisonOp::Le => write!(f, "<="),
            ComparisonOp::Gt => write!(f, ">"),
            ComparisonOp::Ge => write!(f, ">="),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(fl) if fl.fract() == 0.0 => write!(f, "{:.1}", fl),
            Literal::Float(fl) => write!(f, "{}", fl),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for OrderByParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.parameter, self.direction)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ASC"),
            SortDirection::Descending => write!(f, "DESC"),
        }
    }
}

impl fmt::Display for RowLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            LimitMode::Limit => write!(f, "LIMIT {}", self.count),
            LimitMode::Tail => write!(f, "TAIL {}", self.count),
        }
    }
}

impl fmt::Display for InsertPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {}", self.destination)?;
        if let Some(ref columns) = self.columns {
            write!(f, " (")?;
            write_list(f, columns)?;
            write!(f, ")")?;
        }
        write!(f, " VALUES ")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "(")?;
            write_list(f, row)?;
            write!(f, ")")?;
        }
        write!(f, " ;")
    }
}

impl fmt::Display for UpdatePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {} SET ", self.target)?;
        write_list(f, &self.assignments)?;
        if let Some(ref filter) = self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        write!(f, " ;")
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.column, self.value)
    }
}

impl fmt::Display for DeletePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", self.target)?;
        if let Some(ref filter) = self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        write!(f, " ;")
    }
}
