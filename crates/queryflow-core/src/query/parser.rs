/// Parser for QueryFlow statements
///
/// Converts a stream of tokens into a [`Statement`], which is directly the
/// executable plan.
use super::ast::*;
use super::lexer::{Token, TokenKind};
use std::fmt;

/// Parse a token stream ending in [`TokenKind::Eof`].
pub fn parse(tokens: Vec<Token>) -> Result<Statement, ParseError> {
    Parser::new(tokens).parse()
}

/// Recursive-descent parser over a token vector
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a parser; an `Eof` token is appended when missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse exactly one statement
    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        let statement = match self.current_kind() {
            TokenKind::Eof => return Ok(Statement::Empty),
            TokenKind::Select => Statement::Select(self.parse_select()?),
            TokenKind::Insert => Statement::Insert(self.parse_insert()?),
            TokenKind::Update => Statement::Update(self.parse_update()?),
            TokenKind::Delete => Statement::Delete(self.parse_delete()?),
            _ => return Err(self.unexpected("SELECT, INSERT, UPDATE or DELETE")),
        };
        self.expect_token(TokenKind::Eof)?;
        Ok(statement)
    }

    // ---- SELECT -------------------------------------------------------

    fn parse_select(&mut self) -> Result<SelectPlan, ParseError> {
        self.expect_token(TokenKind::Select)?;
        let distinct = self.consume(&TokenKind::Distinct);
        let columns = self.parse_select_columns()?;

        let into = if self.consume(&TokenKind::Into) {
            Some(self.parse_datasource(&[':'])?)
        } else {
            None
        };

        self.expect_token(TokenKind::From)?;
        let from = self.parse_from()?;
        let filter = self.parse_where()?;

        let group_by = if self.consume(&TokenKind::Group) {
            self.expect_token(TokenKind::By)?;
            Some(self.parse_column_list()?)
        } else {
            None
        };

        let order_by = if self.consume(&TokenKind::Order) {
            self.expect_token(TokenKind::By)?;
            Some(self.parse_order_by()?)
        } else {
            None
        };

        let limit = self.parse_limit()?;
        self.expect_token(TokenKind::Semicolon)?;

        Ok(SelectPlan {
            columns,
            distinct,
            from,
            into,
            filter,
            group_by,
            order_by,
            limit,
        })
    }

    fn parse_select_columns(&mut self) -> Result<SelectColumns, ParseError> {
        if self.consume(&TokenKind::Star) {
            return Ok(SelectColumns::Wildcard);
        }

        let mut items = Vec::new();
        loop {
            let expr = self.parse_column_expr()?;
            let item = if self.consume(&TokenKind::As) {
                let alias = self.parse_alias()?;
                SelectItem::Aliased { expr, alias }
            } else {
                match expr {
                    ColumnExpr::Column(c) => SelectItem::Column(c),
                    ColumnExpr::Aggregate(a) => SelectItem::Aggregate(a),
                }
            };
            items.push(item);

            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(SelectColumns::Items(items))
    }

    /// `column` or `function(column | *)`
    fn parse_column_expr(&mut self) -> Result<ColumnExpr, ParseError> {
        if let TokenKind::Aggregate(function) = *self.current_kind() {
            let (line, column) = self.position_here();
            self.advance();
            self.expect_token(TokenKind::LeftParen)?;
            let argument = if self.consume(&TokenKind::Star) {
                if !function.accepts_wildcard() {
                    return Err(ParseError::WildcardAggregate {
                        function,
                        line,
                        column,
                    });
                }
                AggregateArg::Wildcard
            } else {
                AggregateArg::Column(self.parse_column()?)
            };
            self.expect_token(TokenKind::RightParen)?;
            return Ok(ColumnExpr::Aggregate(Aggregation::new(function, argument)));
        }
        Ok(ColumnExpr::Column(self.parse_column()?))
    }

    fn parse_column(&mut self) -> Result<ColumnRef, ParseError> {
        let column = match self.current_kind() {
            TokenKind::Identifier(name) | TokenKind::BracketedIdentifier(name) => {
                ColumnRef::Name(name.clone())
            }
            TokenKind::ColumnIndex(index) => ColumnRef::Index(*index),
            _ => return Err(self.unexpected("column")),
        };
        self.advance();
        Ok(column)
    }

    fn parse_column_list(&mut self) -> Result<Vec<ColumnRef>, ParseError> {
        let mut columns = vec![self.parse_column()?];
        while self.consume(&TokenKind::Comma) {
            columns.push(self.parse_column()?);
        }
        Ok(columns)
    }

    fn parse_alias(&mut self) -> Result<String, ParseError> {
        match self.current_kind() {
            TokenKind::Identifier(name) | TokenKind::BracketedIdentifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("alias")),
        }
    }

    fn parse_datasource(&mut self, separators: &[char]) -> Result<DataSource, ParseError> {
        let (line, column) = self.position_here();
        let TokenKind::DataSource(descriptor) = self.current_kind() else {
            return Err(self.unexpected("datasource"));
        };
        let source = DataSource::split(descriptor, separators).ok_or_else(|| {
            ParseError::InvalidDataSource {
                descriptor: descriptor.clone(),
                line,
                column,
            }
        })?;
        self.advance();
        Ok(source)
    }

    /// `{type:path} [[AS] alias]`
    fn parse_source_ref(&mut self) -> Result<SourceRef, ParseError> {
        let source = self.parse_datasource(&[':'])?;
        let alias = if self.consume(&TokenKind::As) {
            Some(self.parse_alias()?)
        } else if let TokenKind::Identifier(name) = self.current_kind() {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        };
        Ok(SourceRef { source, alias })
    }

    fn parse_from(&mut self) -> Result<FromClause, ParseError> {
        let left = self.parse_source_ref()?;
        if !self.consume(&TokenKind::Inner) {
            return Ok(FromClause::Source(left));
        }
        self.expect_token(TokenKind::Join)?;
        let right = self.parse_source_ref()?;
        self.expect_token(TokenKind::On)?;
        let condition = self.parse_condition()?;
        Ok(FromClause::Join(JoinPlan {
            left,
            right,
            kind: JoinKind::Inner,
            condition,
        }))
    }

    fn parse_where(&mut self) -> Result<Option<Condition>, ParseError> {
        if self.consume(&TokenKind::Where) {
            Ok(Some(self.parse_condition()?))
        } else {
            Ok(None)
        }
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByParameter>, ParseError> {
        let mut parameters = Vec::new();
        loop {
            let parameter = self.parse_column_expr()?;
            let direction = if self.consume(&TokenKind::Desc) {
                SortDirection::Descending
            } else {
                self.consume(&TokenKind::Asc);
                SortDirection::Ascending
            };
            parameters.push(OrderByParameter {
                parameter,
                direction,
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(parameters)
    }

    fn parse_limit(&mut self) -> Result<Option<RowLimit>, ParseError> {
        let mode = match self.current_kind() {
            TokenKind::Limit => LimitMode::Limit,
            TokenKind::Tail => LimitMode::Tail,
            _ => return Ok(None),
        };
        self.advance();

        let (line, column) = self.position_here();
        let TokenKind::Integer(n) = *self.current_kind() else {
            return Err(self.unexpected("row count"));
        };
        let count = usize::try_from(n).map_err(|_| ParseError::InvalidRowCount {
            count: n,
            line,
            column,
        })?;
        self.advance();
        Ok(Some(RowLimit { mode, count }))
    }

    // ---- Conditions ---------------------------------------------------

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_and()?;
        while self.consume(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_not()?;
        while self.consume(&TokenKind::And) {
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition, ParseError> {
        if self.consume(&TokenKind::Not) {
            let operand = self.parse_not()?;
            return Ok(Condition::Not(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition, ParseError> {
        if self.consume(&TokenKind::LeftParen) {
            let condition = self.parse_or()?;
            self.expect_token(TokenKind::RightParen)?;
            return Ok(condition);
        }

        let left = self.parse_operand()?;
        if self.consume(&TokenKind::Like) {
            let TokenKind::String(pattern) = self.current_kind() else {
                return Err(self.unexpected("pattern string"));
            };
            let pattern = pattern.clone();
            self.advance();
            return Ok(Condition::Like { left, pattern });
        }

        let op = match self.current_kind() {
            TokenKind::Eq => ComparisonOp::Eq,
            TokenKind::Ne => ComparisonOp::Ne,
            TokenKind::Lt => ComparisonOp::Lt,
            TokenKind::Le => ComparisonOp::Le,
            TokenKind::Gt => ComparisonOp::Gt,
            TokenKind::Ge => ComparisonOp::Ge,
            _ => return Err(self.unexpected("comparison operator or LIKE")),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Condition::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        match self.current_kind() {
            TokenKind::Identifier(_)
            | TokenKind::BracketedIdentifier(_)
            | TokenKind::ColumnIndex(_) => Ok(Operand::Column(self.parse_column()?)),
            _ => Ok(Operand::Literal(self.parse_literal("column or value")?)),
        }
    }

    fn parse_literal(&mut self, expected: &str) -> Result<Literal, ParseError> {
        let literal = match self.current_kind() {
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::Integer(i) => Literal::Integer(*i),
            TokenKind::Float(f) => Literal::Float(*f),
            _ => return Err(self.unexpected(expected)),
        };
        self.advance();
        Ok(literal)
    }

    // ---- INSERT / UPDATE / DELETE ---------------------------------------

    fn parse_insert(&mut self) -> Result<InsertPlan, ParseError> {
        self.expect_token(TokenKind::Insert)?;
        self.expect_token(TokenKind::Into)?;
        let destination = self.parse_datasource(&[':', '|'])?;

        let columns = if self.consume(&TokenKind::LeftParen) {
            let columns = self.parse_column_list()?;
            self.expect_token(TokenKind::RightParen)?;
            Some(columns)
        } else {
            None
        };

        self.expect_token(TokenKind::Values)?;
        let mut rows = vec![self.parse_tuple()?];
        while self.consume(&TokenKind::Comma) {
            rows.push(self.parse_tuple()?);
        }
        self.expect_token(TokenKind::Semicolon)?;

        Ok(InsertPlan {
            destination,
            columns,
            rows,
        })
    }

    fn parse_tuple(&mut self) -> Result<Vec<Literal>, ParseError> {
        self.expect_token(TokenKind::LeftParen)?;
        let mut values = vec![self.parse_literal("value")?];
        while self.consume(&TokenKind::Comma) {
            values.push(self.parse_literal("value")?);
        }
        self.expect_token(TokenKind::RightParen)?;
        Ok(values)
    }

    fn parse_update(&mut self) -> Result<UpdatePlan, ParseError> {
        self.expect_token(TokenKind::Update)?;
        let target = self.parse_datasource(&[':'])?;
        self.expect_token(TokenKind::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.consume(&TokenKind::Comma) {
            assignments.push(self.parse_assignment()?);
        }

        let filter = self.parse_where()?;
        self.expect_token(TokenKind::Semicolon)?;
        Ok(UpdatePlan {
            target,
            assignments,
            filter,
        })
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let column = self.parse_column()?;
        self.expect_token(TokenKind::Eq)?;
        let value = self.parse_literal("value")?;
        Ok(Assignment { column, value })
    }

    fn parse_delete(&mut self) -> Result<DeletePlan, ParseError> {
        self.expect_token(TokenKind::Delete)?;
        self.expect_token(TokenKind::From)?;
        let target = self.parse_datasource(&[':'])?;
        let filter = self.parse_where()?;
        self.consume(&TokenKind::Semicolon);
        Ok(DeletePlan { target, filter })
    }

    // ---- Token helpers ----------------------------------------------------

    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current_token().kind
    }

    fn position_here(&self) -> (usize, usize) {
        let token = self.current_token();
        (token.line, token.column)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    /// Advance past `kind` if it is the current token
    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.current_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if self.consume(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current_token();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.clone(),
            line: token.line,
            column: token.column,
        }
    }
}

/// Parser errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        line: usize,
        column: usize,
    },
    /// `function(*)` for a function other than `size`/`count`
    WildcardAggregate {
        function: AggregateFunction,
        line: usize,
        column: usize,
    },
    /// Datasource descriptor without a type separator
    InvalidDataSource {
        descriptor: String,
        line: usize,
        column: usize,
    },
    /// Negative LIMIT/TAIL count
    InvalidRowCount {
        count: i64,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::WildcardAggregate { line, .. }
            | ParseError::InvalidDataSource { line, .. }
            | ParseError::InvalidRowCount { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { column, .. }
            | ParseError::WildcardAggregate { column, .. }
            | ParseError::InvalidDataSource { column, .. }
            | ParseError::InvalidRowCount { column, .. } => *column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                line,
                column,
            } => write!(
                f,
                "unexpected token '{}' at line {}, column {} (expected {})",
                found, line, column, expected
            ),
            ParseError::WildcardAggregate {
                function,
                line,
                column,
            } => write!(
                f,
                "{}(*) is not allowed at line {}, column {}; only size and count accept *",
                function, line, column
            ),
            ParseError::InvalidDataSource {
                descriptor,
                line,
                column,
            } => write!(
                f,
                "invalid datasource {{{}}} at line {}, column {}; expected {{type:path}}",
                descriptor, line, column
            ),
            ParseError::InvalidRowCount {
                count,
                line,
                column,
            } => write!(
                f,
                "invalid row count {} at line {}, column {} (must be non-negative)",
                count, line, column
            ),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;

    fn parse_str(input: &str) -> Result<Statement, ParseError> {
        parse(tokenize(input).unwrap())
    }

    fn select(input: &str) -> SelectPlan {
        match parse_str(input).unwrap() {
            Statement::Select(plan) => plan,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    fn name(n: &str) -> ColumnRef {
        ColumnRef::Name(n.to_string())
    }

    #[test]
    fn test_simple_select() {
        let plan = select("SELECT * FROM {csv:people.csv} ;");
        assert_eq!(plan.columns, SelectColumns::Wildcard);
        assert_eq!(
            plan.from,
            FromClause::Source(SourceRef {
                source: DataSource::new("csv", "people.csv"),
                alias: None,
            })
        );
        assert!(!plan.distinct);
        assert!(plan.filter.is_none());
    }

    #[test]
    fn test_full_select() {
        let plan = select(
            "SELECT DISTINCT name, [1] AS years INTO {json:out.json} FROM {csv:p.csv} \
             WHERE age > 30 ORDER BY age DESC, name LIMIT 2 ;",
        );
        assert!(plan.distinct);
        assert_eq!(
            plan.columns,
            SelectColumns::Items(vec![
                SelectItem::Column(name("name")),
                SelectItem::Aliased {
                    expr: ColumnExpr::Column(ColumnRef::Index(1)),
                    alias: "years".to_string(),
                },
            ])
        );
        assert_eq!(plan.into, Some(DataSource::new("json", "out.json")));
        assert_eq!(
            plan.filter,
            Some(Condition::Compare {
                left: Operand::Column(name("age")),
                op: ComparisonOp::Gt,
                right: Operand::Literal(Literal::Integer(30)),
            })
        );
        let order = plan.order_by.unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].direction, SortDirection::Descending);
        assert_eq!(order[1].direction, SortDirection::Ascending);
        assert_eq!(
            plan.limit,
            Some(RowLimit {
                mode: LimitMode::Limit,
                count: 2
            })
        );
    }

    #[test]
    fn test_group_by_with_aggregates() {
        let plan = select("SELECT dept, COUNT(*), mean(salary) FROM {csv:e} GROUP BY dept ;");
        assert_eq!(plan.group_by, Some(vec![name("dept")]));
        let SelectColumns::Items(items) = plan.columns else {
            panic!("expected items");
        };
        assert_eq!(
            items[1],
            SelectItem::Aggregate(Aggregation::new(
                AggregateFunction::Count,
                AggregateArg::Wildcard
            ))
        );
        assert_eq!(
            items[2],
            SelectItem::Aggregate(Aggregation::new(
                AggregateFunction::Mean,
                AggregateArg::Column(name("salary"))
            ))
        );
    }

    #[test]
    fn test_size_wildcard_accepted_sum_rejected() {
        assert!(parse_str("SELECT SIZE(*) FROM {csv:x} ;").is_ok());
        let err = parse_str("SELECT SUM(*) FROM {csv:x} ;").unwrap_err();
        assert!(matches!(
            err,
            ParseError::WildcardAggregate {
                function: AggregateFunction::Sum,
                line: 1,
                column: 8
            }
        ));
    }

    #[test]
    fn test_wildcard_aggregate_rejected_in_order_by() {
        let err = parse_str("SELECT a FROM {csv:x} GROUP BY a ORDER BY max(*) ;").unwrap_err();
        assert!(matches!(err, ParseError::WildcardAggregate { .. }));
    }

    #[test]
    fn test_condition_precedence() {
        let plan = select("SELECT * FROM {csv:x} WHERE a == 1 OR NOT b == 2 AND c == 3 ;");
        let Some(Condition::Or(left, right)) = plan.filter else {
            panic!("expected OR at the root");
        };
        assert!(matches!(*left, Condition::Compare { .. }));
        let Condition::And(not, _) = *right else {
            panic!("expected AND under OR");
        };
        assert!(matches!(*not, Condition::Not(_)));
    }

    #[test]
    fn test_parenthesised_condition_and_like() {
        let plan = select("SELECT * FROM {csv:x} WHERE (a < 1 OR a > 5) AND name LIKE \"J.*\" ;");
        let Some(Condition::And(left, right)) = plan.filter else {
            panic!("expected AND at the root");
        };
        assert!(matches!(*left, Condition::Or(_, _)));
        assert_eq!(
            *right,
            Condition::Like {
                left: Operand::Column(name("name")),
                pattern: "J.*".to_string(),
            }
        );
    }

    #[test]
    fn test_join() {
        let plan = select(
            "SELECT l.name, r.total FROM {csv:users} AS l INNER JOIN {csv:orders} r \
             ON l.id == r.user_id ;",
        );
        let FromClause::Join(join) = plan.from else {
            panic!("expected join");
        };
        assert_eq!(join.left.alias.as_deref(), Some("l"));
        assert_eq!(join.right.alias.as_deref(), Some("r"));
        assert_eq!(join.right.source, DataSource::new("csv", "orders"));
        assert_eq!(
            join.condition,
            Condition::Compare {
                left: Operand::Column(name("l.id")),
                op: ComparisonOp::Eq,
                right: Operand::Column(name("r.user_id")),
            }
        );
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_str("SELECT * FROM {csv:x}").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken {
                found: TokenKind::Eof,
                ..
            }
        ));
    }

    #[test]
    fn test_datasource_without_separator() {
        let err = parse_str("SELECT * FROM {people} ;").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDataSource { .. }));
    }

    #[test]
    fn test_negative_limit_rejected() {
        let err = parse_str("SELECT * FROM {csv:x} LIMIT -3 ;").unwrap_err();
        assert!(matches!(err, ParseError::InvalidRowCount { count: -3, .. }));
    }

    #[test]
    fn test_insert() {
        let stmt = parse_str("INSERT INTO {csv|out.csv} (id, [full name]) VALUES (1, \"a\"), (2, \"b\");")
            .unwrap();
        let Statement::Insert(plan) = stmt else {
            panic!("expected INSERT");
        };
        assert_eq!(plan.destination, DataSource::new("csv", "out.csv"));
        assert_eq!(plan.columns, Some(vec![name("id"), name("full name")]));
        assert_eq!(
            plan.rows,
            vec![
                vec![Literal::Integer(1), Literal::String("a".to_string())],
                vec![Literal::Integer(2), Literal::String("b".to_string())],
            ]
        );
    }

    #[test]
    fn test_update_and_delete_parse() {
        let stmt = parse_str("UPDATE {csv:x} SET a == 1, b == \"z\" WHERE c > 2 ;").unwrap();
        let Statement::Update(plan) = stmt else {
            panic!("expected UPDATE");
        };
        assert_eq!(plan.assignments.len(), 2);
        assert!(plan.filter.is_some());

        assert!(matches!(
            parse_str("DELETE FROM {csv:x} WHERE a == 1").unwrap(),
            Statement::Delete(_)
        ));
        assert!(matches!(
            parse_str("DELETE FROM {csv:x} ;").unwrap(),
            Statement::Delete(_)
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_str("").unwrap(), Statement::Empty);
        assert_eq!(parse_str("/* nothing */").unwrap(), Statement::Empty);
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_str("SELECT * FROM {csv:x} ; SELECT").unwrap_err();
        assert_eq!(err.column(), 25);
    }
}
