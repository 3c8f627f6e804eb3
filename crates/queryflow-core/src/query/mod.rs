/// Query engine module
///
/// Statement compilation (lexing and parsing) and execution.
/// Aggregation kernels
#[allow(missing_docs)]
pub mod aggregate;
/// Abstract Syntax Tree types
#[allow(missing_docs)]
pub mod ast;
/// Condition evaluator
pub mod condition;
/// Statement executor
#[allow(missing_docs)]
pub mod executor;
mod insert;
/// Inner join evaluator
pub mod join;
/// Statement lexer
#[allow(missing_docs)]
pub mod lexer;
/// Statement parser
#[allow(missing_docs)]
pub mod parser;

// Re-export main types
pub use ast::*;
pub use executor::{transform_select, Executor};
pub use lexer::{tokenize, LexError, Lexer, Token, TokenKind};
pub use parser::{parse, ParseError, Parser};

use crate::error::CompileError;
use tracing::debug;

/// Compile query text into an executable plan.
///
/// Empty or comment-only text compiles to [`Statement::Empty`].
pub fn compile(text: &str) -> Result<Statement, CompileError> {
    let tokens = tokenize(text)?;
    debug!(tokens = tokens.len(), "tokenized statement");
    let statement = parse(tokens)?;
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_reports_position() {
        let err = compile("SELECT *\nFROM {csv:x} WHERE age 3 ;").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
        assert_eq!((err.line(), err.column()), (2, 24));

        let err = compile("SELECT # FROM {csv:x} ;").unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
        assert_eq!(err.to_string(), "Scanning error: Illegal character '#' at line 1, column 8");
    }

    #[test]
    fn test_plan_display_recompiles() {
        let text = "SELECT DISTINCT dept, count(*) AS n FROM {csv:people.csv} AS p \
                    WHERE (age >= 18 AND name LIKE \"A.*\") OR NOT [2] == \"x\" \
                    GROUP BY dept ORDER BY n DESC TAIL 3 ;";
        let plan = compile(text).unwrap();
        assert_eq!(compile(&plan.to_string()).unwrap(), plan);
    }

    #[test]
    fn test_reserved_names_render_bracketed() {
        let text = "SELECT [sum], max([count]) AS [from], [by.x] AS [my col] \
                    FROM {csv:a.csv} AS [order] INNER JOIN {csv:b.csv} AS [select] \
                    ON [order.sum] == [select.sum] ORDER BY [from] ;";
        let plan = compile(text).unwrap();
        let rendered = plan.to_string();
        assert!(rendered.contains("[sum]"), "{}", rendered);
        assert!(rendered.contains("AS [order]"), "{}", rendered);
        assert_eq!(compile(&rendered).unwrap(), plan);
    }

    #[test]
    fn test_plan_survives_bincode() {
        let plan = compile(
            "SELECT l.name, sum(r.total) FROM {csv:u} AS l INNER JOIN {json:o} AS r \
             ON l.id == r.uid GROUP BY l.name ;",
        )
        .unwrap();
        let bytes = bincode::serialize(&plan).unwrap();
        let decoded: Statement = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, plan);
    }
}
