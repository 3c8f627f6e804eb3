/// Lexer for tokenizing QueryFlow statements
///
/// Converts raw query text into a stream of positioned tokens for parsing.
use crate::query::ast::AggregateFunction;
use std::fmt;

/// Token kinds produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Select,
    From,
    Into,
    Where,
    Like,
    Insert,
    And,
    Or,
    Not,
    Order,
    Group,
    By,
    Asc,
    Desc,
    Limit,
    Tail,
    Values,
    Update,
    Set,
    Delete,
    Distinct,
    As,
    Inner,
    Join,
    On,

    // Aggregate functions
    Aggregate(AggregateFunction),

    // Identifiers
    Identifier(String),
    BracketedIdentifier(String),
    ColumnIndex(usize),

    // Literals
    String(String),
    Integer(i64),
    Float(f64),
    /// `{type:path}` without the braces
    DataSource(String),

    // Operators
    Eq, // ==
    Ne, // != or <>
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Punctuation
    LeftParen,
    RightParen,
    Semicolon,
    Comma,

    // End of input
    Eof,
}

impl TokenKind {
    pub(crate) fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "select" => TokenKind::Select,
            "from" => TokenKind::From,
            "into" => TokenKind::Into,
            "where" => TokenKind::Where,
            "like" => TokenKind::Like,
            "insert" => TokenKind::Insert,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "order" => TokenKind::Order,
            "group" => TokenKind::Group,
            "by" => TokenKind::By,
            "asc" => TokenKind::Asc,
            "desc" => TokenKind::Desc,
            "limit" => TokenKind::Limit,
            "tail" => TokenKind::Tail,
            "values" => TokenKind::Values,
            "update" => TokenKind::Update,
            "set" => TokenKind::Set,
            "delete" => TokenKind::Delete,
            "distinct" => TokenKind::Distinct,
            "as" => TokenKind::As,
            "inner" => TokenKind::Inner,
            "join" => TokenKind::Join,
            "on" => TokenKind::On,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Select => write!(f, "SELECT"),
            TokenKind::From => write!(f, "FROM"),
            TokenKind::Into => write!(f, "INTO"),
            TokenKind::Where => write!(f, "WHERE"),
            TokenKind::Like => write!(f, "LIKE"),
            TokenKind::Insert => write!(f, "INSERT"),
            TokenKind::And => write!(f, "AND"),
            TokenKind::Or => write!(f, "OR"),
            TokenKind::Not => write!(f, "NOT"),
            TokenKind::Order => write!(f, "ORDER"),
            TokenKind::Group => write!(f, "GROUP"),
            TokenKind::By => write!(f, "BY"),
            TokenKind::Asc => write!(f, "ASC"),
            TokenKind::Desc => write!(f, "DESC"),
            TokenKind::Limit => write!(f, "LIMIT"),
            TokenKind::Tail => write!(f, "TAIL"),
            TokenKind::Values => write!(f, "VALUES"),
            TokenKind::Update => write!(f, "UPDATE"),
            TokenKind::Set => write!(f, "SET"),
            TokenKind::Delete => write!(f, "DELETE"),
            TokenKind::Distinct => write!(f, "DISTINCT"),
            TokenKind::As => write!(f, "AS"),
            TokenKind::Inner => write!(f, "INNER"),
            TokenKind::Join => write!(f, "JOIN"),
            TokenKind::On => write!(f, "ON"),
            TokenKind::Aggregate(func) => write!(f, "{}", func),
            TokenKind::Identifier(id) => write!(f, "{}", id),
            TokenKind::BracketedIdentifier(id) => write!(f, "[{}]", id),
            TokenKind::ColumnIndex(i) => write!(f, "[{}]", i),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Integer(i) => write!(f, "{}", i),
            TokenKind::Float(fl) => write!(f, "{}", fl),
            TokenKind::DataSource(ds) => write!(f, "{{{}}}", ds),
            TokenKind::Eq => write!(f, "=="),
            TokenKind::Ne => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Le => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Ge => write!(f, ">="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token and where it starts (1-based line and column)
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Illegal character in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub character: char,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Illegal character '{}' at line {}, column {}",
            self.character.escape_debug(),
            self.line,
            self.column
        )
    }
}

impl std::error::Error for LexError {}

/// Tokenize `input`, ending with an [`TokenKind::Eof`] token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}

/// Lexer state
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    line_start: usize,
}

impl Lexer {
    /// Create a new lexer from input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Tokenize entire input into vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();

        let (line, column) = (self.line, self.column());
        let kind = match self.current_char() {
            None => TokenKind::Eof,
            Some(ch) => self.read_kind(ch)?,
        };
        Ok(Token { kind, line, column })
    }

    fn read_kind(&mut self, ch: char) -> Result<TokenKind, LexError> {
        match ch {
            '"' => return self.read_string(),
            '{' => return self.read_datasource(),
            '[' => return self.read_bracketed(),
            '+' | '-' | '.' => {
                if let Some(kind) = self.read_number()? {
                    return Ok(kind);
                }
            }
            c if c.is_ascii_digit() => {
                if let Some(kind) = self.read_number()? {
                    return Ok(kind);
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => return Ok(self.read_word()),
            _ => {}
        }

        let next = self.peek_char();
        let (kind, width) = match (ch, next) {
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::Ne, 2),
            ('<', Some('>')) => (TokenKind::Ne, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('(', _) => (TokenKind::LeftParen, 1),
            (')', _) => (TokenKind::RightParen, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            (',', _) => (TokenKind::Comma, 1),
            _ => return Err(self.error_here(ch)),
        };
        self.position += width;
        Ok(kind)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn char_at(&self, position: usize) -> Option<char> {
        self.input.get(position).copied()
    }

    fn column(&self) -> usize {
        self.position - self.line_start + 1
    }

    fn error_here(&self, character: char) -> LexError {
        LexError {
            character,
            line: self.line,
            column: self.column(),
        }
    }

    /// Consume one character, tracking line breaks.
    fn advance(&mut self) {
        if self.current_char() == Some('\n') {
            self.line += 1;
            self.line_start = self.position + 1;
        }
        self.position += 1;
    }

    /// Skip whitespace, newlines and complete block comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.current_char() {
                Some(' ' | '\t' | '\r' | '\n') => self.advance(),
                Some('/') if self.peek_char() == Some('*') => {
                    let Some(end) = self.comment_end() else {
                        // Unterminated: the '/' lexes as an operator.
                        return;
                    };
                    while self.position < end {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Position just past the `*/` closing the comment at the cursor
    fn comment_end(&self) -> Option<usize> {
        let mut pos = self.position + 2;
        while pos + 1 < self.input.len() {
            if self.input[pos] == '*' && self.input[pos + 1] == '/' {
                return Some(pos + 2);
            }
            pos += 1;
        }
        None
    }

    fn read_string(&mut self) -> Result<TokenKind, LexError> {
        let quote = self.error_here('"');
        let start = self.position + 1;
        let mut end = start;
        loop {
            match self.char_at(end) {
                Some('"') => break,
                Some('\n') | None => return Err(quote),
                Some(_) => end += 1,
            }
        }
        let text: String = self.input[start..end].iter().collect();
        self.position = end + 1;
        Ok(TokenKind::String(text))
    }

    fn read_datasource(&mut self) -> Result<TokenKind, LexError> {
        let brace = self.error_here('{');
        let start = self.position + 1;
        let mut end = start;
        loop {
            match self.char_at(end) {
                Some('}') if end > start => break,
                Some(',' | '{' | '}' | '[') | None => return Err(brace),
                Some(_) => end += 1,
            }
        }
        let text: String = self.input[start..end].iter().collect();
        while self.position <= end {
            self.advance();
        }
        Ok(TokenKind::DataSource(text))
    }

    /// `[123]` positional reference or `[name with spaces]`
    fn read_bracketed(&mut self) -> Result<TokenKind, LexError> {
        let bracket = self.error_here('[');
        let start = self.position + 1;
        let mut end = start;
        while self.char_at(end).is_some_and(|c| c.is_ascii_digit()) {
            end += 1;
        }
        if end > start && self.char_at(end) == Some(']') {
            let digits: String = self.input[start..end].iter().collect();
            let index = digits.parse::<usize>().map_err(|_| bracket.clone())?;
            self.position = end + 1;
            return Ok(TokenKind::ColumnIndex(index));
        }

        if !self
            .char_at(start)
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return Err(bracket);
        }
        end = start + 1;
        while self
            .char_at(end)
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '.')
        {
            end += 1;
        }
        if self.char_at(end) != Some(']') {
            return Err(bracket);
        }
        let name: String = self.input[start..end].iter().collect();
        self.position = end + 1;
        Ok(TokenKind::BracketedIdentifier(name))
    }

    /// Numeric literal at the cursor, or `None` when the sign or dot is an
    /// operator on its own.
    ///
    /// A `-` followed by `0` is not a negative integer; it lexes as a minus.
    fn read_number(&mut self) -> Result<Option<TokenKind>, LexError> {
        let start = self.position;
        let mut pos = start;
        let sign = match self.char_at(pos) {
            Some(c @ ('+' | '-')) => {
                pos += 1;
                Some(c)
            }
            _ => None,
        };

        let int_start = pos;
        while self.char_at(pos).is_some_and(|c| c.is_ascii_digit()) {
            pos += 1;
        }
        let int_digits = pos - int_start;

        let mut frac_digits = 0;
        let has_dot = self.char_at(pos) == Some('.');
        if has_dot {
            let frac_start = pos + 1;
            let mut frac_end = frac_start;
            while self.char_at(frac_end).is_some_and(|c| c.is_ascii_digit()) {
                frac_end += 1;
            }
            frac_digits = frac_end - frac_start;
            if int_digits + frac_digits > 0 {
                pos = frac_end;
            }
        }

        if has_dot && int_digits + frac_digits > 0 {
            let text: String = self.input[start..pos].iter().collect();
            // Overflowing literals would render as `inf`, which reads back as a name
            let value = text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| self.error_here(self.input[start]))?;
            self.position = pos;
            return Ok(Some(TokenKind::Float(value)));
        }
        if int_digits == 0 {
            return Ok(None);
        }
        if sign == Some('-') && self.char_at(int_start) == Some('0') {
            return Ok(None);
        }

        let text: String = self.input[start..int_start + int_digits].iter().collect();
        let value = text
            .parse::<i64>()
            .map_err(|_| self.error_here(self.input[start]))?;
        self.position = int_start + int_digits;
        Ok(Some(TokenKind::Integer(value)))
    }

    /// Keyword, aggregation function or (possibly dotted) identifier
    fn read_word(&mut self) -> TokenKind {
        let start = self.position;
        let mut pos = start;
        loop {
            while self
                .char_at(pos)
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                pos += 1;
            }
            let continues = self.char_at(pos) == Some('.')
                && self
                    .char_at(pos + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if !continues {
                break;
            }
            pos += 1;
        }

        let text: String = self.input[start..pos].iter().collect();
        self.position = pos;

        if text.contains('.') {
            return TokenKind::Identifier(text);
        }
        if let Some(keyword) = TokenKind::keyword(&text) {
            return keyword;
        }
        match AggregateFunction::from_name(&text) {
            Some(func) => TokenKind::Aggregate(func),
            None => TokenKind::Identifier(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(
            kinds("SELECT * FROM {csv:people.csv} ;"),
            vec![
                TokenKind::Select,
                TokenKind::Star,
                TokenKind::From,
                TokenKind::DataSource("csv:people.csv".to_string()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive_whole_words() {
        assert_eq!(
            kinds("select Distinct selection"),
            vec![
                TokenKind::Select,
                TokenKind::Distinct,
                TokenKind::Identifier("selection".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_aggregate_functions_lowercased() {
        assert_eq!(
            kinds("SUM(x) NUnique sums"),
            vec![
                TokenKind::Aggregate(AggregateFunction::Sum),
                TokenKind::LeftParen,
                TokenKind::Identifier("x".to_string()),
                TokenKind::RightParen,
                TokenKind::Aggregate(AggregateFunction::NUnique),
                TokenKind::Identifier("sums".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bracketed_never_aggregate() {
        assert_eq!(
            kinds("[sum] [count of rows] [3] {csv:max}"),
            vec![
                TokenKind::BracketedIdentifier("sum".to_string()),
                TokenKind::BracketedIdentifier("count of rows".to_string()),
                TokenKind::ColumnIndex(3),
                TokenKind::DataSource("csv:max".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_qualified_identifier() {
        assert_eq!(
            kinds("l.id == r.user_id"),
            vec![
                TokenKind::Identifier("l.id".to_string()),
                TokenKind::Eq,
                TokenKind::Identifier("r.user_id".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != <> < <= > >= + * / % ( ) ; ,"),
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Ne,
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Plus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 -7 +3 3.5 -.5 2. 0"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Integer(-7),
                TokenKind::Integer(3),
                TokenKind::Float(3.5),
                TokenKind::Float(-0.5),
                TokenKind::Float(2.0),
                TokenKind::Integer(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_negative_zero_is_minus_then_zero() {
        assert_eq!(
            kinds("-0"),
            vec![TokenKind::Minus, TokenKind::Integer(0), TokenKind::Eof]
        );
    }

    #[test]
    fn test_float_overflow_rejected() {
        let text = format!("x > {}.0", "9".repeat(400));
        let err = tokenize(&text).unwrap_err();
        assert_eq!(err.character, '9');
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_comments_skipped_and_lines_counted() {
        let tokens = tokenize("/* first\nsecond */ SELECT\n  *").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Select);
        assert_eq!((tokens[0].line, tokens[0].column), (2, 11));
        assert_eq!(tokens[1].kind, TokenKind::Star);
        assert_eq!((tokens[1].line, tokens[1].column), (3, 3));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            kinds("name LIKE \"^A.*\""),
            vec![
                TokenKind::Identifier("name".to_string()),
                TokenKind::Like,
                TokenKind::String("^A.*".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_illegal_character_position() {
        let err = tokenize("SELECT *\nFROM $").unwrap_err();
        assert_eq!(
            err,
            LexError {
                character: '$',
                line: 2,
                column: 6
            }
        );
    }

    #[test]
    fn test_single_equals_is_illegal() {
        let err = tokenize("a = 1").unwrap_err();
        assert_eq!(err.character, '=');
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x == \"abc").unwrap_err();
        assert_eq!(err.character, '"');
        assert_eq!(err.column, 6);
    }

    #[test]
    fn test_datasource_rejects_comma() {
        assert!(tokenize("{csv:a,b}").is_err());
    }

    #[test]
    fn test_carriage_return_ignored() {
        assert_eq!(
            kinds("SELECT\r\n*"),
            vec![TokenKind::Select, TokenKind::Star, TokenKind::Eof]
        );
    }
}
