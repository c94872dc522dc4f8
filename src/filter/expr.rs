//! Drop-expression language
//!
//! A small boolean expression grammar evaluated against records:
//!
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr ("or" and_expr)*
//! and_expr := atom ("and" atom)*
//! atom     := cmp | "(" expr ")"
//! cmp      := field op value
//! field    := id ("." id)*
//! op       := "==" | "!=" | ">" | ">=" | "<" | "<="
//! value    := number | string | "true" | "false" | "null"
//! ```
//!
//! A record is dropped when its expression evaluates true. Hand-written
//! recursive descent over a tagged AST; the grammar is too small to be
//! worth a parser dependency.

use serde_json::Value;

use crate::errors::{DumpError, Result};
use crate::models::Record;

/// Compiled drop expression.
#[derive(Debug, Clone)]
pub struct ExpressionFilter {
    expr: Expr,
}

impl ExpressionFilter {
    /// Parse an expression like `id == 1 and status != 'Draft'`.
    pub fn parse(input: &str) -> Result<ExpressionFilter> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(syntax(format!(
                "unexpected trailing input at token {}",
                parser.pos + 1
            )));
        }
        Ok(ExpressionFilter { expr })
    }

    /// Whether the record should be dropped.
    pub fn matches(&self, record: &Record) -> bool {
        // Field access works on the serialized form, which is where dot
        // paths and nested attributes are uniform across record types.
        let value = serde_json::to_value(record).unwrap_or(Value::Null);
        self.expr.evaluate(&value)
    }
}

#[derive(Debug, Clone)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp {
        field: Vec<String>,
        op: CmpOp,
        value: Literal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl Expr {
    fn evaluate(&self, record: &Value) -> bool {
        match self {
            Expr::And(left, right) => left.evaluate(record) && right.evaluate(record),
            Expr::Or(left, right) => left.evaluate(record) || right.evaluate(record),
            Expr::Cmp { field, op, value } => compare(resolve(record, field), *op, value),
        }
    }
}

/// Walk a dot path into the record. Missing fields resolve to null, which
/// is indistinguishable from an explicitly absent value.
fn resolve<'a>(value: &'a Value, path: &[String]) -> &'a Value {
    static NULL: Value = Value::Null;
    let mut current = value;
    for segment in path {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &NULL,
        }
    }
    current
}

fn compare(left: &Value, op: CmpOp, right: &Literal) -> bool {
    use CmpOp::*;

    // Null comparisons: equality tests presence, ordering never matches.
    if matches!(right, Literal::Null) {
        return match op {
            Eq => left.is_null(),
            Ne => !left.is_null(),
            _ => false,
        };
    }
    if left.is_null() {
        return matches!(op, Ne);
    }

    match right {
        Literal::Str(expected) => {
            // A non-string left side is coerced to its string form.
            let coerced;
            let actual = match left {
                Value::String(s) => s.as_str(),
                Value::Number(n) => {
                    coerced = n.to_string();
                    &coerced
                }
                Value::Bool(b) => {
                    if *b {
                        "true"
                    } else {
                        "false"
                    }
                }
                // arrays and objects never compare to strings
                _ => return matches!(op, Ne),
            };
            ordered(actual.cmp(expected.as_str()), op)
        }
        Literal::Int(expected) => match left {
            Value::Number(n) => match n.as_i64() {
                Some(actual) => ordered(actual.cmp(expected), op),
                None => numeric(n.as_f64(), Some(*expected as f64), op),
            },
            _ => matches!(op, Ne),
        },
        Literal::Float(expected) => match left {
            Value::Number(n) => numeric(n.as_f64(), Some(*expected), op),
            _ => matches!(op, Ne),
        },
        Literal::Bool(expected) => match left {
            Value::Bool(actual) => match op {
                Eq => actual == expected,
                Ne => actual != expected,
                _ => false,
            },
            _ => matches!(op, Ne),
        },
        Literal::Null => unreachable!("handled above"),
    }
}

fn ordered(ordering: std::cmp::Ordering, op: CmpOp) -> bool {
    use std::cmp::Ordering::*;
    match op {
        CmpOp::Eq => ordering == Equal,
        CmpOp::Ne => ordering != Equal,
        CmpOp::Gt => ordering == Greater,
        CmpOp::Ge => ordering != Less,
        CmpOp::Lt => ordering == Less,
        CmpOp::Le => ordering != Greater,
    }
}

fn numeric(left: Option<f64>, right: Option<f64>, op: CmpOp) -> bool {
    let (Some(left), Some(right)) = (left, right) else {
        // incomparable values keep the record
        return false;
    };
    match left.partial_cmp(&right) {
        Some(ordering) => ordered(ordering, op),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(CmpOp),
    Dot,
    LParen,
    RParen,
}

fn syntax(message: impl Into<String>) -> DumpError {
    DumpError::FilterSyntax(message.into())
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Op(CmpOp::Eq)),
                    _ => return Err(syntax("expected '==' ('=' alone is not an operator)")),
                }
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Op(CmpOp::Ne)),
                    _ => return Err(syntax("expected '!='")),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Le));
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => literal.push(escaped),
                            None => return Err(syntax("unterminated string literal")),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => literal.push(ch),
                        None => return Err(syntax("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '-' | '0'..='9' => {
                let mut number = String::new();
                if c == '-' {
                    number.push(c);
                    chars.next();
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if number.contains('.') {
                    let value = number
                        .parse::<f64>()
                        .map_err(|_| syntax(format!("invalid number: {number}")))?;
                    tokens.push(Token::Float(value));
                } else {
                    let value = number
                        .parse::<i64>()
                        .map_err(|_| syntax(format!("invalid number: {number}")))?;
                    tokens.push(Token::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(syntax(format!("unexpected character: {other:?}"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr> {
        let mut left = self.and_expression()?;
        while matches!(self.peek(), Some(Token::Ident(kw)) if kw == "or") {
            self.next();
            let right = self.and_expression()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Expr> {
        let mut left = self.atom()?;
        while matches!(self.peek(), Some(Token::Ident(kw)) if kw == "and") {
            self.next();
            let right = self.atom()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn atom(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let expr = self.expression()?;
            match self.next() {
                Some(Token::RParen) => return Ok(expr),
                _ => return Err(syntax("expected ')'")),
            }
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let field = self.field_path()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => return Err(syntax(format!("expected comparison operator, got {other:?}"))),
        };
        let value = self.literal()?;
        Ok(Expr::Cmp { field, op, value })
    }

    fn field_path(&mut self) -> Result<Vec<String>> {
        let mut path = match self.next() {
            Some(Token::Ident(name)) => vec![name],
            other => return Err(syntax(format!("expected field name, got {other:?}"))),
        };
        while self.peek() == Some(&Token::Dot) {
            self.next();
            match self.next() {
                Some(Token::Ident(name)) => path.push(name),
                other => return Err(syntax(format!("expected field name after '.', got {other:?}"))),
            }
        }
        Ok(path)
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.next() {
            Some(Token::Int(value)) => Ok(Literal::Int(value)),
            Some(Token::Float(value)) => Ok(Literal::Float(value)),
            Some(Token::Str(value)) => Ok(Literal::Str(value)),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Literal::Bool(true)),
                "false" => Ok(Literal::Bool(false)),
                "null" => Ok(Literal::Null),
                other => Err(syntax(format!("expected a value, got {other:?}"))),
            },
            other => Err(syntax(format!("expected a value, got {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artist, Label, LabelRef, Record};

    fn artist(id: u64, name: Option<&str>) -> Record {
        Record::Artist(Artist {
            id,
            name: name.map(str::to_string),
            ..Default::default()
        })
    }

    fn matches(expr: &str, record: &Record) -> bool {
        ExpressionFilter::parse(expr).unwrap().matches(record)
    }

    #[test]
    fn test_equality() {
        let record = artist(1, Some("A"));
        assert!(matches("id == 1", &record));
        assert!(!matches("id == 2", &record));
        assert!(matches("name == 'A'", &record));
        assert!(matches("name != \"B\"", &record));
    }

    #[test]
    fn test_ordering() {
        let record = artist(10, None);
        assert!(matches("id > 5", &record));
        assert!(matches("id >= 10", &record));
        assert!(!matches("id < 10", &record));
        assert!(matches("id <= 10", &record));
    }

    #[test]
    fn test_null_semantics() {
        let record = artist(1, None);
        // name is absent: == null matches, != null does not
        assert!(matches("name == null", &record));
        assert!(!matches("name != null", &record));
        // ordering against null never matches
        assert!(!matches("name > 'A'", &record));
        assert!(!matches("name < 'A'", &record));
        // absent field vs a value
        assert!(!matches("name == 'A'", &record));
        assert!(matches("name != 'A'", &record));

        let record = artist(1, Some("A"));
        assert!(!matches("name == null", &record));
        assert!(matches("name != null", &record));
    }

    #[test]
    fn test_string_coercion_of_left_side() {
        let record = artist(45, None);
        // number coerced to its string form when compared to a string
        assert!(matches("id == '45'", &record));
        assert!(!matches("id == '046'", &record));
    }

    #[test]
    fn test_type_mismatch_keeps_record() {
        let record = artist(1, Some("A"));
        // string field vs number literal: ordering is incomparable
        assert!(!matches("name > 5", &record));
        assert!(!matches("name == 5", &record));
        assert!(matches("name != 5", &record));
    }

    #[test]
    fn test_and_or_precedence() {
        let record = artist(1, Some("A"));
        // and binds tighter than or
        assert!(matches("id == 2 and name == 'B' or id == 1", &record));
        assert!(!matches("id == 2 or name == 'B' and id == 1", &record));
        // parentheses override
        assert!(matches("(id == 2 or name == 'A') and id == 1", &record));
    }

    #[test]
    fn test_dot_path() {
        let record = Record::Label(Label {
            id: 1,
            parent_label: Some(LabelRef {
                id: 500,
                name: "EMI Group".into(),
            }),
            ..Default::default()
        });
        assert!(matches("parent_label.id == 500", &record));
        assert!(matches("parent_label.name == 'EMI Group'", &record));
        assert!(!matches("parent_label.missing != null", &record));
    }

    #[test]
    fn test_boolean_literal() {
        let mut release = crate::models::Release {
            id: 1,
            ..Default::default()
        };
        release.is_main_release = Some(true);
        let record = Record::Release(release);
        assert!(matches("is_main_release == true", &record));
        assert!(!matches("is_main_release == false", &record));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(ExpressionFilter::parse("id = 1").is_err());
        assert!(ExpressionFilter::parse("id ==").is_err());
        assert!(ExpressionFilter::parse("(id == 1").is_err());
        assert!(ExpressionFilter::parse("id == 1 extra").is_err());
        assert!(ExpressionFilter::parse("== 1").is_err());
    }

    #[test]
    fn test_float_and_negative_numbers() {
        let mut master = crate::models::MasterRelease {
            id: 1,
            year: Some(1969),
            ..Default::default()
        };
        let record = Record::MasterRelease(master.clone());
        assert!(matches("year > 1950.5", &record));

        master.year = Some(-1);
        let record = Record::MasterRelease(master);
        assert!(matches("year == -1", &record));
    }
}
