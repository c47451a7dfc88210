//! Branch condition expressions.
//!
//! A condition is a flat list of comparisons joined by `&&` and `||`, where
//! `&&` binds tighter. Parentheses are not part of the grammar.
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := cmp ( "&&" cmp )*
//! cmp     := operand op operand
//! op      := "==" | "!=" | ">=" | "<=" | ">" | "<"
//! operand := variable | number | string | "true" | "false"
//! ```
//!
//! Variables look like `node_1.certificate.daysLeft`; strings use single or
//! double quotes.

use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("expression is empty")]
    Empty,

    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("expected {expected} at offset {offset}")]
    Expected { expected: &'static str, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Variable(String),
    Number(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => f.write_str(name),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: Operand,
    pub op: CompareOp,
    pub rhs: Operand,
}

/// A parsed condition in disjunctive normal form: `any` of `all` of comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub any: Vec<Vec<Comparison>>,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ConditionError::Empty);
        }
        Parser { tokens, pos: 0, len: source.len() }.parse()
    }

    /// Every variable the condition reads, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.any
            .iter()
            .flatten()
            .flat_map(|c| [&c.lhs, &c.rhs])
            .filter_map(|o| match o {
                Operand::Variable(name) => Some(name.as_str()),
                _ => None,
            })
    }
}

impl FromStr for Condition {
    type Err = ConditionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical spelling; two conditions that print the same are the same.
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, all) in self.any.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            for (j, c) in all.iter().enumerate() {
                if j > 0 {
                    f.write_str(" && ")?;
                }
                write!(f, "{} {} {}", c.lhs, c.op.as_str(), c.rhs)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Operand(Operand),
    Op(CompareOp),
    And,
    Or,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '&' | '|' | '=' | '!' | '>' | '<' => {
                chars.next();
                match c {
                    '&' if eat_char(&mut chars, '&') => Token::And,
                    '|' if eat_char(&mut chars, '|') => Token::Or,
                    '=' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Eq),
                    '!' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Ne),
                    '>' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Ge),
                    '<' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Le),
                    '>' => Token::Op(CompareOp::Gt),
                    '<' => Token::Op(CompareOp::Lt),
                    found => return Err(ConditionError::UnexpectedChar { found, offset }),
                }
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, q)) if q == c => break,
                        Some((_, ch)) => text.push(ch),
                        None => return Err(ConditionError::UnterminatedString(offset)),
                    }
                }
                Token::Operand(Operand::Text(text))
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut text = String::from(c);
                while let Some((_, ch)) = chars.next_if(|&(_, n)| n.is_ascii_digit() || n == '.') {
                    text.push(ch);
                }
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedChar { found: c, offset })?;
                Token::Operand(Operand::Number(number))
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut text = String::new();
                while let Some((_, ch)) = chars.next_if(|&(_, n)| {
                    n.is_ascii_alphanumeric() || matches!(n, '_' | '.' | '#' | '$' | '{' | '}')
                }) {
                    text.push(ch);
                }
                match text.as_str() {
                    "true" => Token::Operand(Operand::Bool(true)),
                    "false" => Token::Operand(Operand::Bool(false)),
                    _ => Token::Operand(Operand::Variable(text)),
                }
            }
            found => return Err(ConditionError::UnexpectedChar { found, offset }),
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

fn eat_char(chars: &mut Peekable<CharIndices<'_>>, want: char) -> bool {
    chars.next_if(|&(_, n)| n == want).is_some()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Condition, ConditionError> {
        let mut any = vec![self.conjunction()?];
        while self.eat(&Token::Or) {
            any.push(self.conjunction()?);
        }
        match self.tokens.get(self.pos) {
            None => Ok(Condition { any }),
            Some(&(offset, _)) => Err(ConditionError::Expected { expected: "'&&' or '||'", offset }),
        }
    }

    fn conjunction(&mut self) -> Result<Vec<Comparison>, ConditionError> {
        let mut all = vec![self.comparison()?];
        while self.eat(&Token::And) {
            all.push(self.comparison()?);
        }
        Ok(all)
    }

    fn comparison(&mut self) -> Result<Comparison, ConditionError> {
        let lhs = self.operand()?;
        let op = match self.next() {
            Some((_, Token::Op(op))) => op,
            Some((offset, _)) => {
                return Err(ConditionError::Expected { expected: "a comparison operator", offset })
            }
            None => {
                return Err(ConditionError::Expected {
                    expected: "a comparison operator",
                    offset: self.len,
                })
            }
        };
        let rhs = self.operand()?;
        Ok(Comparison { lhs, op, rhs })
    }

    fn operand(&mut self) -> Result<Operand, ConditionError> {
        match self.next() {
            Some((_, Token::Operand(operand))) => Ok(operand),
            Some((offset, _)) => Err(ConditionError::Expected { expected: "an operand", offset }),
            None => Err(ConditionError::Expected { expected: "an operand", offset: self.len }),
        }
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, want: &Token) -> bool {
        match self.tokens.get(self.pos) {
            Some((_, token)) if token == want => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }
}
