//! Environment markers.
//!
//! A marker is a boolean condition over the target environment, written as
//! `os == 'linux' and (arch == 'x86_64' or arch == 'aarch64')`. Comparisons
//! between two values that both parse as versions use version ordering;
//! everything else compares as text. `in` / `not in` test substring
//! containment of the left value in the right one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{Version, VersionReq};

/// A parsed environment condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Compare {
        left: Operand,
        op: MarkerOp,
        right: Operand,
    },
    And(Box<Marker>, Box<Marker>),
    Or(Box<Marker>, Box<Marker>),
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Variable(String),
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Compatible,
    In,
    NotIn,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("unexpected end of marker '{input}'")]
    UnexpectedEnd { input: String },

    #[error("unexpected '{token}' at position {position} in marker '{input}'")]
    UnexpectedToken {
        input: String,
        token: String,
        position: usize,
    },

    #[error("unterminated string at position {position} in marker '{input}'")]
    UnterminatedString { input: String, position: usize },

    #[error("marker '{input}' exceeds {limit} {what}")]
    TooComplex {
        input: String,
        what: &'static str,
        limit: usize,
    },
}

/// Deepest parenthesis nesting accepted
const MAX_NESTING: usize = 32;
/// Most comparisons in one marker
const MAX_COMPARISONS: usize = 256;

/// Key/value description of the platform dependencies are resolved for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetEnvironment {
    values: BTreeMap<String, String>,
}

impl TargetEnvironment {
    /// An environment with no values set
    pub fn new() -> Self {
        Self::default()
    }

    /// The host this process runs on
    pub fn current() -> Self {
        Self::new()
            .with("os", std::env::consts::OS)
            .with("arch", std::env::consts::ARCH)
            .with("family", std::env::consts::FAMILY)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for TargetEnvironment {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Op(MarkerOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Op(op) => write!(f, "{}", op),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, MarkerError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                tokens.push((pos, Token::LParen));
                pos += 1;
            },
            ')' => {
                tokens.push((pos, Token::RParen));
                pos += 1;
            },
            '\'' | '"' => {
                let start = pos;
                let end = chars[pos + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| MarkerError::UnterminatedString {
                        input: input.to_string(),
                        position: start,
                    })?;
                let text: String = chars[pos + 1..pos + 1 + end].iter().collect();
                tokens.push((start, Token::Str(text)));
                pos += end + 2;
            },
            '=' | '!' | '<' | '>' | '~' => {
                let next = chars.get(pos + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (MarkerOp::Eq, 2),
                    ('!', Some('=')) => (MarkerOp::NotEq, 2),
                    ('<', Some('=')) => (MarkerOp::LtEq, 2),
                    ('>', Some('=')) => (MarkerOp::GtEq, 2),
                    ('~', Some('=')) => (MarkerOp::Compatible, 2),
                    ('<', _) => (MarkerOp::Lt, 1),
                    ('>', _) => (MarkerOp::Gt, 1),
                    _ => {
                        return Err(MarkerError::UnexpectedToken {
                            input: input.to_string(),
                            token: c.to_string(),
                            position: pos,
                        })
                    },
                };
                tokens.push((pos, Token::Op(op)));
                pos += width;
            },
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let start = pos;
                while pos < chars.len()
                    && (chars[pos].is_ascii_alphanumeric() || matches!(chars[pos], '_' | '.' | '-'))
                {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                };
                tokens.push((start, token));
            },
            other => {
                return Err(MarkerError::UnexpectedToken {
                    input: input.to_string(),
                    token: other.to_string(),
                    position: pos,
                })
            },
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    comparisons: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<(usize, Token), MarkerError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| MarkerError::UnexpectedEnd {
                input: self.input.to_string(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn too_complex(&self, what: &'static str, limit: usize) -> MarkerError {
        MarkerError::TooComplex {
            input: self.input.to_string(),
            what,
            limit,
        }
    }

    fn unexpected(&self, position: usize, token: &Token) -> MarkerError {
        MarkerError::UnexpectedToken {
            input: self.input.to_string(),
            token: token.to_string(),
            position,
        }
    }

    fn parse_or(&mut self) -> Result<Marker, MarkerError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Marker::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Marker, MarkerError> {
        let mut left = self.parse_atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_atom()?;
            left = Marker::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_atom(&mut self) -> Result<Marker, MarkerError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.depth += 1;
            if self.depth > MAX_NESTING {
                return Err(self.too_complex("levels of parentheses", MAX_NESTING));
            }
            let inner = self.parse_or()?;
            let (position, token) = self.next()?;
            if token != Token::RParen {
                return Err(self.unexpected(position, &token));
            }
            self.depth -= 1;
            return Ok(inner);
        }

        self.comparisons += 1;
        if self.comparisons > MAX_COMPARISONS {
            return Err(self.too_complex("comparisons", MAX_COMPARISONS));
        }
        let left = self.parse_operand()?;
        let op = self.parse_op()?;
        let right = self.parse_operand()?;
        Ok(Marker::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, MarkerError> {
        match self.next()? {
            (_, Token::Ident(name)) => Ok(Operand::Variable(name)),
            (_, Token::Str(text)) => Ok(Operand::Literal(text)),
            (position, token) => Err(self.unexpected(position, &token)),
        }
    }

    fn parse_op(&mut self) -> Result<MarkerOp, MarkerError> {
        match self.next()? {
            (_, Token::Op(op)) => Ok(op),
            (_, Token::In) => Ok(MarkerOp::In),
            (_, Token::Not) => match self.next()? {
                (_, Token::In) => Ok(MarkerOp::NotIn),
                (position, token) => Err(self.unexpected(position, &token)),
            },
            (position, token) => Err(self.unexpected(position, &token)),
        }
    }
}

impl Marker {
    /// Parse a marker expression
    pub fn parse(input: &str) -> Result<Self, MarkerError> {
        let mut parser = Parser {
            input,
            tokens: tokenize(input)?,
            pos: 0,
            depth: 0,
            comparisons: 0,
        };
        let marker = parser.parse_or()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(parser.unexpected(*position, token));
        }
        Ok(marker)
    }

    /// Evaluate against a target environment
    pub fn evaluate(&self, env: &TargetEnvironment) -> bool {
        match self {
            Marker::And(a, b) => a.evaluate(env) && b.evaluate(env),
            Marker::Or(a, b) => a.evaluate(env) || b.evaluate(env),
            Marker::Compare { left, op, right } => {
                compare(left.resolve(env), *op, right.resolve(env))
            },
        }
    }
}

impl Operand {
    fn resolve<'a>(&'a self, env: &'a TargetEnvironment) -> &'a str {
        match self {
            Operand::Variable(name) => env.get(name).unwrap_or(""),
            Operand::Literal(text) => text,
        }
    }
}

fn compare(left: &str, op: MarkerOp, right: &str) -> bool {
    match op {
        MarkerOp::In => return right.contains(left),
        MarkerOp::NotIn => return !right.contains(left),
        MarkerOp::Compatible => {
            return match (Version::from_str(left), VersionReq::parse(&format!("~={}", right))) {
                (Ok(version), Ok(req)) => req.matches(&version),
                _ => false,
            };
        },
        _ => {},
    }

    let ordering = match (Version::from_str(left), Version::from_str(right)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => left.cmp(right),
    };

    match op {
        MarkerOp::Eq => ordering.is_eq(),
        MarkerOp::NotEq => ordering.is_ne(),
        MarkerOp::Lt => ordering.is_lt(),
        MarkerOp::LtEq => ordering.is_le(),
        MarkerOp::Gt => ordering.is_gt(),
        MarkerOp::GtEq => ordering.is_ge(),
        MarkerOp::Compatible | MarkerOp::In | MarkerOp::NotIn => false,
    }
}

impl FromStr for Marker {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MarkerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MarkerOp::Eq => "==",
            MarkerOp::NotEq => "!=",
            MarkerOp::Lt => "<",
            MarkerOp::LtEq => "<=",
            MarkerOp::Gt => ">",
            MarkerOp::GtEq => ">=",
            MarkerOp::Compatible => "~=",
            MarkerOp::In => "in",
            MarkerOp::NotIn => "not in",
        };
        f.write_str(text)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Variable(name) => write!(f, "{}", name),
            Operand::Literal(text) => write!(f, "'{}'", text),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Marker::Or(a, b) => write!(f, "{} or {}", a, b),
            Marker::And(a, b) => {
                for (idx, side) in [a, b].into_iter().enumerate() {
                    if idx > 0 {
                        write!(f, " and ")?;
                    }
                    match side.as_ref() {
                        Marker::Or(..) => write!(f, "({})", side)?,
                        _ => write!(f, "{}", side)?,
                    }
                }
                Ok(())
            },
        }
    }
}
