//! # Label Selectors
//!
//! Parser and matcher for Kubernetes label selector expressions, as used in the
//! `secret.sync.klst.pw/namespace-selector` annotation.
//!
//! Supported syntax (comma-separated requirements, all of which must hold):
//!
//! | Expression         | Meaning                                  |
//! |--------------------|------------------------------------------|
//! | `key`              | label present                            |
//! | `!key`             | label absent                             |
//! | `key=value`        | label present with this value (`==` too) |
//! | `key!=value`       | label absent or with another value       |
//! | `key in (a,b)`     | label present with one of the values     |
//! | `key notin (a,b)`  | label absent or with none of the values  |
//! | `key>1`, `key<1`   | label present, integer compared          |
//!
//! An empty selector matches everything. A parsed selector renders back to a
//! canonical string that the API server accepts for server-side filtering.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_LABEL_NAME_LENGTH: usize = 63;
const MAX_LABEL_PREFIX_LENGTH: usize = 253;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("found '{found}', expected: {expected}")]
    UnexpectedToken { found: String, expected: &'static str },
    #[error("invalid label key '{0}'")]
    InvalidKey(String),
    #[error("invalid label value '{0}'")]
    InvalidValue(String),
    #[error("value '{value}' of '{key}' is not an integer")]
    NotAnInteger { key: String, value: String },
}

/// A single condition of a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    DoesNotExist(String),
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    GreaterThan(String, i64),
    LessThan(String, i64),
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::DoesNotExist(key) => !labels.contains_key(key),
            Requirement::Equals(key, value) => labels.get(key) == Some(value),
            Requirement::NotEquals(key, value) => labels.get(key) != Some(value),
            Requirement::In(key, values) => labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn(key, values) => !labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::GreaterThan(key, bound) => {
                integer_label(labels, key).is_some_and(|v| v > *bound)
            }
            Requirement::LessThan(key, bound) => {
                integer_label(labels, key).is_some_and(|v| v < *bound)
            }
        }
    }
}

fn integer_label(labels: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    labels.get(key).and_then(|v| v.parse().ok())
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Exists(key) => write!(f, "{key}"),
            Requirement::DoesNotExist(key) => write!(f, "!{key}"),
            Requirement::Equals(key, value) => write!(f, "{key}={value}"),
            Requirement::NotEquals(key, value) => write!(f, "{key}!={value}"),
            Requirement::In(key, values) => write!(f, "{key} in ({})", join(values)),
            Requirement::NotIn(key, values) => write!(f, "{key} notin ({})", join(values)),
            Requirement::GreaterThan(key, bound) => write!(f, "{key}>{bound}"),
            Requirement::LessThan(key, bound) => write!(f, "{key}<{bound}"),
        }
    }
}

/// A parsed label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector matching every label set
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(lex(s)).parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Identifier(String),
    Bang,
    Equals,
    DoubleEquals,
    NotEquals,
    GreaterThan,
    LessThan,
    OpenParen,
    CloseParen,
    Comma,
    In,
    NotIn,
}

impl Token {
    fn literal(&self) -> String {
        match self {
            Token::Identifier(s) => s.clone(),
            Token::Bang => "!".into(),
            Token::Equals => "=".into(),
            Token::DoubleEquals => "==".into(),
            Token::NotEquals => "!=".into(),
            Token::GreaterThan => ">".into(),
            Token::LessThan => "<".into(),
            Token::OpenParen => "(".into(),
            Token::CloseParen => ")".into(),
            Token::Comma => ",".into(),
            Token::In => "in".into(),
            Token::NotIn => "notin".into(),
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '!' | '=' | '>' | '<' | '(' | ')' | ',')
}

fn lex(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        chars.next();
        let token = match c {
            '!' if chars.peek() == Some(&'=') => {
                chars.next();
                Token::NotEquals
            }
            '!' => Token::Bang,
            '=' if chars.peek() == Some(&'=') => {
                chars.next();
                Token::DoubleEquals
            }
            '=' => Token::Equals,
            '>' => Token::GreaterThan,
            '<' => Token::LessThan,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            _ => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || is_special(next) {
                        break;
                    }
                    ident.push(next);
                    chars.next();
                }
                match ident.as_str() {
                    "in" => Token::In,
                    "notin" => Token::NotIn,
                    _ => Token::Identifier(ident),
                }
            }
        };
        tokens.push(token);
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn unexpected(found: Option<Token>, expected: &'static str) -> SelectorError {
        SelectorError::UnexpectedToken {
            found: found.map_or_else(|| "end of string".to_string(), |t| t.literal()),
            expected,
        }
    }

    fn parse(mut self) -> Result<LabelSelector, SelectorError> {
        let mut requirements = Vec::new();
        if self.peek().is_none() {
            return Ok(LabelSelector { requirements });
        }

        loop {
            requirements.push(self.requirement()?);
            match self.next() {
                None => break,
                Some(Token::Comma) => {}
                other => return Err(Self::unexpected(other, "','")),
            }
        }
        Ok(LabelSelector { requirements })
    }

    fn key(&mut self) -> Result<String, SelectorError> {
        match self.next() {
            Some(Token::Identifier(key)) => {
                validate_key(&key)?;
                Ok(key)
            }
            other => Err(Self::unexpected(other, "label key")),
        }
    }

    /// Keywords are plain values once a value is expected (`env=in` is valid)
    fn value(&mut self) -> Result<String, SelectorError> {
        let value = match self.peek() {
            None | Some(Token::Comma | Token::CloseParen) => String::new(),
            Some(Token::Identifier(_) | Token::In | Token::NotIn) => {
                self.next().map(|t| t.literal()).unwrap_or_default()
            }
            Some(_) => return Err(Self::unexpected(self.next(), "label value")),
        };
        validate_value(&value)?;
        Ok(value)
    }

    fn values(&mut self) -> Result<BTreeSet<String>, SelectorError> {
        match self.next() {
            Some(Token::OpenParen) => {}
            other => return Err(Self::unexpected(other, "'('")),
        }
        // Empty entries are kept: `(a,)` holds "a" and ""
        let mut values = BTreeSet::new();
        loop {
            values.insert(self.value()?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::CloseParen) => break,
                other => return Err(Self::unexpected(other, "',' or ')'")),
            }
        }
        Ok(values)
    }

    fn integer(&mut self, key: &str) -> Result<i64, SelectorError> {
        let value = self.value()?;
        match value.parse() {
            Ok(n) => Ok(n),
            Err(_) => Err(SelectorError::NotAnInteger {
                key: key.to_string(),
                value,
            }),
        }
    }

    fn requirement(&mut self) -> Result<Requirement, SelectorError> {
        if self.peek() == Some(&Token::Bang) {
            self.next();
            return Ok(Requirement::DoesNotExist(self.key()?));
        }

        let key = self.key()?;
        match self.peek() {
            None | Some(Token::Comma) => Ok(Requirement::Exists(key)),
            Some(Token::Equals | Token::DoubleEquals) => {
                self.next();
                let value = self.value()?;
                Ok(Requirement::Equals(key, value))
            }
            Some(Token::NotEquals) => {
                self.next();
                let value = self.value()?;
                Ok(Requirement::NotEquals(key, value))
            }
            Some(Token::In) => {
                self.next();
                let values = self.values()?;
                Ok(Requirement::In(key, values))
            }
            Some(Token::NotIn) => {
                self.next();
                let values = self.values()?;
                Ok(Requirement::NotIn(key, values))
            }
            Some(Token::GreaterThan) => {
                self.next();
                let bound = self.integer(&key)?;
                Ok(Requirement::GreaterThan(key, bound))
            }
            Some(Token::LessThan) => {
                self.next();
                let bound = self.integer(&key)?;
                Ok(Requirement::LessThan(key, bound))
            }
            Some(_) => Err(Self::unexpected(
                self.next(),
                "'=', '!=', '==', 'in', 'notin', '>' or '<'",
            )),
        }
    }
}

/// `[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?`, at most 63 characters
fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_LABEL_NAME_LENGTH
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Lowercase RFC 1123 subdomain, at most 253 characters
fn is_dns_subdomain(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LABEL_PREFIX_LENGTH
        && s.split('.').all(|part| {
            let bytes = part.as_bytes();
            !bytes.is_empty()
                && bytes[0].is_ascii_alphanumeric()
                && bytes[bytes.len() - 1].is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        })
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let valid = match key.split_once('/') {
        Some((prefix, name)) => is_dns_subdomain(prefix) && is_label_name(name),
        None => is_label_name(key),
    };
    if valid {
        Ok(())
    } else {
        Err(SelectorError::InvalidKey(key.to_string()))
    }
}

fn validate_value(value: &str) -> Result<(), SelectorError> {
    if value.is_empty() || is_label_name(value) {
        Ok(())
    } else {
        Err(SelectorError::InvalidValue(value.to_string()))
    }
}
