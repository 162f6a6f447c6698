//! Positional-call reduction for expressions the grammar rejects
//!
//! The expression is split on `(`, `)` and `,`. The innermost call (the six
//! tokens ending at the first `)`) is evaluated through a legacy function and
//! spliced back as a single resolved token, until one token remains.
//! Arguments are resolved by the chain: `null`/`undefined`, number, boolean,
//! the loop-index token, a quoted literal, a response lookup, then `""`.

use super::functions::FunctionRegistry;
use super::value::Value;
use super::ValueSource;
use crate::ast::LOOP_INDEX_TOKEN;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const CALL_WIDTH: usize = 6;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Raw(String),
    Resolved(Value),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Raw(s) => write!(f, "{}", s),
            Token::Resolved(v) => write!(f, "<{}>", v),
        }
    }
}

/// Reduction failure, with the token stack at the point it stopped
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (tokens: {stack})")]
pub struct LegacyError {
    pub message: String,
    pub stack: String,
}

fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let flush = |current: &mut String, tokens: &mut Vec<Token>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            tokens.push(Token::Raw(trimmed.to_string()));
        }
        current.clear();
    };

    for c in expression.chars() {
        let structural = match c {
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            ',' => Some(Token::Comma),
            _ => None,
        };
        match structural {
            Some(token) => {
                flush(&mut current, &mut tokens);
                tokens.push(token);
            }
            None => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn stack_of(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_name(token: &str, source: &dyn ValueSource) -> Value {
    match token {
        "null" | "undefined" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        LOOP_INDEX_TOKEN => return Value::text(LOOP_INDEX_TOKEN),
        _ => {}
    }
    if let Ok(n) = Decimal::from_str(token) {
        return Value::Number(n);
    }
    for quote in ['"', '\''] {
        if let Some(inner) = token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Value::text(inner);
        }
    }
    source.resolve(token).unwrap_or_else(|| Value::text(""))
}

fn argument(token: &Token, source: &dyn ValueSource) -> Option<Value> {
    match token {
        Token::Raw(name) => Some(resolve_name(name, source)),
        Token::Resolved(value) => Some(value.clone()),
        _ => None,
    }
}

pub fn reduce(
    expression: &str,
    functions: &FunctionRegistry,
    source: &dyn ValueSource,
) -> Result<Value, LegacyError> {
    let mut tokens = tokenize(expression);
    let fail = |message: String, tokens: &[Token]| LegacyError {
        message,
        stack: stack_of(tokens),
    };

    while let Some(close) = tokens.iter().position(|t| *t == Token::Close) {
        if close + 1 < CALL_WIDTH {
            return Err(fail("call is missing its arguments".to_string(), &tokens));
        }
        let start = close + 1 - CALL_WIDTH;
        let (name, first, second) = match &tokens[start..close] {
            [Token::Raw(name), Token::Open, first, Token::Comma, second] => {
                (name.as_str(), first, second)
            }
            _ => {
                return Err(fail(
                    "expected name(argument,argument)".to_string(),
                    &tokens,
                ))
            }
        };
        let spec = functions
            .legacy(name)
            .ok_or_else(|| fail(format!("unknown function '{}'", name), &tokens))?;
        let args = match (argument(first, source), argument(second, source)) {
            (Some(a), Some(b)) => [a, b],
            _ => return Err(fail("malformed arguments".to_string(), &tokens)),
        };
        let result = (spec.call)(&args).map_err(|message| fail(message, &tokens))?;
        tokens.splice(start..=close, [Token::Resolved(result)]);
    }

    match tokens.as_slice() {
        [Token::Resolved(value)] => Ok(value.clone()),
        [Token::Raw(name)] => Ok(resolve_name(name, source)),
        _ => Err(fail("expression did not reduce to one value".to_string(), &tokens)),
    }
}
