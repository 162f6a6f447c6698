use crate::syntax::{BinaryOp, Expr, UnaryOp};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "src/parser/expression.pest"]
pub struct ExpressionParser;

/// Why an expression could not be turned into an `Expr`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionParseError {
    /// The grammar does not accept the input; legacy token reduction may still
    #[error("syntax: {0}")]
    Syntax(String),
    #[error("expression nesting depth {depth} exceeds limit {limit}")]
    TooDeep { depth: usize, limit: usize },
}

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::neq, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
});

/// Parse a condition expression.
///
/// Infix syntax (`Q1 == 1 && AGE >= 18`) and positional calls
/// (`and(equals(Q1,1),greaterThan(AGE,17))`) share one grammar.
pub fn parse_expression(input: &str, max_depth: usize) -> Result<Expr, ExpressionParseError> {
    let mut pairs = ExpressionParser::parse(Rule::expression_input, input)
        .map_err(|e| ExpressionParseError::Syntax(e.variant.message().to_string()))?;

    let expr_pair = pairs
        .next()
        .and_then(|input_pair| input_pair.into_inner().find(|p| p.as_rule() == Rule::expr))
        .ok_or_else(|| ExpressionParseError::Syntax("empty expression".to_string()))?;

    let expr = build_expr(expr_pair.into_inner())?;
    let depth = expr.depth();
    if depth > max_depth {
        return Err(ExpressionParseError::TooDeep {
            depth,
            limit: max_depth,
        });
    }
    Ok(expr)
}

fn build_expr(pairs: Pairs<Rule>) -> Result<Expr, ExpressionParseError> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::neg => UnaryOp::Negate,
                _ => UnaryOp::Not,
            };
            Ok(Expr::Unary(op, Box::new(rhs?)))
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or_op => BinaryOp::Or,
                Rule::and_op => BinaryOp::And,
                Rule::eq => BinaryOp::Equal,
                Rule::neq => BinaryOp::NotEqual,
                Rule::lt => BinaryOp::Less,
                Rule::le => BinaryOp::LessOrEqual,
                Rule::gt => BinaryOp::Greater,
                Rule::ge => BinaryOp::GreaterOrEqual,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Subtract,
                Rule::mul => BinaryOp::Multiply,
                Rule::div => BinaryOp::Divide,
                Rule::rem => BinaryOp::Modulo,
                other => {
                    return Err(ExpressionParseError::Syntax(format!(
                        "unexpected operator {:?}",
                        other
                    )))
                }
            };
            Ok(Expr::Binary(Box::new(lhs?), op, Box::new(rhs?)))
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, ExpressionParseError> {
    match pair.as_rule() {
        Rule::number => Decimal::from_str(pair.as_str())
            .map(Expr::Number)
            .map_err(|e| ExpressionParseError::Syntax(format!("bad number: {}", e))),
        Rule::string => Ok(Expr::Text(
            pair.into_inner()
                .next()
                .map(|inner| inner.as_str().to_string())
                .unwrap_or_default(),
        )),
        Rule::boolean => Ok(Expr::Boolean(pair.as_str() == "true")),
        Rule::null_literal => Ok(Expr::Null),
        Rule::loop_index => Ok(Expr::LoopIndex),
        Rule::reference => Ok(Expr::Reference(pair.as_str().to_string())),
        Rule::group => {
            let inner = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .ok_or_else(|| ExpressionParseError::Syntax("empty group".to_string()))?;
            build_expr(inner.into_inner())
        }
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .map(|p| p.as_str().to_string())
                .ok_or_else(|| ExpressionParseError::Syntax("call without name".to_string()))?;
            let args = inner
                .filter(|p| p.as_rule() == Rule::expr)
                .map(|p| build_expr(p.into_inner()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Call(name, args))
        }
        other => Err(ExpressionParseError::Syntax(format!(
            "unexpected primary {:?}",
            other
        ))),
    }
}
