//! Arithmetic and comparison over evaluated values
//!
//! Numbers use decimal arithmetic. Year-months shift by whole months and
//! subtract to a month count. `+` falls back to text concatenation when either
//! side is not numeric, matching how response text is combined in prompts.

use super::value::Value;
use crate::syntax::BinaryOp;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

pub fn arithmetic(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, String> {
    if matches!(left, Value::YearMonth(_)) || matches!(right, Value::YearMonth(_)) {
        return year_month_arithmetic(left, op, right);
    }

    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok(Value::Number(number_arithmetic(l, op, r)?)),
        _ if op == BinaryOp::Add => Ok(Value::Text(format!("{}{}", left, right))),
        _ => Err(format!(
            "Operator '{}' needs numbers, got '{}' and '{}'",
            op, left, right
        )),
    }
}

fn number_arithmetic(left: Decimal, op: BinaryOp, right: Decimal) -> Result<Decimal, String> {
    let result = match op {
        BinaryOp::Add => left.checked_add(right),
        BinaryOp::Subtract => left.checked_sub(right),
        BinaryOp::Multiply => left.checked_mul(right),
        BinaryOp::Divide => {
            if right.is_zero() {
                return Err("Division by zero".to_string());
            }
            left.checked_div(right)
        }
        BinaryOp::Modulo => {
            if right.is_zero() {
                return Err("Modulo by zero".to_string());
            }
            left.checked_rem(right)
        }
        other => return Err(format!("'{}' is not an arithmetic operator", other)),
    };
    result.ok_or_else(|| format!("Overflow evaluating {} {} {}", left, op, right))
}

fn year_month_arithmetic(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, String> {
    match (left, op, right) {
        (Value::YearMonth(ym), BinaryOp::Add, other)
        | (other, BinaryOp::Add, Value::YearMonth(ym))
            if other.as_number().is_some() =>
        {
            shift(*ym, whole_months(other)?)
        }
        (Value::YearMonth(ym), BinaryOp::Subtract, other) if other.as_number().is_some() => {
            shift(*ym, -whole_months(other)?)
        }
        (_, BinaryOp::Subtract, _) => match (left.as_year_month(), right.as_year_month()) {
            (Some(l), Some(r)) => Ok(Value::Number(Decimal::from(r.months_until(l)))),
            _ => Err(format!("Cannot subtract '{}' from '{}'", right, left)),
        },
        _ => Err(format!(
            "Operator '{}' is not defined for '{}' and '{}'",
            op, left, right
        )),
    }
}

fn whole_months(value: &Value) -> Result<i64, String> {
    value
        .as_number()
        .and_then(|n| n.trunc().to_i64())
        .ok_or_else(|| format!("'{}' is not a whole number of months", value))
}

fn shift(ym: super::yearmonth::YearMonth, months: i64) -> Result<Value, String> {
    ym.add_months(months)
        .map(Value::YearMonth)
        .ok_or_else(|| format!("{} shifted by {} months is out of range", ym, months))
}

/// Equality and relational operators
pub fn compare(left: &Value, op: BinaryOp, right: &Value) -> Result<bool, String> {
    let result = match op {
        BinaryOp::Equal => left.loose_eq(right),
        BinaryOp::NotEqual => !left.loose_eq(right),
        BinaryOp::Less => left.loose_cmp(right) == Ordering::Less,
        BinaryOp::LessOrEqual => left.loose_cmp(right) != Ordering::Greater,
        BinaryOp::Greater => left.loose_cmp(right) == Ordering::Greater,
        BinaryOp::GreaterOrEqual => left.loose_cmp(right) != Ordering::Less,
        other => return Err(format!("'{}' is not a comparison operator", other)),
    };
    Ok(result)
}
