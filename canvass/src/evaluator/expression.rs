//! Evaluation of parsed expression trees

use super::functions::FunctionRegistry;
use super::operations::{arithmetic, compare};
use super::value::Value;
use super::ValueSource;
use crate::ast::LOOP_INDEX_TOKEN;
use crate::syntax::{BinaryOp, Expr, UnaryOp};

pub fn evaluate_expression(
    expr: &Expr,
    functions: &FunctionRegistry,
    source: &dyn ValueSource,
) -> Result<Value, String> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Boolean(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::LoopIndex => Ok(Value::text(LOOP_INDEX_TOKEN)),
        Expr::Reference(name) => Ok(source.resolve(name).unwrap_or(Value::Null)),
        Expr::Unary(op, inner) => {
            let value = evaluate_expression(inner, functions, source)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                UnaryOp::Negate => value
                    .as_number()
                    .map(|n| Value::Number(-n))
                    .ok_or_else(|| format!("Cannot negate '{}'", value)),
            }
        }
        Expr::Binary(left, op, right) => match op {
            BinaryOp::And => {
                let l = evaluate_expression(left, functions, source)?;
                if !l.truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = evaluate_expression(right, functions, source)?;
                Ok(Value::Bool(r.truthy()))
            }
            BinaryOp::Or => {
                let l = evaluate_expression(left, functions, source)?;
                if l.truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = evaluate_expression(right, functions, source)?;
                Ok(Value::Bool(r.truthy()))
            }
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual => {
                let l = evaluate_expression(left, functions, source)?;
                let r = evaluate_expression(right, functions, source)?;
                compare(&l, *op, &r).map(Value::Bool)
            }
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => {
                let l = evaluate_expression(left, functions, source)?;
                let r = evaluate_expression(right, functions, source)?;
                arithmetic(&l, *op, &r)
            }
        },
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| evaluate_expression(arg, functions, source))
                .collect::<Result<Vec<_>, _>>()?;
            functions.call(name, &values)
        }
    }
}
