//! Built-in functions callable from condition expressions
//!
//! Two-argument comparison and logic functions are flagged `legacy`: they are
//! the only ones the positional token reduction may call.

use super::value::Value;
use super::yearmonth::YearMonth;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

pub type NativeFunction = fn(&[Value]) -> Result<Value, String>;

#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub legacy: bool,
    pub call: NativeFunction,
}

impl FunctionSpec {
    pub fn check_arity(&self, count: usize) -> Result<(), String> {
        let too_few = count < self.min_args;
        let too_many = self.max_args.is_some_and(|max| count > max);
        if too_few || too_many {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => format!("{}", max),
                Some(max) => format!("{} to {}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(format!(
                "{}() takes {} argument(s), got {}",
                self.name, expected, count
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionSpec>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register_legacy("equals", equals);
        registry.register_legacy("notEquals", not_equals);
        registry.register_legacy("greaterThan", greater_than);
        registry.register_legacy("greaterOrEqual", greater_or_equal);
        registry.register_legacy("lessThan", less_than);
        registry.register_legacy("lessOrEqual", less_or_equal);
        registry.register_legacy("and", and);
        registry.register_legacy("or", or);
        registry.register_legacy("contains", contains);

        registry.register("not", 1, Some(1), not);
        registry.register("answered", 1, Some(1), answered);
        registry.register("empty", 1, Some(1), empty);
        registry.register("valueOr", 2, Some(2), value_or);
        registry.register("in", 2, None, is_in);
        registry.register("between", 3, Some(3), between);
        registry.register("count", 1, Some(1), count);
        registry.register("num", 1, Some(1), num);
        registry.register("ym", 1, Some(2), ym);
        registry.register("addMonths", 2, Some(2), add_months);
        registry.register("monthsBetween", 2, Some(2), months_between);
        registry
    }

    /// Add or replace a function
    pub fn register(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        call: NativeFunction,
    ) {
        self.functions.insert(
            name,
            FunctionSpec {
                name,
                min_args,
                max_args,
                legacy: false,
                call,
            },
        );
    }

    fn register_legacy(&mut self, name: &'static str, call: NativeFunction) {
        self.functions.insert(
            name,
            FunctionSpec {
                name,
                min_args: 2,
                max_args: Some(2),
                legacy: true,
                call,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    /// Functions the positional reduction recognises
    pub fn legacy(&self, name: &str) -> Option<&FunctionSpec> {
        self.get(name).filter(|spec| spec.legacy)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, String> {
        let spec = self
            .get(name)
            .ok_or_else(|| format!("Unknown function '{}'", name))?;
        spec.check_arity(args.len())?;
        (spec.call)(args)
    }
}

fn equals(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(args[0].loose_eq(&args[1])))
}

fn not_equals(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(!args[0].loose_eq(&args[1])))
}

/// Relational checks are false when either side is unanswered
fn ordered(args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value, String> {
    if args[0].is_empty() || args[1].is_empty() {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(accept(args[0].loose_cmp(&args[1]))))
}

fn greater_than(args: &[Value]) -> Result<Value, String> {
    ordered(args, |o| o == Ordering::Greater)
}

fn greater_or_equal(args: &[Value]) -> Result<Value, String> {
    ordered(args, |o| o != Ordering::Less)
}

fn less_than(args: &[Value]) -> Result<Value, String> {
    ordered(args, |o| o == Ordering::Less)
}

fn less_or_equal(args: &[Value]) -> Result<Value, String> {
    ordered(args, |o| o != Ordering::Greater)
}

fn and(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(args[0].truthy() && args[1].truthy()))
}

fn or(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(args[0].truthy() || args[1].truthy()))
}

fn contains(args: &[Value]) -> Result<Value, String> {
    let found = match &args[0] {
        Value::List(items) => items.iter().any(|item| item.loose_eq(&args[1])),
        Value::Null => false,
        haystack => haystack.to_string().contains(&args[1].to_string()),
    };
    Ok(Value::Bool(found))
}

fn not(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(!args[0].truthy()))
}

fn answered(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(!args[0].is_empty()))
}

fn empty(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(args[0].is_empty()))
}

fn value_or(args: &[Value]) -> Result<Value, String> {
    if args[0].is_empty() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

fn is_in(args: &[Value]) -> Result<Value, String> {
    let (needle, candidates) = args
        .split_first()
        .ok_or_else(|| "in() needs a value".to_string())?;
    Ok(Value::Bool(
        candidates.iter().any(|candidate| needle.loose_eq(candidate)),
    ))
}

fn between(args: &[Value]) -> Result<Value, String> {
    if args[0].is_empty() {
        return Ok(Value::Bool(false));
    }
    let above = args[0].loose_cmp(&args[1]) != Ordering::Less;
    let below = args[0].loose_cmp(&args[2]) != Ordering::Greater;
    Ok(Value::Bool(above && below))
}

fn count(args: &[Value]) -> Result<Value, String> {
    let n = match &args[0] {
        Value::List(items) => items.len(),
        v if v.is_empty() => 0,
        _ => 1,
    };
    Ok(Value::Number(Decimal::from(n)))
}

fn num(args: &[Value]) -> Result<Value, String> {
    Ok(args[0]
        .as_number()
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

fn ym(args: &[Value]) -> Result<Value, String> {
    if let [single] = args {
        return single
            .as_year_month()
            .map(Value::YearMonth)
            .ok_or_else(|| format!("'{}' is not a year-month", single));
    }
    let year = args[0]
        .as_number()
        .and_then(|n| n.to_i32())
        .ok_or_else(|| format!("'{}' is not a year", args[0]))?;
    let month = args[1]
        .as_number()
        .and_then(|n| n.to_u32())
        .ok_or_else(|| format!("'{}' is not a month", args[1]))?;
    YearMonth::new(year, month)
        .map(Value::YearMonth)
        .ok_or_else(|| format!("{}-{} is not a valid year-month", year, month))
}

fn add_months(args: &[Value]) -> Result<Value, String> {
    let start = args[0]
        .as_year_month()
        .ok_or_else(|| format!("'{}' is not a year-month", args[0]))?;
    let months = args[1]
        .as_number()
        .and_then(|n| n.trunc().to_i64())
        .ok_or_else(|| format!("'{}' is not a whole number of months", args[1]))?;
    start
        .add_months(months)
        .map(Value::YearMonth)
        .ok_or_else(|| format!("{} shifted by {} months is out of range", start, months))
}

fn months_between(args: &[Value]) -> Result<Value, String> {
    let parse = |v: &Value| {
        v.as_year_month()
            .or_else(|| YearMonth::from_str(&v.to_string()).ok())
            .ok_or_else(|| format!("'{}' is not a year-month", v))
    };
    let from = parse(&args[0])?;
    let to = parse(&args[1])?;
    Ok(Value::Number(Decimal::from(from.months_until(to))))
}
