use crate::error::SurveyError;
use crate::evaluator::functions::FunctionRegistry;
use crate::evaluator::legacy::reduce;
use crate::evaluator::{Evaluator, Value, YearMonth};
use crate::resource_limits::ResourceLimits;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn source(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn text(s: &str) -> Value {
    Value::text(s)
}

fn number(n: i64) -> Value {
    Value::Number(Decimal::from(n))
}

#[test]
fn test_arithmetic_on_answers() {
    let evaluator = Evaluator::default();
    let answers = source(&[("ADULTS", text("2")), ("CHILDREN", text("3"))]);

    let value = evaluator.evaluate("ADULTS + CHILDREN", &answers).unwrap();
    assert_eq!(value, number(5));

    let value = evaluator.evaluate("(ADULTS + CHILDREN) * 10 / 4", &answers).unwrap();
    assert_eq!(value.to_string(), "12.5");
}

#[test]
fn test_plus_concatenates_text() {
    let evaluator = Evaluator::default();
    let answers = source(&[("NAME", text("Ada"))]);
    let value = evaluator.evaluate("'Dear ' + NAME", &answers).unwrap();
    assert_eq!(value, text("Dear Ada"));
}

#[test]
fn test_division_by_zero_is_an_error() {
    let evaluator = Evaluator::default();
    let answers = source(&[]);
    let result = evaluator.evaluate("1 / 0", &answers);
    assert!(matches!(result, Err(SurveyError::Expression { .. })));
}

#[test]
fn test_comparisons_coerce_numeric_text() {
    let evaluator = Evaluator::default();
    let answers = source(&[("AGE", text("42"))]);

    assert!(evaluator.condition("AGE >= 18", &answers));
    assert!(evaluator.condition("AGE == 42.0", &answers));
    assert!(!evaluator.condition("AGE < 18", &answers));
    assert!(evaluator.condition("AGE != '41'", &answers));
}

#[test]
fn test_missing_reference_is_null() {
    let evaluator = Evaluator::default();
    let answers = source(&[]);

    assert_eq!(evaluator.evaluate("UNSEEN", &answers).unwrap(), Value::Null);
    assert!(evaluator.condition("UNSEEN == null", &answers));
    assert!(!evaluator.condition("UNSEEN", &answers));
}

#[test]
fn test_logical_operators_short_circuit() {
    let evaluator = Evaluator::default();
    let answers = source(&[("A", text("1"))]);

    // The right-hand side would fail with division by zero.
    assert!(evaluator.condition("A == 1 || 1 / 0", &answers));
    assert!(!evaluator.condition("A == 2 && 1 / 0", &answers));
}

#[test]
fn test_checkbox_answers_compare_by_membership() {
    let evaluator = Evaluator::default();
    let answers = source(&[("choices.Q4", Value::List(vec![text("2"), text("5")]))]);

    assert!(evaluator.condition("choices.Q4 == 5", &answers));
    assert!(!evaluator.condition("choices.Q4 == 3", &answers));
    assert!(evaluator.condition("contains(choices.Q4, 2)", &answers));
}

#[test]
fn test_nested_positional_calls() {
    let evaluator = Evaluator::default();
    let answers = source(&[("A", text("1")), ("B", text("3"))]);
    assert!(evaluator.condition("and(equals(A,1),or(equals(B,2),equals(B,3)))", &answers));

    let answers = source(&[("A", text("1")), ("B", text("4"))]);
    assert!(!evaluator.condition("and(equals(A,1),or(equals(B,2),equals(B,3)))", &answers));
}

#[test]
fn test_reduction_of_nested_calls() {
    let functions = FunctionRegistry::new();
    let answers = source(&[("A", text("1")), ("B", text("3"))]);

    let value = reduce("and(equals(A,1),or(equals(B,2),equals(B,3)))", &functions, &answers).unwrap();
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn test_reduction_resolution_chain() {
    let functions = FunctionRegistry::new();
    let answers = source(&[("Q1", text("yes"))]);

    assert_eq!(
        reduce("equals(Q1,'yes')", &functions, &answers).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        reduce("equals(MISSING,null)", &functions, &answers).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        reduce("greaterThan(MISSING,3)", &functions, &answers).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        reduce("equals(true,true)", &functions, &answers).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_grammar_rejects_fall_back_to_reduction() {
    let evaluator = Evaluator::default();
    let answers = source(&[("A", text("1"))]);

    // `not listed` is not valid infix syntax, so the positional reducer runs.
    let value = evaluator
        .evaluate("or(equals(A,1),equals(B, not listed))", &answers)
        .unwrap();
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn test_reduction_rejects_unknown_function() {
    let functions = FunctionRegistry::new();
    let answers = source(&[]);

    let err = reduce("frobnicate(A,B)", &functions, &answers).unwrap_err();
    assert!(err.message.contains("frobnicate"));
    assert!(err.stack.contains("frobnicate"));
}

#[test]
fn test_reduction_only_accepts_legacy_functions() {
    let functions = FunctionRegistry::new();
    let answers = source(&[]);
    assert!(reduce("valueOr(A,1)", &functions, &answers).is_err());
}

#[test]
fn test_reduction_rejects_wrong_shape() {
    let functions = FunctionRegistry::new();
    let answers = source(&[]);
    assert!(reduce("equals(A)", &functions, &answers).is_err());
    assert!(reduce("equals(A,B,C)", &functions, &answers).is_err());
}

#[test]
fn test_expression_failing_both_tiers() {
    let evaluator = Evaluator::default();
    let answers = source(&[]);

    let result = evaluator.evaluate("equals(A, b c", &answers);
    match result {
        Err(SurveyError::Expression { expression, .. }) => assert_eq!(expression, "equals(A, b c"),
        other => panic!("expected an expression error, got {:?}", other),
    }
    assert!(!evaluator.condition("equals(A, b c", &answers));
}

#[test]
fn test_depth_limit_is_reported() {
    let limits = ResourceLimits {
        max_expression_depth: 4,
        ..ResourceLimits::default()
    };
    let evaluator = Evaluator::new(&limits);
    let answers = source(&[]);

    match evaluator.evaluate("not(not(not(not(not(true)))))", &answers) {
        Err(SurveyError::ResourceLimitExceeded { limit_name, .. }) => {
            assert_eq!(limit_name, "max_expression_depth")
        }
        other => panic!("expected a limit error, got {:?}", other),
    }
}

#[test]
fn test_year_month_arithmetic() {
    let evaluator = Evaluator::default();
    let answers = source(&[("MOVED", text("2023-11"))]);

    let value = evaluator.evaluate("ym(MOVED) + 3", &answers).unwrap();
    assert_eq!(value, Value::YearMonth(YearMonth::new(2024, 2).unwrap()));

    let value = evaluator.evaluate("ym('2024-05') - ym(MOVED)", &answers).unwrap();
    assert_eq!(value, number(6));

    assert!(evaluator.condition("ym(MOVED) < ym(2024, 1)", &answers));
}

#[test]
fn test_year_month_parsing() {
    assert_eq!("2024-03".parse::<YearMonth>().unwrap(), YearMonth::new(2024, 3).unwrap());
    assert_eq!("2024/3".parse::<YearMonth>().unwrap(), YearMonth::new(2024, 3).unwrap());
    assert_eq!("2024-03-17".parse::<YearMonth>().unwrap(), YearMonth::new(2024, 3).unwrap());
    assert!("2024-13".parse::<YearMonth>().is_err());
    assert!("March".parse::<YearMonth>().is_err());
    assert_eq!(YearMonth::new(2024, 3).unwrap().to_string(), "2024-03");
}

#[test]
fn test_year_month_shift_across_years() {
    let start = YearMonth::new(2024, 1).unwrap();
    assert_eq!(start.add_months(-1), YearMonth::new(2023, 12));
    assert_eq!(start.add_months(25), YearMonth::new(2026, 2));
    assert_eq!(start.months_until(YearMonth::new(2023, 10).unwrap()), -3);
}

#[test]
fn test_custom_function_registration() {
    fn double(args: &[Value]) -> Result<Value, String> {
        args[0]
            .as_number()
            .map(|n| Value::Number(n * Decimal::from(2)))
            .ok_or_else(|| "not a number".to_string())
    }

    let mut evaluator = Evaluator::default();
    evaluator.functions_mut().register("double", 1, Some(1), double);
    let answers = source(&[("N", text("21"))]);
    assert_eq!(evaluator.evaluate("double(N)", &answers).unwrap(), number(42));
}

#[test]
fn test_value_truthiness() {
    assert!(!Value::Null.truthy());
    assert!(!text("").truthy());
    assert!(!text("false").truthy());
    assert!(text("0").truthy());
    assert!(!number(0).truthy());
    assert!(!Value::List(vec![]).truthy());
    assert!(Value::List(vec![text("1")]).truthy());
}

#[test]
fn test_value_loose_equality() {
    assert!(Value::Null.loose_eq(&text("")));
    assert!(text("1.0").loose_eq(&number(1)));
    assert!(!text("abc").loose_eq(&text("ABC")));
    assert!(Value::List(vec![text("b"), text("a")]).loose_eq(&Value::List(vec![text("a"), text("b")])));
    assert!(text("2024-05").loose_eq(&Value::YearMonth(YearMonth::new(2024, 5).unwrap())));
}
