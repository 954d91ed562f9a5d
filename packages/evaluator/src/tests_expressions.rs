/// Evaluation tests: property resolution, builtins, error taxonomy
use crate::*;

fn context(bindings: &[(&str, f64)]) -> EvalContext {
    let mut ctx = EvalContext::new();
    for (name, value) in bindings {
        ctx.set_variable(*name, Value::Number(*value));
    }
    ctx
}

#[test]
fn test_single_property_document() {
    let evaluator = Evaluator::with_context(context(&[("temperature", 25.5)]));
    assert_eq!(evaluator.evaluate("temperature"), Ok(25.5));
}

#[test]
fn test_two_property_sum() {
    let evaluator = Evaluator::with_context(context(&[("a", 2.0), ("b", 3.0)]));
    assert_eq!(evaluator.evaluate("a+b"), Ok(5.0));
}

#[test]
fn test_unbinding_a_property_fails_reevaluation() {
    let mut evaluator = Evaluator::with_context(context(&[("a", 2.0), ("b", 3.0)]));
    assert_eq!(evaluator.evaluate("a+b"), Ok(5.0));

    evaluator.context.remove_variable("b");
    assert_eq!(
        evaluator.evaluate("a+b"),
        Err(EvalError::UnboundReference {
            name: "b".to_string()
        })
    );
}

#[test]
fn test_evaluation_is_idempotent() {
    let evaluator = Evaluator::with_context(context(&[("speed", 60.0), ("pressure", 100.0)]));
    let first = evaluator.evaluate("(speed + pressure) / 4");
    let second = evaluator.evaluate("(speed + pressure) / 4");
    assert_eq!(first, second);
    assert_eq!(first, Ok(40.0));
}

#[test]
fn test_operator_precedence() {
    let evaluator = Evaluator::new();
    assert_eq!(evaluator.evaluate("2 + 3 * 4"), Ok(14.0));
    assert_eq!(evaluator.evaluate("(2 + 3) * 4"), Ok(20.0));
    assert_eq!(evaluator.evaluate("10 - 4 - 3"), Ok(3.0));
    assert_eq!(evaluator.evaluate("-2 * -3"), Ok(6.0));
}

#[test]
fn test_bracketed_subexpressions_flatten() {
    // Collapsed expression blocks render inline as [...] and evaluate as
    // grouped sub-expressions, nesting included.
    let evaluator = Evaluator::with_context(context(&[("a", 2.0), ("b", 3.0)]));
    assert_eq!(evaluator.evaluate("[a * b] + 1"), Ok(7.0));
    assert_eq!(evaluator.evaluate("2 * [a + [b - 1]]"), Ok(8.0));
}

#[test]
fn test_string_values_coerce_when_numeric() {
    let mut ctx = EvalContext::new();
    ctx.set_variable("status", Value::String("1".to_string()));
    ctx.set_variable("label", Value::String("offline".to_string()));
    let evaluator = Evaluator::with_context(ctx);

    assert_eq!(evaluator.evaluate("status + 1"), Ok(2.0));
    assert_eq!(
        evaluator.evaluate("label + 1"),
        Err(EvalError::NonNumericProperty {
            name: "label".to_string()
        })
    );
}

#[test]
fn test_builtin_functions() {
    let evaluator = Evaluator::with_context(context(&[("a", 2.0), ("b", 4.0)]));
    assert_eq!(evaluator.evaluate("Sum(a, b, 6)"), Ok(12.0));
    assert_eq!(evaluator.evaluate("Avg(a, b)"), Ok(3.0));
    assert_eq!(evaluator.evaluate("Scale(a, 10)"), Ok(20.0));
    // Case-insensitive resolution
    assert_eq!(evaluator.evaluate("sum(1, 2)"), Ok(3.0));
}

#[test]
fn test_unknown_function_fails() {
    let evaluator = Evaluator::new();
    assert_eq!(
        evaluator.evaluate("Median(1, 2)"),
        Err(EvalError::UnknownFunction {
            name: "Median".to_string()
        })
    );
}

#[test]
fn test_empty_avg_is_not_finite() {
    let evaluator = Evaluator::new();
    assert_eq!(evaluator.evaluate("Avg()"), Err(EvalError::NotFinite));
}

#[test]
fn test_division_by_zero_is_not_finite() {
    let evaluator = Evaluator::new();
    assert_eq!(evaluator.evaluate("1 / 0"), Err(EvalError::NotFinite));
    assert_eq!(evaluator.evaluate("0 / 0"), Err(EvalError::NotFinite));
}

#[test]
fn test_syntax_errors_surface() {
    let evaluator = Evaluator::new();
    assert!(matches!(
        evaluator.evaluate("1 +"),
        Err(EvalError::Syntax(_))
    ));
    assert!(matches!(
        evaluator.evaluate("a = 1"),
        Err(EvalError::Syntax(_))
    ));
    assert!(matches!(evaluator.evaluate(""), Err(EvalError::Syntax(_))));
}

#[test]
fn test_evaluation_does_not_mutate_context() {
    let evaluator = Evaluator::with_context(context(&[("a", 1.0)]));
    let before = evaluator.context.clone();
    let _ = evaluator.evaluate("a * 3");
    let _ = evaluator.evaluate("undefined_name");
    assert_eq!(evaluator.context.resolve("a"), before.resolve("a"));
    assert!(evaluator.context.resolve("undefined_name").is_none());
}
