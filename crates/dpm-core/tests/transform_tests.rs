use dpm_core::transform::Transformer;
use dpm_core::{Error, ScalarValue};
use serde_json::json;
use std::collections::HashMap;

fn eval(raw: serde_json::Value, input: Option<ScalarValue>) -> ScalarValue {
    let t = Transformer::parse(&raw).expect("parse");
    t.evaluate(input.as_ref(), &HashMap::new()).expect("evaluate")
}

fn eval_with_slots(
    raw: serde_json::Value,
    input: Option<ScalarValue>,
    slots: &HashMap<String, ScalarValue>,
) -> ScalarValue {
    let t = Transformer::parse(&raw).expect("parse");
    t.evaluate(input.as_ref(), slots).expect("evaluate")
}

#[test]
fn literals_evaluate_to_themselves() {
    assert_eq!(eval(json!(5), None), ScalarValue::Number(5.0));
    assert_eq!(eval(json!(-2.5), None), ScalarValue::Number(-2.5));
    assert_eq!(
        eval(json!("minecraft:plains"), None),
        ScalarValue::Text("minecraft:plains".to_string())
    );
}

#[test]
fn input_reference_spellings() {
    for spelling in ["$input", "$in", "input"] {
        assert_eq!(
            eval(json!(spelling), Some(ScalarValue::Number(7.0))),
            ScalarValue::Number(7.0)
        );
    }
}

#[test]
fn input_reference_without_input_fails() {
    let t = Transformer::parse(&json!("$input")).unwrap();
    let err = t.evaluate(None, &HashMap::new()).unwrap_err();
    assert!(matches!(err, Error::MissingInput));
}

#[test]
fn slot_reference_resolves_or_degrades_to_literal() {
    let mut slots = HashMap::new();
    slots.insert("speed".to_string(), ScalarValue::Number(3.0));

    assert_eq!(
        eval_with_slots(json!("$speed"), None, &slots),
        ScalarValue::Number(3.0)
    );
    // No such slot: the original string comes back as a plain literal.
    assert_eq!(
        eval_with_slots(json!("$missing"), None, &slots),
        ScalarValue::Text("$missing".to_string())
    );
}

#[test]
fn binary_ops() {
    assert_eq!(
        eval(json!({"function": "add", "argument": 1, "argument1": 2}), None),
        ScalarValue::Number(3.0)
    );
    assert_eq!(
        eval(
            json!({"function": "multiply", "argument": "$input", "argument1": 4}),
            Some(ScalarValue::Number(2.5))
        ),
        ScalarValue::Number(10.0)
    );
}

#[test]
fn unary_ops() {
    assert_eq!(
        eval(json!({"function": "square", "argument": 3}), None),
        ScalarValue::Number(9.0)
    );
    assert_eq!(
        eval(json!({"function": "square_root", "argument": 9}), None),
        ScalarValue::Number(3.0)
    );
}

#[test]
fn int_rounds_ties_to_even() {
    assert_eq!(
        eval(json!({"function": "int", "argument": 2.5}), None),
        ScalarValue::Number(2.0)
    );
    assert_eq!(
        eval(json!({"function": "int", "argument": 3.5}), None),
        ScalarValue::Number(4.0)
    );
    assert_eq!(
        eval(json!({"function": "int", "argument": 2.4}), None),
        ScalarValue::Number(2.0)
    );
}

#[test]
fn nested_expressions() {
    // (input + 1) * 2
    let raw = json!({
        "function": "multiply",
        "argument": {"function": "add", "argument": "$input", "argument1": 1},
        "argument1": 2
    });
    assert_eq!(
        eval(raw, Some(ScalarValue::Number(4.0))),
        ScalarValue::Number(10.0)
    );
}

#[test]
fn if_else_picks_branch() {
    let raw = json!({
        "function": "if_else",
        "argument": 5,
        "argument1": 5,
        "operator": "==",
        "true": "A",
        "false": "B"
    });
    assert_eq!(eval(raw, None), ScalarValue::Text("A".to_string()));

    let raw = json!({
        "function": "if_else",
        "argument": 1,
        "argument1": 2,
        "operator": ">",
        "true": 10,
        "false": 20
    });
    assert_eq!(eval(raw, None), ScalarValue::Number(20.0));

    let raw = json!({
        "function": "if_else",
        "argument": 2,
        "argument1": 2,
        "operator": ">=",
        "true": 10,
        "false": 20
    });
    assert_eq!(eval(raw, None), ScalarValue::Number(10.0));
}

#[test]
fn if_else_does_not_evaluate_untaken_branch() {
    // The untaken branch references the input, which was never provided;
    // evaluation must still succeed.
    let raw = json!({
        "function": "if_else",
        "argument": 1,
        "argument1": 2,
        "operator": ">",
        "true": "$input",
        "false": 7
    });
    assert_eq!(eval(raw, None), ScalarValue::Number(7.0));
}

#[test]
fn parse_rejects_unknown_function() {
    let err = Transformer::parse(&json!({"function": "cube", "argument": 2})).unwrap_err();
    assert!(matches!(err, Error::UnknownFunction(name) if name == "cube"));
}

#[test]
fn parse_rejects_unknown_operator() {
    let raw = json!({
        "function": "if_else",
        "argument": 1,
        "argument1": 2,
        "operator": "<",
        "true": 1,
        "false": 2
    });
    let err = Transformer::parse(&raw).unwrap_err();
    assert!(matches!(err, Error::UnknownOperator(op) if op == "<"));
}

#[test]
fn parse_rejects_null_and_missing_nodes() {
    assert!(matches!(
        Transformer::parse(&serde_json::Value::Null).unwrap_err(),
        Error::UndefinedTransformer
    ));
    // A binary node missing argument1 fails the same way.
    assert!(matches!(
        Transformer::parse(&json!({"function": "add", "argument": 1})).unwrap_err(),
        Error::UndefinedTransformer
    ));
}

#[test]
fn parse_rejects_foreign_shapes() {
    assert!(matches!(
        Transformer::parse(&json!([1, 2, 3])).unwrap_err(),
        Error::BadTransformer(_)
    ));
    assert!(matches!(
        Transformer::parse(&json!({"argument": 1})).unwrap_err(),
        Error::BadTransformer(_)
    ));
}

#[test]
fn text_operands_coerce_numerically() {
    let mut slots = HashMap::new();
    slots.insert("factor".to_string(), ScalarValue::Text("2".to_string()));
    assert_eq!(
        eval_with_slots(
            json!({"function": "multiply", "argument": "$factor", "argument1": 3}),
            None,
            &slots
        ),
        ScalarValue::Number(6.0)
    );
}
