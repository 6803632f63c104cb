//! Transformer expression trees.
//!
//! A transformer computes the scalar value written by an edit method. The
//! configuration encodes it as loose JSON (a number, a string, or a tagged
//! object); [`Transformer::parse`] lifts that into a typed tree once, at
//! configuration load, so evaluation never meets an unknown shape.
//!
//! String literals double as references: `$input`, `$in` and `input` resolve
//! to the method's input value, any other `$name` resolves to the slot of
//! that name — or degrades to a plain string literal when no such slot is
//! bound. That fallback is intentional; configurations use it to emit literal
//! `$`-prefixed strings.

use crate::edit::ScalarValue;
use crate::error::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Round to the nearest integer, ties to even.
    Int,
    Square,
    SquareRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gte,
    Gt,
}

impl CompareOp {
    fn parse(s: &str) -> Option<CompareOp> {
        Some(match s {
            "==" => CompareOp::Eq,
            ">=" => CompareOp::Gte,
            ">" => CompareOp::Gt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transformer {
    Number(f64),
    Text(String),
    /// The method's primary input value.
    InputRef,
    /// A named slot value; `name` is stored without the `$` prefix.
    SlotRef { name: String },
    Binary {
        op: BinaryOp,
        left: Box<Transformer>,
        right: Box<Transformer>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Transformer>,
    },
    IfElse {
        op: CompareOp,
        left: Box<Transformer>,
        right: Box<Transformer>,
        when_true: Box<Transformer>,
        when_false: Box<Transformer>,
    },
}

impl Transformer {
    /// Parses a transformer from its dynamic JSON form. Unknown function
    /// tags, unknown operators, and null/absent nodes are load errors.
    pub fn parse(raw: &serde_json::Value) -> Result<Transformer> {
        match raw {
            serde_json::Value::Null => Err(Error::UndefinedTransformer),
            serde_json::Value::Number(n) => {
                let n = n.as_f64().ok_or_else(|| bad_shape(raw))?;
                Ok(Transformer::Number(n))
            }
            serde_json::Value::String(s) => Ok(parse_string_literal(s)),
            serde_json::Value::Object(map) => {
                let function = map
                    .get("function")
                    .and_then(|f| f.as_str())
                    .ok_or_else(|| bad_shape(raw))?;
                match function {
                    "add" => Ok(Transformer::Binary {
                        op: BinaryOp::Add,
                        left: Box::new(parse_member(map, "argument")?),
                        right: Box::new(parse_member(map, "argument1")?),
                    }),
                    "multiply" => Ok(Transformer::Binary {
                        op: BinaryOp::Multiply,
                        left: Box::new(parse_member(map, "argument")?),
                        right: Box::new(parse_member(map, "argument1")?),
                    }),
                    "int" => Ok(Transformer::Unary {
                        op: UnaryOp::Int,
                        arg: Box::new(parse_member(map, "argument")?),
                    }),
                    "square" => Ok(Transformer::Unary {
                        op: UnaryOp::Square,
                        arg: Box::new(parse_member(map, "argument")?),
                    }),
                    "square_root" => Ok(Transformer::Unary {
                        op: UnaryOp::SquareRoot,
                        arg: Box::new(parse_member(map, "argument")?),
                    }),
                    "if_else" => {
                        let operator = map
                            .get("operator")
                            .and_then(|o| o.as_str())
                            .ok_or_else(|| bad_shape(raw))?;
                        let op = CompareOp::parse(operator)
                            .ok_or_else(|| Error::UnknownOperator(operator.to_string()))?;
                        Ok(Transformer::IfElse {
                            op,
                            left: Box::new(parse_member(map, "argument")?),
                            right: Box::new(parse_member(map, "argument1")?),
                            when_true: Box::new(parse_member(map, "true")?),
                            when_false: Box::new(parse_member(map, "false")?),
                        })
                    }
                    other => Err(Error::UnknownFunction(other.to_string())),
                }
            }
            _ => Err(bad_shape(raw)),
        }
    }

    /// Evaluates the tree against the method input and the slot map.
    ///
    /// Only the taken branch of a conditional is evaluated, so the untaken
    /// branch may reference an input that was never provided.
    pub fn evaluate(
        &self,
        input: Option<&ScalarValue>,
        slots: &HashMap<String, ScalarValue>,
    ) -> Result<ScalarValue> {
        match self {
            Transformer::Number(n) => Ok(ScalarValue::Number(*n)),
            Transformer::Text(s) => Ok(ScalarValue::Text(s.clone())),
            Transformer::InputRef => input.cloned().ok_or(Error::MissingInput),
            Transformer::SlotRef { name } => Ok(slots
                .get(name)
                .cloned()
                .unwrap_or_else(|| ScalarValue::Text(format!("${}", name)))),
            Transformer::Binary { op, left, right } => {
                let a = left.evaluate(input, slots)?.as_number();
                let b = right.evaluate(input, slots)?.as_number();
                Ok(ScalarValue::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Multiply => a * b,
                }))
            }
            Transformer::Unary { op, arg } => {
                let n = arg.evaluate(input, slots)?.as_number();
                Ok(ScalarValue::Number(match op {
                    UnaryOp::Int => n.round_ties_even(),
                    UnaryOp::Square => n * n,
                    UnaryOp::SquareRoot => n.sqrt(),
                }))
            }
            Transformer::IfElse {
                op,
                left,
                right,
                when_true,
                when_false,
            } => {
                let a = left.evaluate(input, slots)?;
                let b = right.evaluate(input, slots)?;
                let taken = if compare(*op, &a, &b) {
                    when_true
                } else {
                    when_false
                };
                taken.evaluate(input, slots)
            }
        }
    }
}

fn parse_string_literal(s: &str) -> Transformer {
    match s {
        "$input" | "$in" | "input" => Transformer::InputRef,
        _ => match s.strip_prefix('$') {
            Some(name) if !name.is_empty() => Transformer::SlotRef {
                name: name.to_string(),
            },
            _ => Transformer::Text(s.to_string()),
        },
    }
}

fn parse_member(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<Transformer> {
    Transformer::parse(map.get(key).unwrap_or(&serde_json::Value::Null))
}

fn bad_shape(raw: &serde_json::Value) -> Error {
    Error::BadTransformer(raw.to_string())
}

/// `==` compares exact typed values; `>=`/`>` compare numbers numerically
/// and text lexicographically, and are false for mismatched kinds.
fn compare(op: CompareOp, a: &ScalarValue, b: &ScalarValue) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Gte | CompareOp::Gt => {
            let ord = match (a, b) {
                (ScalarValue::Number(x), ScalarValue::Number(y)) => x.partial_cmp(y),
                (ScalarValue::Text(x), ScalarValue::Text(y)) => Some(x.cmp(y)),
                _ => None,
            };
            match (op, ord) {
                (CompareOp::Gte, Some(o)) => o.is_ge(),
                (CompareOp::Gt, Some(o)) => o.is_gt(),
                _ => false,
            }
        }
    }
}
