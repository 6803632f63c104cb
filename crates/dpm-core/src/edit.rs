use crate::error::{Error, Result};
use std::fmt;

/// Scalar value carried by a queued change or produced by a transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl ScalarValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ScalarValue::Number(_) => "number",
            ScalarValue::Text(_) => "string",
            ScalarValue::Bool(_) => "boolean",
        }
    }

    /// Numeric coercion: booleans become 0/1, non-numeric text becomes 0.
    pub fn as_number(&self) -> f64 {
        match self {
            ScalarValue::Number(n) => *n,
            ScalarValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ScalarValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    /// Sequence index coercion for `pop`: text is parsed, numbers truncated.
    fn as_index(&self) -> Option<usize> {
        match self {
            ScalarValue::Number(n) if *n >= 0.0 => Some(n.trunc() as usize),
            ScalarValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Builds a scalar from a JSON value; objects, arrays and null have no
    /// scalar form.
    pub fn from_json(v: &serde_json::Value) -> Option<ScalarValue> {
        match v {
            serde_json::Value::Number(n) => n.as_f64().map(ScalarValue::Number),
            serde_json::Value::String(s) => Some(ScalarValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::Text(s) => write!(f, "{}", s),
            ScalarValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&ScalarValue> for serde_json::Value {
    fn from(v: &ScalarValue) -> Self {
        match v {
            ScalarValue::Number(n) => number_to_json(*n),
            ScalarValue::Text(s) => serde_json::Value::String(s.clone()),
            ScalarValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

/// Integral results serialize as JSON integers, everything else as f64.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn json_to_number(v: &serde_json::Value) -> f64 {
    match v {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn json_scalar_eq(v: &serde_json::Value, target: &ScalarValue) -> bool {
    match (v, target) {
        (serde_json::Value::Number(n), ScalarValue::Number(t)) => n.as_f64() == Some(*t),
        (serde_json::Value::String(s), ScalarValue::Text(t)) => s == t,
        (serde_json::Value::Bool(b), ScalarValue::Bool(t)) => b == t,
        _ => false,
    }
}

/// The eleven recognized edit methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMethod {
    Multiply,
    Divide,
    Add,
    Subtract,
    Set,
    MultiplyInt,
    DivideInt,
    AddInt,
    SubtractInt,
    Remove,
    Pop,
}

impl EditMethod {
    pub fn parse(s: &str) -> Option<EditMethod> {
        Some(match s {
            "multiply" => EditMethod::Multiply,
            "divide" => EditMethod::Divide,
            "add" => EditMethod::Add,
            "subtract" => EditMethod::Subtract,
            "set" => EditMethod::Set,
            "multiply_int" => EditMethod::MultiplyInt,
            "divide_int" => EditMethod::DivideInt,
            "add_int" => EditMethod::AddInt,
            "subtract_int" => EditMethod::SubtractInt,
            "remove" => EditMethod::Remove,
            "pop" => EditMethod::Pop,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditMethod::Multiply => "multiply",
            EditMethod::Divide => "divide",
            EditMethod::Add => "add",
            EditMethod::Subtract => "subtract",
            EditMethod::Set => "set",
            EditMethod::MultiplyInt => "multiply_int",
            EditMethod::DivideInt => "divide_int",
            EditMethod::AddInt => "add_int",
            EditMethod::SubtractInt => "subtract_int",
            EditMethod::Remove => "remove",
            EditMethod::Pop => "pop",
        }
    }
}

impl fmt::Display for EditMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const STRING_METHODS: &[EditMethod] = &[
    EditMethod::Add,
    EditMethod::Pop,
    EditMethod::Remove,
    EditMethod::Set,
];
const BOOLEAN_METHODS: &[EditMethod] = &[EditMethod::Set];

/// Checks that the runtime kind of `value` is accepted by `method`.
/// Number values are accepted by every method.
pub fn value_matches_method(value: &ScalarValue, method: EditMethod) -> bool {
    match value {
        ScalarValue::Number(_) => true,
        ScalarValue::Text(_) => STRING_METHODS.contains(&method),
        ScalarValue::Bool(_) => BOOLEAN_METHODS.contains(&method),
    }
}

/// Applies `method` with `value` at the `/`-separated `value_path` inside a
/// parsed JSON document. Every path segment must already exist.
pub fn apply_to_value(
    root: &mut serde_json::Value,
    value_path: &str,
    value: &ScalarValue,
    method: EditMethod,
) -> Result<()> {
    let not_found = || Error::PathNotFound {
        pointer: value_path.to_string(),
    };

    let mut node = root;
    let mut segments = value_path.split('/').peekable();
    let last = loop {
        let seg = segments.next().ok_or_else(not_found)?;
        if segments.peek().is_none() {
            break seg;
        }
        node = match node {
            serde_json::Value::Object(map) => map.get_mut(seg).ok_or_else(not_found)?,
            serde_json::Value::Array(arr) => {
                let idx: usize = seg.parse().map_err(|_| not_found())?;
                arr.get_mut(idx).ok_or_else(not_found)?
            }
            _ => return Err(not_found()),
        };
    };

    let slot = match node {
        serde_json::Value::Object(map) => map.get_mut(last).ok_or_else(not_found)?,
        serde_json::Value::Array(arr) => {
            let idx: usize = last.parse().map_err(|_| not_found())?;
            arr.get_mut(idx).ok_or_else(not_found)?
        }
        _ => return Err(not_found()),
    };

    apply_method(slot, value_path, value, method)
}

fn apply_method(
    slot: &mut serde_json::Value,
    pointer: &str,
    value: &ScalarValue,
    method: EditMethod,
) -> Result<()> {
    match method {
        EditMethod::Set => *slot = value.into(),

        EditMethod::Add | EditMethod::AddInt => {
            // Text operands concatenate; everything else combines numerically.
            if let ScalarValue::Text(s) = value {
                let existing = match slot {
                    serde_json::Value::String(e) => e.clone(),
                    ref other => other.to_string(),
                };
                *slot = serde_json::Value::String(format!("{}{}", existing, s));
            } else if let serde_json::Value::String(e) = slot {
                let joined = format!("{}{}", e, value);
                *slot = serde_json::Value::String(joined);
            } else {
                *slot = arith(slot, value, method, |a, b| a + b);
            }
        }
        EditMethod::Subtract | EditMethod::SubtractInt => {
            *slot = arith(slot, value, method, |a, b| a - b);
        }
        EditMethod::Multiply | EditMethod::MultiplyInt => {
            *slot = arith(slot, value, method, |a, b| a * b);
        }
        EditMethod::Divide | EditMethod::DivideInt => {
            *slot = arith(slot, value, method, |a, b| a / b);
        }

        EditMethod::Pop => {
            let arr = slot.as_array_mut().ok_or_else(|| Error::NotASequence {
                pointer: pointer.to_string(),
            })?;
            if let Some(idx) = value.as_index()
                && idx < arr.len()
            {
                arr.remove(idx);
            }
        }
        EditMethod::Remove => {
            let arr = slot.as_array_mut().ok_or_else(|| Error::NotASequence {
                pointer: pointer.to_string(),
            })?;
            arr.retain(|e| !json_scalar_eq(e, value));
        }
    }
    Ok(())
}

fn arith(
    slot: &serde_json::Value,
    value: &ScalarValue,
    method: EditMethod,
    op: fn(f64, f64) -> f64,
) -> serde_json::Value {
    let mut n = op(json_to_number(slot), value.as_number());
    if matches!(
        method,
        EditMethod::AddInt | EditMethod::SubtractInt | EditMethod::MultiplyInt | EditMethod::DivideInt
    ) {
        n = n.round_ties_even();
    }
    number_to_json(n)
}
