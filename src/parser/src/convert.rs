//! Coercion of JSON scalars to declared field types
//!
//! JSON numbers carry no integer/float distinction here: every number enters
//! as a 64-bit float and only becomes an integer through a declared `int`.
//!
//! | source  | string          | int            | float   | bool             |
//! |---------|-----------------|----------------|---------|------------------|
//! | string  | unchanged       | base-10 parse  | parse   | boolean literal  |
//! | bool    | `true`/`false`  | 1 / 0          | unchanged | unchanged      |
//! | number  | shortest form   | truncate       | unchanged | 0 / 1 only     |
//!
//! Pairs not listed keep the original value. Numbers print in shortest form,
//! in exponent notation below 1e-4 or from 1e21 on.

use common::config::FieldType;
use common::model::FieldValue;
use serde_json::Value;

use crate::error::ParseError;

/// Convert a JSON value into a field value, applying the declared type if any
///
/// A `null` without a declared type yields `Ok(None)`: the field is left out.
/// Arrays, objects and typed `null`s cannot become fields and are rejected.
pub fn convert(
    value: &Value,
    declared: Option<FieldType>,
    field: &str,
) -> Result<Option<FieldValue>, ParseError> {
    let native = match value {
        Value::Null if declared.is_none() => return Ok(None),
        Value::String(s) => FieldValue::String(s.clone()),
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => FieldValue::Float(
            n.as_f64()
                .ok_or_else(|| ParseError::conversion(field, format!("number {n} out of range")))?,
        ),
        other => {
            return Err(ParseError::conversion(
                field,
                format!("unknown format '{}'", kind(other)),
            ));
        }
    };

    match declared {
        Some(target) => coerce(native, target, field).map(Some),
        None => Ok(Some(native)),
    }
}

/// Coerce an already extracted field value to `target`
pub fn coerce(value: FieldValue, target: FieldType, field: &str) -> Result<FieldValue, ParseError> {
    let failed = |reason: String| ParseError::conversion(field, format!("to type {target}: {reason}"));

    match (value, target) {
        (FieldValue::String(s), FieldType::Int) => s
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|e| failed(format!("{s:?}: {e}"))),
        (FieldValue::String(s), FieldType::Float) => s
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|e| failed(format!("{s:?}: {e}"))),
        (FieldValue::String(s), FieldType::Bool) => parse_bool(&s)
            .map(FieldValue::Bool)
            .ok_or_else(|| failed(format!("{s:?} is not a boolean"))),
        (FieldValue::Bool(b), FieldType::String) => Ok(FieldValue::String(b.to_string())),
        (FieldValue::Bool(b), FieldType::Int) => Ok(FieldValue::Int(i64::from(b))),
        (FieldValue::Float(v), FieldType::String) => Ok(FieldValue::String(format_float(v))),
        // `as` truncates toward zero and saturates at the i64 bounds
        (FieldValue::Float(v), FieldType::Int) => Ok(FieldValue::Int(v as i64)),
        (FieldValue::Float(v), FieldType::Bool) => {
            if v == 0.0 {
                Ok(FieldValue::Bool(false))
            } else if v == 1.0 {
                Ok(FieldValue::Bool(true))
            } else {
                Err(failed(format!("cannot convert {v} to bool")))
            }
        }
        (value, _) => Ok(value),
    }
}

/// Shortest decimal form, switching to exponent notation (`1e+21`, `1.5e-07`)
/// when the decimal exponent is below -4 or at least 21
fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    let scientific = format!("{v:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return v.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if v != 0.0 && (exponent < -4 || exponent >= 21) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        v.to_string()
    }
}

/// Boolean literals in the spellings accepted by common config formats
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
