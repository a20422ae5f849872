//! Casts submitted values to the storage type of their question.

use crate::catalog::{Catalog, QuestionDescriptor, ValueKind};
use crate::error::{BrsrError, Result};
use crate::value::{json_type, TypedValue};
use serde_json::Value;

/// Cast `raw` for question `q`. Null is valid for every kind and clears the
/// answer.
pub fn cast(catalog: &Catalog, q: &QuestionDescriptor, raw: Value) -> Result<TypedValue> {
    cast_as(&q.id, catalog.value_kind(q), raw)
}

pub fn cast_as(question_id: &str, kind: ValueKind, raw: Value) -> Result<TypedValue> {
    if raw.is_null() {
        return Ok(TypedValue::Null);
    }
    let mismatch = |raw: &Value| BrsrError::TypeMismatch {
        question_id: question_id.to_string(),
        expected: kind,
        found: describe(raw),
    };

    match kind {
        ValueKind::Any => Ok(TypedValue::from_json(raw)),
        ValueKind::Integer => match &raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(TypedValue::Integer(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Ok(TypedValue::Integer(f as i64))
                        }
                        _ => Err(mismatch(&raw)),
                    }
                }
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(TypedValue::Integer)
                .map_err(|_| mismatch(&raw)),
            _ => Err(mismatch(&raw)),
        },
        ValueKind::Decimal => {
            let parsed = match &raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match parsed {
                Some(f) if f.is_finite() => Ok(TypedValue::Decimal(f)),
                _ => Err(mismatch(&raw)),
            }
        }
        ValueKind::Boolean => match &raw {
            Value::Bool(b) => Ok(TypedValue::Boolean(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(TypedValue::Boolean(true)),
                "false" | "no" => Ok(TypedValue::Boolean(false)),
                _ => Err(mismatch(&raw)),
            },
            _ => Err(mismatch(&raw)),
        },
        ValueKind::Text => match raw {
            Value::String(s) => Ok(TypedValue::Text(s)),
            Value::Number(n) => Ok(TypedValue::Text(n.to_string())),
            Value::Bool(b) => Ok(TypedValue::Text(b.to_string())),
            other => Err(mismatch(&other)),
        },
        ValueKind::List => match raw {
            Value::Array(items) => Ok(TypedValue::List(items)),
            other => Err(mismatch(&other)),
        },
        ValueKind::Object => match raw {
            Value::Object(map) => Ok(TypedValue::Object(map)),
            other => Err(mismatch(&other)),
        },
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::String(s) => format!("string '{s}'"),
        other => json_type(other).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
