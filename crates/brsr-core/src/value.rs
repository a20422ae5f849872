use crate::error::{BrsrError, Result};
use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// AnswerValue: what a caller submits
// ---------------------------------------------------------------------------

/// A submitted answer, shaped according to the question it targets.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    /// One leaf value: scalar, list, or a free-form object.
    Atomic(Value),
    /// Category (→ sub-key) → leaf value, flattened to key paths.
    Breakdown(Vec<BreakdownEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownEntry {
    pub keys: Vec<String>,
    pub value: Value,
}

impl AnswerValue {
    /// Interpret `value` as a breakdown nested exactly `depth` levels deep.
    ///
    /// With `depth == 2` the value must be `{category: {sub_key: leaf}}`; any
    /// other shape is a `MalformedCompositeValue` naming `question_id`.
    pub fn breakdown(question_id: &str, value: Value, depth: usize) -> Result<Self> {
        let mut entries = Vec::new();
        flatten(question_id, value, depth, &mut Vec::new(), &mut entries)?;
        if entries.is_empty() {
            return Err(BrsrError::MalformedCompositeValue {
                question_id: question_id.to_string(),
                reason: "breakdown is empty".to_string(),
            });
        }
        Ok(AnswerValue::Breakdown(entries))
    }
}

fn flatten(
    question_id: &str,
    value: Value,
    depth: usize,
    prefix: &mut Vec<String>,
    out: &mut Vec<BreakdownEntry>,
) -> Result<()> {
    if depth == 0 {
        out.push(BreakdownEntry {
            keys: prefix.clone(),
            value,
        });
        return Ok(());
    }
    let found = json_type(&value);
    let Value::Object(map) = value else {
        let at = if prefix.is_empty() {
            question_id.to_string()
        } else {
            format!("{question_id}.{}", prefix.join("."))
        };
        return Err(BrsrError::MalformedCompositeValue {
            question_id: question_id.to_string(),
            reason: format!("expected a mapping at {at}, got {found}"),
        });
    };
    for (key, child) in map {
        prefix.push(key);
        flatten(question_id, child, depth - 1, prefix, out)?;
        prefix.pop();
    }
    Ok(())
}

/// JSON type name for error messages.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// TypedValue: what gets stored
// ---------------------------------------------------------------------------

/// A value after casting to the storage type of its question.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Text(String),
    List(Vec<Value>),
    Object(Map<String, Value>),
}

impl TypedValue {
    /// Classify a JSON value by its shape alone.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => TypedValue::Null,
            Value::Bool(b) => TypedValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => TypedValue::Integer(i),
                None => TypedValue::Decimal(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => TypedValue::Text(s),
            Value::Array(items) => TypedValue::List(items),
            Value::Object(map) => TypedValue::Object(map),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Decimal(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::List(items) => Value::Array(items.clone()),
            TypedValue::Object(map) => Value::Object(map.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }
}

/// Change-log rendering of a stored value: strings verbatim, everything else
/// as compact JSON, null as `None`.
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn two_level_breakdown_flattens_to_key_pairs() {
        let v = json!({"permanent_employees": {"male": 5, "female": 3}});
        let AnswerValue::Breakdown(entries) = AnswerValue::breakdown("Q18a", v, 2).unwrap() else {
            panic!("expected breakdown");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].keys, vec!["permanent_employees", "female"]);
        assert_eq!(entries[1].keys, vec!["permanent_employees", "male"]);
        assert_eq!(entries[1].value, json!(5));
    }

    #[test]
    fn scalar_where_mapping_expected_is_malformed() {
        let err = AnswerValue::breakdown("Q18a", json!(5), 2).unwrap_err();
        assert!(matches!(err, BrsrError::MalformedCompositeValue { ref question_id, .. } if question_id == "Q18a"));
    }

    #[test]
    fn one_level_too_shallow_is_malformed() {
        let v = json!({"permanent_employees": 5});
        let err = AnswerValue::breakdown("Q18a", v, 2).unwrap_err();
        assert!(err.to_string().contains("Q18a.permanent_employees"));
    }

    #[test]
    fn empty_breakdown_is_malformed() {
        assert!(AnswerValue::breakdown("Q18a", json!({}), 2).is_err());
    }

    #[test]
    fn null_leaves_are_kept() {
        let v = json!({"board_women": null});
        let AnswerValue::Breakdown(entries) = AnswerValue::breakdown("Q19", v, 1).unwrap() else {
            panic!("expected breakdown");
        };
        assert_eq!(entries[0].value, Value::Null);
    }

    #[test]
    fn display_value_keeps_strings_bare() {
        assert_eq!(display_value(&json!("abc")), Some("abc".to_string()));
        assert_eq!(display_value(&json!(5)), Some("5".to_string()));
        assert_eq!(display_value(&json!(null)), None);
        assert_eq!(display_value(&json!(["x"])), Some("[\"x\"]".to_string()));
    }

    #[test]
    fn typed_roundtrip_through_json() {
        assert_eq!(TypedValue::from_json(json!(7)), TypedValue::Integer(7));
        assert_eq!(TypedValue::from_json(json!(2.5)), TypedValue::Decimal(2.5));
        assert_eq!(TypedValue::Integer(7).to_json(), json!(7));
        assert!(TypedValue::from_json(Value::Null).is_null());
    }
}
