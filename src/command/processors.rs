//! Stock argument/result processors (spec §4.5), grounded on
//! `original_source/core/command/arg_processors/standard.py` and
//! `original_source/core/command/result_processors/standard.py`.
//!
//! The processor signatures only carry the command's key, not its full
//! metadata, so processors that need declared types are factories: call
//! them with the expected shape and get back a processor closure that
//! captures it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, SwitchboardError};

use super::{ArgProcessor, ResultProcessor};

/// The handful of value shapes the stock processors know how to check or
/// coerce. `Any` always matches, for positions the caller doesn't want
/// validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Bool,
    Any,
}

fn matches_kind(kind: ValueKind, value: &Value) -> bool {
    match kind {
        ValueKind::Any => true,
        ValueKind::Str => value.is_string(),
        ValueKind::Int => value.is_i64() || value.is_u64(),
        ValueKind::Float => value.is_f64() || value.is_i64() || value.is_u64(),
        ValueKind::Bool => value.is_boolean(),
    }
}

fn convert_to_kind(kind: ValueKind, value: Value) -> Option<Value> {
    if matches_kind(kind, &value) {
        return Some(value);
    }
    match kind {
        ValueKind::Str => Some(Value::String(match value {
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => return None,
            other => other.to_string(),
        })),
        ValueKind::Int => value.as_str().and_then(|s| s.parse::<i64>().ok()).map(|n| n.into()),
        ValueKind::Float => value
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ValueKind::Bool => value.as_str().and_then(|s| s.parse::<bool>().ok()).map(Value::Bool),
        ValueKind::Any => Some(value),
    }
}

/// Reject the call unless every positional argument matches its declared
/// type, in order. Extra/missing positions are left alone.
pub fn enforce_types(expected: Vec<ValueKind>) -> ArgProcessor {
    Arc::new(move |key, args, kwargs| {
        for (position, kind) in expected.iter().enumerate() {
            if let Some(value) = args.get(position) {
                if !matches_kind(*kind, value) {
                    return Err(SwitchboardError::BadCommandArgs(format!(
                        "{key}: argument {position} does not match declared type"
                    )));
                }
            }
        }
        Ok((args, kwargs))
    })
}

/// Coerce positional arguments toward their declared type where possible
/// (e.g. a numeric string into an int); leaves an argument alone if it
/// already matches, fails if it can't be converted.
pub fn convert_types(expected: Vec<ValueKind>) -> ArgProcessor {
    Arc::new(move |key, args, kwargs| {
        let mut converted = Vec::with_capacity(args.len());
        for (position, value) in args.into_iter().enumerate() {
            match expected.get(position) {
                Some(kind) => match convert_to_kind(*kind, value) {
                    Some(value) => converted.push(value),
                    None => {
                        return Err(SwitchboardError::BadArgProcessorOutput(format!(
                            "{key}: argument {position} could not be converted to the declared type"
                        )))
                    }
                },
                None => converted.push(value),
            }
        }
        Ok((converted, kwargs))
    })
}

/// Drop any kwarg not in the known set.
pub fn strip_unknown_args(known: Vec<String>) -> ArgProcessor {
    Arc::new(move |_key, args, kwargs| {
        let filtered = kwargs.into_iter().filter(|(k, _)| known.contains(k)).collect();
        Ok((args, filtered))
    })
}

/// If the call arrived as a single positional JSON-object string, parse it
/// and merge it into kwargs — lets a client send `command("{...}")` instead
/// of a structured kwargs map.
pub fn kwargs_from_json() -> ArgProcessor {
    Arc::new(|key, mut args, mut kwargs| {
        if args.len() == 1 && kwargs.is_empty() {
            if let Some(text) = args[0].as_str() {
                if let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(text) {
                    args.clear();
                    kwargs = parsed.into_iter().collect::<BTreeMap<_, _>>();
                    return Ok((args, kwargs));
                }
            }
        }
        Ok((args, kwargs))
    })
}

/// Reject a return value that doesn't match the declared return type.
pub fn enforce_return_type(expected: ValueKind) -> ResultProcessor {
    Arc::new(move |key, value| {
        if matches_kind(expected, &value) {
            Ok(value)
        } else {
            Err(SwitchboardError::UnexpectedReturnType(format!(
                "{key}: return value does not match declared return type"
            )))
        }
    })
}

/// Serialize the return value to a JSON string.
pub fn json_encode_result() -> ResultProcessor {
    Arc::new(|key, value| {
        serde_json::to_string(&value)
            .map(Value::String)
            .map_err(|e| SwitchboardError::UnexpectedReturnType(format!("{key}: could not json-encode result: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enforce_types_rejects_mismatched_positional() {
        let processor = enforce_types(vec![ValueKind::Int]);
        let result = processor("op", vec![json!("not-an-int")], BTreeMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn convert_types_coerces_numeric_string() {
        let processor = convert_types(vec![ValueKind::Int]);
        let (args, _) = processor("op", vec![json!("42")], BTreeMap::new()).unwrap();
        assert_eq!(args[0], json!(42));
    }

    #[test]
    fn strip_unknown_args_drops_unrecognized_keys() {
        let processor = strip_unknown_args(vec!["a".to_string()]);
        let mut kwargs = BTreeMap::new();
        kwargs.insert("a".to_string(), json!(1));
        kwargs.insert("b".to_string(), json!(2));
        let (_, kwargs) = processor("op", Vec::new(), kwargs).unwrap();
        assert_eq!(kwargs.len(), 1);
        assert!(kwargs.contains_key("a"));
    }

    #[test]
    fn kwargs_from_json_parses_single_positional_object() {
        let processor = kwargs_from_json();
        let (args, kwargs) = processor("op", vec![json!("{\"a\": 1}")], BTreeMap::new()).unwrap();
        assert!(args.is_empty());
        assert_eq!(kwargs.get("a"), Some(&json!(1)));
    }

    #[test]
    fn enforce_return_type_rejects_mismatch() {
        let processor = enforce_return_type(ValueKind::Str);
        assert!(processor("op", json!(5)).is_err());
    }
}
