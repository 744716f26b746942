//! Post-parse validation of generation output.
//!
//! Callers declare required keys as dotted paths (`"contacts.0.rank"`) and
//! mark bounded score fields; validation names the first offending field.

use serde_json::Value;

use prospector_shared::{ProspectorError, Result};

/// A caller-declared numeric field with an inclusive valid range.
/// Bounded fields are implicitly required.
#[derive(Debug, Clone)]
pub struct BoundedScore {
    /// Dotted path to the field.
    pub path: String,
    pub min: f64,
    pub max: f64,
}

impl BoundedScore {
    pub fn new(path: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            path: path.into(),
            min,
            max,
        }
    }
}

/// Verify every required key (top-level and nested) is present.
/// Fails naming the first missing key.
pub fn require_keys(value: &Value, keys: &[String]) -> Result<()> {
    for key in keys {
        if lookup(value, key).is_none() {
            return Err(ProspectorError::schema(key.clone()));
        }
    }
    Ok(())
}

/// Verify every bounded score field is a number inside its range.
pub fn check_bounds(value: &Value, bounds: &[BoundedScore]) -> Result<()> {
    for bound in bounds {
        let Some(field) = lookup(value, &bound.path) else {
            return Err(ProspectorError::schema(bound.path.clone()));
        };
        let Some(number) = field.as_f64() else {
            return Err(ProspectorError::schema(format!(
                "{} (not a number)",
                bound.path
            )));
        };
        if number < bound.min || number > bound.max {
            return Err(ProspectorError::schema(format!(
                "{} (value {number} outside {}..={})",
                bound.path, bound.min, bound.max
            )));
        }
    }
    Ok(())
}

/// Resolve a dotted path against a value. Numeric segments index arrays.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn campaign() -> Value {
        json!({
            "subject": "Quick question about Vector Labs",
            "body": "Hi Jordan — saw your team is growing.",
            "personalization": {"score": 8, "hooks": ["hiring", "funding"]}
        })
    }

    #[test]
    fn all_required_keys_present() {
        let keys = vec![
            "subject".to_string(),
            "body".to_string(),
            "personalization.score".to_string(),
            "personalization.hooks.0".to_string(),
        ];
        assert!(require_keys(&campaign(), &keys).is_ok());
    }

    #[test]
    fn first_missing_key_is_named() {
        let keys = vec![
            "subject".to_string(),
            "call_to_action".to_string(),
            "also_missing".to_string(),
        ];
        let err = require_keys(&campaign(), &keys).unwrap_err();
        match err {
            ProspectorError::Schema { field } => assert_eq!(field, "call_to_action"),
            other => panic!("expected Schema, got {other:?}"),
        }
    }

    #[test]
    fn bounds_accept_in_range_numbers() {
        let bounds = vec![BoundedScore::new("personalization.score", 1.0, 10.0)];
        assert!(check_bounds(&campaign(), &bounds).is_ok());
    }

    #[test]
    fn bounds_reject_out_of_range() {
        let value = json!({"rank": 14});
        let bounds = vec![BoundedScore::new("rank", 1.0, 10.0)];
        let err = check_bounds(&value, &bounds).unwrap_err();
        assert!(err.to_string().contains("rank"));
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn bounds_reject_non_numeric() {
        let value = json!({"rank": "seven"});
        let bounds = vec![BoundedScore::new("rank", 1.0, 10.0)];
        let err = check_bounds(&value, &bounds).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn bounds_reject_missing_field() {
        let value = json!({});
        let bounds = vec![BoundedScore::new("rank", 1.0, 10.0)];
        assert!(check_bounds(&value, &bounds).is_err());
    }

    #[test]
    fn lookup_handles_array_indices() {
        let value = json!({"items": [{"id": "a"}, {"id": "b"}]});
        assert_eq!(lookup(&value, "items.1.id"), Some(&json!("b")));
        assert_eq!(lookup(&value, "items.9.id"), None);
        assert_eq!(lookup(&value, "items.x"), None);
    }
}
