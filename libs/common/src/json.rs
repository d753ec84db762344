use serde::de::Error as DeError;
use serde_json::{from_str, Error as SerdeError, Map, Value};

/// Parses a JSON string that must contain an object, as used for `variables` and `extensions`.
pub fn parse_json_object(value: &str) -> Result<Map<String, Value>, SerdeError> {
  match from_str::<Value>(value)? {
    Value::Object(v) => Ok(v),
    other => Err(DeError::custom(format!(
      "expected a JSON object, got: {}",
      other
    ))),
  }
}
