use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::EnvelopeError;

/// Event-specific data: a key → JSON value map with unique keys.
///
/// Built once by the raising use case; envelopes only hand out shared
/// references to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, JsonValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a repeated key replaces the earlier value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(JsonValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Payload
where
    K: Into<String>,
    V: Into<JsonValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl TryFrom<JsonValue> for Payload {
    type Error = EnvelopeError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Object(map) => Ok(Self(map.into_iter().collect())),
            JsonValue::Null => Err(EnvelopeError::PayloadNotObject { found: "null" }),
            JsonValue::Bool(_) => Err(EnvelopeError::PayloadNotObject { found: "bool" }),
            JsonValue::Number(_) => Err(EnvelopeError::PayloadNotObject { found: "number" }),
            JsonValue::String(_) => Err(EnvelopeError::PayloadNotObject { found: "string" }),
            JsonValue::Array(_) => Err(EnvelopeError::PayloadNotObject { found: "array" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn later_insert_replaces_earlier_value() {
        let payload = Payload::new().with("email", "a@example.com").with("email", "b@example.com");
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get_str("email"), Some("b@example.com"));
    }

    #[test]
    fn insertion_order_is_irrelevant_for_equality() {
        let a: Payload = [("x", 1), ("y", 2)].into_iter().collect();
        let b: Payload = [("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn only_objects_convert_from_json() {
        let payload = Payload::try_from(json!({"user_id": "u-1", "roles": ["parent"]})).unwrap();
        assert_eq!(payload.get("roles"), Some(&json!(["parent"])));

        assert_eq!(
            Payload::try_from(json!([1, 2])),
            Err(EnvelopeError::PayloadNotObject { found: "array" })
        );
    }
}
