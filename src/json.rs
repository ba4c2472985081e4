//! JSON values and request parameters
//!
//! Request bodies travel through the client as a string-keyed map of
//! [`JsonValue`]s, so the transport never needs to know the payload's
//! concrete type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Any JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<JsonValue>),
    Object(BTreeMap<String, JsonValue>),
}

/// String-keyed request parameters
pub type Parameters = BTreeMap<String, JsonValue>;

impl JsonValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, JsonValue>> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsonValue::Null,
            serde_json::Value::Bool(b) => JsonValue::Bool(b),
            serde_json::Value::Number(n) => JsonValue::Number(n),
            serde_json::Value::String(s) => JsonValue::String(s),
            serde_json::Value::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            serde_json::Value::Object(map) => JsonValue::Object(
                map.into_iter().map(|(k, v)| (k, JsonValue::from(v))).collect(),
            ),
        }
    }
}

impl From<JsonValue> for serde_json::Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => serde_json::Value::Null,
            JsonValue::Bool(b) => serde_json::Value::Bool(b),
            JsonValue::Number(n) => serde_json::Value::Number(n),
            JsonValue::String(s) => serde_json::Value::String(s),
            JsonValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            JsonValue::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<&str> for JsonValue {
    fn from(s: &str) -> Self {
        JsonValue::String(s.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(s: String) -> Self {
        JsonValue::String(s)
    }
}

impl From<bool> for JsonValue {
    fn from(b: bool) -> Self {
        JsonValue::Bool(b)
    }
}

impl From<i64> for JsonValue {
    fn from(n: i64) -> Self {
        JsonValue::Number(n.into())
    }
}

/// Convert a serializable payload into request parameters.
///
/// Returns `None` when the payload fails to serialize or is not a JSON
/// object; callers send no body in that case.
pub fn to_parameters<T: Serialize>(payload: &T) -> Option<Parameters> {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "payload did not serialize to parameters");
            return None;
        }
    };

    match JsonValue::from(value) {
        JsonValue::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Login {
        username: String,
        password: String,
    }

    #[test]
    fn test_struct_becomes_parameters() {
        let params = to_parameters(&Login {
            username: "a".into(),
            password: "b".into(),
        })
        .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params["username"], JsonValue::from("a"));
        assert_eq!(params["password"], JsonValue::from("b"));
    }

    #[test]
    fn test_non_object_payload_is_absent() {
        assert!(to_parameters(&vec![1, 2, 3]).is_none());
        assert!(to_parameters(&"plain").is_none());
        assert!(to_parameters(&()).is_none());
    }

    #[test]
    fn test_nested_values_parse() {
        let value: JsonValue = serde_json::from_str(
            r#"{"service":"aibot","user_id":true,"data":{"message":"hi","tags":[1,null]}}"#,
        )
        .unwrap();

        let obj = value.as_object().unwrap();
        assert_eq!(obj["service"].as_str(), Some("aibot"));
        assert_eq!(obj["user_id"], JsonValue::Bool(true));

        let data = obj["data"].as_object().unwrap();
        assert_eq!(data["message"].as_str(), Some("hi"));
        match &data["tags"] {
            JsonValue::Array(items) => {
                assert_eq!(items.len(), 2);
                assert!(items[1].is_null());
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_serializes_back_to_same_json() {
        let raw = r#"{"a":[true,"x",1.5],"b":null}"#;
        let value: JsonValue = serde_json::from_str(raw).unwrap();
        let back: serde_json::Value = value.into();
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(raw).unwrap());
    }
}
