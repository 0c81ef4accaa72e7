//! The validator capability consumed by the router.
//!
//! A [`Schema`] takes a raw wire value and either returns the parsed (and
//! possibly coerced) value or fails with a structured list of [`Issue`]s.
//! The crate ships a serde-backed schema ([`json`]) and an adapter for
//! host-supplied validation closures ([`custom`]); anything implementing the
//! trait plugs in the same way.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// One validation failure, addressed by a path into the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn at(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

pub trait Schema: Send + Sync {
    fn parse(&self, value: &Value) -> Result<Value, Vec<Issue>>;
}

/// A schema that accepts whatever deserializes into `T`, re-serialized so the
/// value the pipeline continues with is the coerced form (unknown fields
/// dropped, defaults applied).
pub struct JsonSchema<T>(PhantomData<fn() -> T>);

pub fn json<T>() -> JsonSchema<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    JsonSchema(PhantomData)
}

impl<T> Schema for JsonSchema<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn parse(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        let parsed: T = serde_json::from_value(value.clone())
            .map_err(|err| vec![Issue::new(err.to_string())])?;
        serde_json::to_value(&parsed).map_err(|err| vec![Issue::new(err.to_string())])
    }
}

pub struct CustomSchema<F>(F);

pub fn custom<F>(parse: F) -> CustomSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    CustomSchema(parse)
}

impl<F> Schema for CustomSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    fn parse(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (self.0)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct User {
        id: String,
    }

    #[test]
    fn json_schema_accepts_matching_values() {
        let schema = json::<User>();
        let value = schema.parse(&json!({ "id": "u1" })).unwrap();
        assert_eq!(value, json!({ "id": "u1" }));
    }

    #[test]
    fn json_schema_rejects_with_issues() {
        let schema = json::<User>();
        let issues = schema.parse(&json!({ "id": 42 })).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].message.is_empty());
    }

    #[test]
    fn custom_schema_runs_the_closure() {
        let schema = custom(|value| {
            if value.is_string() {
                Ok(value.clone())
            } else {
                Err(vec![Issue::at(vec!["root".into()], "expected a string")])
            }
        });
        assert!(schema.parse(&json!("hi")).is_ok());
        let issues = schema.parse(&json!(1)).unwrap_err();
        assert_eq!(issues[0].path, vec!["root".to_string()]);
    }
}
