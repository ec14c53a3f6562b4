//! Caller-owned operation requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What an operation acts upon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Target {
    /// A file on disk (e.g. a discovered service definition).
    File(PathBuf),
    /// A composition descriptor for artifact-producing operations.
    Composition(String),
    #[default]
    None,
}

/// A request submitted to a pipeline.
///
/// Field names are unique keys. The pipeline only ever borrows a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Caller-chosen identity, used to key audit records.
    pub id: String,

    /// Named payload fields.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// Target descriptor.
    #[serde(default)]
    pub target: Target,
}

impl OperationRequest {
    /// Create an empty request with the given identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            target: Target::None,
        }
    }

    /// Set a field, replacing any previous value under the same name.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field as a string slice, if present and a JSON string.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_field_overwrites() {
        let req = OperationRequest::new("r1")
            .with_field("user_id", "u1")
            .with_field("user_id", "u2");
        assert_eq!(req.fields.len(), 1);
        assert_eq!(req.text("user_id"), Some("u2"));
    }

    #[test]
    fn test_request_deserializes_without_optional_parts() {
        let req: OperationRequest = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(req.id, "abc");
        assert!(req.fields.is_empty());
        assert_eq!(req.target, Target::None);
    }
}
