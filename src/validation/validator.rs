//! Schema-driven request validation.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::validation::request::OperationRequest;

/// Shape a field's value must have.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Non-empty (after trimming) JSON string.
    Text,
    /// Integer greater than zero, either a JSON number or a decimal string.
    PositiveInteger,
    /// JSON object.
    Object,
    /// A string holding a JSON object that must contain the given keys.
    JsonDocument { required_keys: Vec<String> },
    /// Caller-supplied check.
    Custom(fn(&Value) -> Result<(), String>),
}

/// A single field rule.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Checked only when present.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// The fields an operation type declares.
#[derive(Debug, Clone)]
pub struct RequestSchema {
    pub operation: String,
    pub rules: Vec<FieldRule>,
}

impl RequestSchema {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            rules: Vec::new(),
        }
    }

    pub fn field(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Rejection of a malformed or incomplete request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {operation} request: missing {missing:?}, invalid {invalid:?}")]
pub struct InputError {
    pub operation: String,
    /// Required fields that were absent or null.
    pub missing: Vec<String>,
    /// Present fields that failed their check, with the reason.
    pub invalid: BTreeMap<String, String>,
}

impl InputError {
    /// Names of every offending field, missing first.
    pub fn field_names(&self) -> Vec<&str> {
        self.missing
            .iter()
            .map(String::as_str)
            .chain(self.invalid.keys().map(String::as_str))
            .collect()
    }
}

/// A request that passed its schema. Borrows the caller's request.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedRequest<'a> {
    request: &'a OperationRequest,
}

impl<'a> ValidatedRequest<'a> {
    pub fn request(&self) -> &'a OperationRequest {
        self.request
    }

    pub fn id(&self) -> &'a str {
        &self.request.id
    }

    pub fn text(&self, name: &str) -> Option<&'a str> {
        self.request.text(name)
    }

    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.request.field(name)
    }
}

/// Validates requests against a fixed schema.
#[derive(Debug, Clone)]
pub struct InputValidator {
    schema: RequestSchema,
}

impl InputValidator {
    pub fn new(schema: RequestSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &RequestSchema {
        &self.schema
    }

    /// Check every rule and collect all failures.
    pub fn validate<'a>(&self, request: &'a OperationRequest) -> Result<ValidatedRequest<'a>, InputError> {
        let mut missing = Vec::new();
        let mut invalid = BTreeMap::new();

        for rule in &self.schema.rules {
            match request.fields.get(&rule.name) {
                None | Some(Value::Null) => {
                    if rule.required {
                        missing.push(rule.name.clone());
                    }
                }
                Some(value) => {
                    if let Err(reason) = check_kind(&rule.kind, value) {
                        invalid.insert(rule.name.clone(), reason);
                    }
                }
            }
        }

        if request.id.trim().is_empty() {
            invalid.insert("id".to_string(), "must not be empty".to_string());
        }

        if missing.is_empty() && invalid.is_empty() {
            Ok(ValidatedRequest { request })
        } else {
            Err(InputError {
                operation: self.schema.operation.clone(),
                missing,
                invalid,
            })
        }
    }
}

fn check_kind(kind: &FieldKind, value: &Value) -> Result<(), String> {
    match kind {
        FieldKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            Some(_) => Err("must not be empty".to_string()),
            None => Err("must be a string".to_string()),
        },
        FieldKind::PositiveInteger => {
            let parsed = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) if n > 0 => Ok(()),
                _ => Err("must be a positive integer".to_string()),
            }
        }
        FieldKind::Object => {
            if value.is_object() {
                Ok(())
            } else {
                Err("must be an object".to_string())
            }
        }
        FieldKind::JsonDocument { required_keys } => {
            let raw = value.as_str().ok_or_else(|| "must be a JSON document string".to_string())?;
            let parsed: Value =
                serde_json::from_str(raw).map_err(|e| format!("malformed JSON: {}", e))?;
            let object = parsed
                .as_object()
                .ok_or_else(|| "JSON document must be an object".to_string())?;
            let absent: Vec<&str> = required_keys
                .iter()
                .filter(|key| object.get(key.as_str()).map_or(true, Value::is_null))
                .map(String::as_str)
                .collect();
            if absent.is_empty() {
                Ok(())
            } else {
                Err(format!("document missing keys: {}", absent.join(", ")))
            }
        }
        FieldKind::Custom(check) => check(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::request::OperationRequest;

    fn mint_schema() -> RequestSchema {
        RequestSchema::new("mint")
            .field(FieldRule::required("artist_id", FieldKind::Text))
            .field(FieldRule::required("user_id", FieldKind::Text))
            .field(FieldRule::optional("amount", FieldKind::PositiveInteger))
    }

    #[test]
    fn test_accepts_complete_request() {
        let validator = InputValidator::new(mint_schema());
        let req = OperationRequest::new("op-1")
            .with_field("artist_id", "a1")
            .with_field("user_id", "u1");
        let validated = validator.validate(&req).unwrap();
        assert_eq!(validated.id(), "op-1");
        assert_eq!(validated.text("artist_id"), Some("a1"));
    }

    #[test]
    fn test_reports_all_missing_fields() {
        let validator = InputValidator::new(mint_schema());
        let req = OperationRequest::new("op-1");
        let err = validator.validate(&req).unwrap_err();
        assert_eq!(err.missing, vec!["artist_id", "user_id"]);
        assert!(err.invalid.is_empty());
        assert_eq!(err.operation, "mint");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let validator = InputValidator::new(mint_schema());
        let req = OperationRequest::new("op-1")
            .with_field("artist_id", "a1")
            .with_field("user_id", Value::Null);
        let err = validator.validate(&req).unwrap_err();
        assert_eq!(err.missing, vec!["user_id"]);
    }

    #[test]
    fn test_optional_field_checked_when_present() {
        let validator = InputValidator::new(mint_schema());
        let req = OperationRequest::new("op-1")
            .with_field("artist_id", "a1")
            .with_field("user_id", "u1")
            .with_field("amount", 0);
        let err = validator.validate(&req).unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(err.invalid.get("amount").unwrap(), "must be a positive integer");

        let ok = OperationRequest::new("op-2")
            .with_field("artist_id", "a1")
            .with_field("user_id", "u1")
            .with_field("amount", "12");
        assert!(validator.validate(&ok).is_ok());
    }

    #[test]
    fn test_blank_text_is_invalid() {
        let validator = InputValidator::new(mint_schema());
        let req = OperationRequest::new("op-1")
            .with_field("artist_id", "   ")
            .with_field("user_id", 7);
        let err = validator.validate(&req).unwrap_err();
        assert_eq!(err.field_names(), vec!["artist_id", "user_id"]);
    }

    #[test]
    fn test_json_document_rules() {
        let schema = RequestSchema::new("registration").field(FieldRule::required(
            "document",
            FieldKind::JsonDocument {
                required_keys: vec!["Name".to_string()],
            },
        ));
        let validator = InputValidator::new(schema);

        let good = OperationRequest::new("web.json").with_field("document", r#"{"Name":"web","Port":80}"#);
        assert!(validator.validate(&good).is_ok());

        let malformed = OperationRequest::new("bad.json").with_field("document", "{not json");
        let err = validator.validate(&malformed).unwrap_err();
        assert!(err.invalid["document"].starts_with("malformed JSON"));

        let no_name = OperationRequest::new("anon.json").with_field("document", r#"{"Port":80}"#);
        let err = validator.validate(&no_name).unwrap_err();
        assert_eq!(err.invalid["document"], "document missing keys: Name");

        let array = OperationRequest::new("list.json").with_field("document", "[1,2]");
        assert!(validator.validate(&array).is_err());
    }

    #[test]
    fn test_custom_rule_and_empty_id() {
        fn even(value: &Value) -> Result<(), String> {
            match value.as_u64() {
                Some(n) if n % 2 == 0 => Ok(()),
                _ => Err("must be even".to_string()),
            }
        }
        let schema = RequestSchema::new("custom").field(FieldRule::required("n", FieldKind::Custom(even)));
        let validator = InputValidator::new(schema);

        let req = OperationRequest::new("").with_field("n", 3);
        let err = validator.validate(&req).unwrap_err();
        assert_eq!(err.invalid["n"], "must be even");
        assert_eq!(err.invalid["id"], "must not be empty");
    }
}
