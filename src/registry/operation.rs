//! Service registration as a pipeline operation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::config::schema::RegistryConfig;
use crate::gate::decision::DecisionContext;
use crate::pipeline::operation::{EffectError, EffectReport, GatedOperation, OperationError};
use crate::registry::client::RegistryClient;
use crate::registry::discovery::DOCUMENT_FIELD;
use crate::resilience::retries::AttemptResult;
use crate::validation::request::Target;
use crate::validation::validator::{FieldKind, FieldRule, RequestSchema, ValidatedRequest};

pub const REGISTRATION_OPERATION: &str = "registration";

/// A definition the registry accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredService {
    pub service_id: String,
    pub name: String,
}

/// Registers one service definition per request.
///
/// The registry write is the retried call. The side-effect stage confirms
/// the service is visible; a miss there means the write already happened,
/// so it is reported as a partial effect.
#[derive(Debug, Clone)]
pub struct RegistrationOperation {
    config: RegistryConfig,
}

impl RegistrationOperation {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }
}

/// The identity the registry files a definition under: `ID`, else `Name`.
pub fn service_identity(definition: &Value) -> Option<(String, String)> {
    let name = definition
        .get("Name")?
        .as_str()
        .filter(|name| !name.trim().is_empty())?
        .to_string();
    let id = definition
        .get("ID")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());
    Some((id, name))
}

/// A definition must be a JSON object with a non-empty string `Name` and,
/// when present, a string `ID`.
fn check_definition(value: &Value) -> Result<(), String> {
    let raw = value.as_str().ok_or_else(|| "must be a JSON document string".to_string())?;
    let definition: Value = serde_json::from_str(raw).map_err(|e| format!("malformed JSON: {}", e))?;
    let object = definition
        .as_object()
        .ok_or_else(|| "definition must be an object".to_string())?;

    match object.get("Name") {
        None | Some(Value::Null) => return Err("definition missing Name".to_string()),
        Some(Value::String(name)) if name.trim().is_empty() => {
            return Err("Name must not be empty".to_string());
        }
        Some(Value::String(_)) => {}
        Some(_) => return Err("Name must be a string".to_string()),
    }
    match object.get("ID") {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err("ID must be a string".to_string()),
    }
}

#[async_trait]
impl GatedOperation for RegistrationOperation {
    type Resource = RegistryClient;
    type Payload = RegisteredService;

    fn name(&self) -> &str {
        REGISTRATION_OPERATION
    }

    fn schema(&self) -> RequestSchema {
        RequestSchema::new(REGISTRATION_OPERATION)
            .field(FieldRule::required(DOCUMENT_FIELD, FieldKind::Custom(check_definition)))
    }

    async fn acquire(&self) -> Result<RegistryClient, OperationError> {
        RegistryClient::from_config(&self.config).map_err(|e| OperationError::Fatal(e.to_string()))
    }

    async fn release(&self, client: RegistryClient) -> Result<(), OperationError> {
        tracing::debug!(registry = %client.base_url(), "Registry session closed");
        Ok(())
    }

    async fn attempt(
        &self,
        client: &RegistryClient,
        request: &ValidatedRequest<'_>,
    ) -> AttemptResult<RegisteredService> {
        let raw = request.text(DOCUMENT_FIELD).unwrap_or_default();
        let definition: Value = match serde_json::from_str(raw) {
            Ok(definition) => definition,
            Err(e) => return AttemptResult::FatalFailure(format!("malformed definition: {}", e)),
        };
        let Some((service_id, name)) = service_identity(&definition) else {
            return AttemptResult::FatalFailure("definition has no Name".to_string());
        };

        match client.register(&definition).await {
            AttemptResult::Success(()) => {
                tracing::info!(service_id = %service_id, "Service registered");
                AttemptResult::Success(RegisteredService { service_id, name })
            }
            AttemptResult::TransientFailure(cause) => AttemptResult::TransientFailure(cause),
            AttemptResult::FatalFailure(cause) => AttemptResult::FatalFailure(cause),
        }
    }

    fn decision_context(&self, request: &ValidatedRequest<'_>, payload: &RegisteredService) -> DecisionContext {
        let mut fields = BTreeMap::new();
        if let Target::File(path) = &request.request().target {
            fields.insert("file".to_string(), Value::String(path.display().to_string()));
        }
        DecisionContext {
            operation: REGISTRATION_OPERATION.to_string(),
            operation_id: request.id().to_string(),
            fields,
            payload: json!({ "service_id": payload.service_id, "name": payload.name }),
        }
    }

    async fn execute(
        &self,
        client: &RegistryClient,
        _request: &ValidatedRequest<'_>,
        service: RegisteredService,
    ) -> Result<EffectReport, EffectError> {
        if !self.config.verify_registration {
            return Ok(EffectReport::new(json!({
                "service_id": service.service_id,
                "verified": false
            })));
        }

        match client.service_registered(&service.service_id).await {
            Ok(true) => Ok(EffectReport::new(json!({
                "service_id": service.service_id,
                "verified": true
            }))),
            Ok(false) => Err(EffectError::after_effect(format!(
                "service {} not visible after registration",
                service.service_id
            ))),
            Err(e) => Err(EffectError::after_effect(format!(
                "could not verify service {}: {}",
                service.service_id, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::request::OperationRequest;
    use crate::validation::validator::InputValidator;

    #[test]
    fn test_service_identity() {
        assert_eq!(
            service_identity(&json!({"ID": "web-1", "Name": "web"})),
            Some(("web-1".to_string(), "web".to_string()))
        );
        assert_eq!(
            service_identity(&json!({"Name": "web", "ID": ""})),
            Some(("web".to_string(), "web".to_string()))
        );
        assert_eq!(service_identity(&json!({"ID": "web-1"})), None);
        assert_eq!(service_identity(&json!({"Name": 5})), None);
        assert_eq!(service_identity(&json!({"Name": " "})), None);
    }

    #[test]
    fn test_schema_rejects_definitions_without_name() {
        let op = RegistrationOperation::new(RegistryConfig::default());
        let validator = InputValidator::new(op.schema());

        let ok = OperationRequest::new("web.json").with_field(DOCUMENT_FIELD, r#"{"Name":"web","Port":80}"#);
        assert!(validator.validate(&ok).is_ok());

        let nameless = OperationRequest::new("x.json").with_field(DOCUMENT_FIELD, r#"{"Port":80}"#);
        assert!(validator.validate(&nameless).unwrap_err().invalid.contains_key(DOCUMENT_FIELD));

        let broken = OperationRequest::new("y.json").with_field(DOCUMENT_FIELD, "{not json");
        assert!(validator.validate(&broken).unwrap_err().invalid.contains_key(DOCUMENT_FIELD));

        let unreadable = OperationRequest::new("z.json");
        assert_eq!(validator.validate(&unreadable).unwrap_err().missing, vec![DOCUMENT_FIELD]);
    }

    #[test]
    fn test_schema_checks_identity_types() {
        let op = RegistrationOperation::new(RegistryConfig::default());
        let validator = InputValidator::new(op.schema());
        let invalid = |document: &str| {
            let request = OperationRequest::new("svc.json").with_field(DOCUMENT_FIELD, document);
            validator.validate(&request).unwrap_err().invalid[DOCUMENT_FIELD].clone()
        };

        assert_eq!(invalid(r#"{"Name":5}"#), "Name must be a string");
        assert_eq!(invalid(r#"{"Name":""}"#), "Name must not be empty");
        assert_eq!(invalid(r#"{"Name":"web","ID":7}"#), "ID must be a string");
        assert_eq!(invalid(r#"["web"]"#), "definition must be an object");

        let with_id = OperationRequest::new("svc.json").with_field(DOCUMENT_FIELD, r#"{"Name":"web","ID":"web-2"}"#);
        assert!(validator.validate(&with_id).is_ok());
    }
}
