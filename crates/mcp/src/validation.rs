//! Parameter and envelope validation.
//!
//! Tool and prompt parameters are described with JSON Schema and checked
//! before a handler ever sees them. Every failure is reported per field so
//! callers can point at exactly what was wrong.

use std::fmt;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde_json::Value;

use crate::error::{FieldIssue, McpError};
use crate::types::{JsonRpcRequest, RpcId, JSONRPC_VERSION};

/// A compiled JSON Schema describing handler parameters.
#[derive(Clone)]
pub struct ParamSchema {
    schema: Value,
    description: Option<String>,
    validator: Arc<Validator>,
}

impl ParamSchema {
    /// Compile a schema. The schema's own `description`, if present, becomes
    /// the description advertised during discovery.
    pub fn new(schema: Value) -> Result<Self, McpError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| McpError::InvalidSchema(e.to_string()))?;
        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            schema,
            description,
            validator: Arc::new(validator),
        })
    }

    /// Override the advertised description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Collect one issue per offending field. Empty means valid.
    pub fn issues(&self, params: &Value) -> Vec<FieldIssue> {
        self.validator
            .iter_errors(params)
            .map(|err| {
                let mut path = pointer_to_path(err.instance_path().as_str());
                if let ValidationErrorKind::Required { property } = err.kind() {
                    let property = property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string());
                    path = join_path(&path, &property);
                }
                FieldIssue {
                    path,
                    message: err.to_string(),
                }
            })
            .collect()
    }
}

impl fmt::Debug for ParamSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSchema")
            .field("schema", &self.schema)
            .field("description", &self.description)
            .finish()
    }
}

/// Validate `params` against `schema`, returning them unchanged on success.
///
/// Absent params are validated as `null`, so a schema requiring an object
/// rejects a request that carries none.
pub fn validate_params(schema: &ParamSchema, params: Option<Value>) -> Result<Value, McpError> {
    let params = params.unwrap_or(Value::Null);
    let issues = schema.issues(&params);
    if issues.is_empty() {
        Ok(params)
    } else {
        tracing::debug!(count = issues.len(), "parameter validation failed");
        Err(McpError::Validation(issues))
    }
}

/// Check the JSON-RPC envelope and convert it into a typed request.
pub fn validate_request(value: Value) -> Result<JsonRpcRequest, McpError> {
    let Value::Object(mut obj) = value else {
        return Err(McpError::InvalidRequest(vec![issue("", "Expected object")]));
    };

    let mut issues = Vec::new();

    match obj.get("jsonrpc") {
        None => issues.push(issue("jsonrpc", "Required")),
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(_) => issues.push(issue(
            "jsonrpc",
            &format!("Invalid literal value, expected \"{JSONRPC_VERSION}\""),
        )),
    }

    let method = match obj.remove("method") {
        None => {
            issues.push(issue("method", "Required"));
            None
        }
        Some(Value::String(m)) => Some(m),
        Some(_) => {
            issues.push(issue("method", "Expected string"));
            None
        }
    };

    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(v) => match RpcId::from_value(&v) {
            Some(id) => Some(id),
            None => {
                issues.push(issue("id", "Expected string or number"));
                None
            }
        },
    };

    match method {
        Some(method) if issues.is_empty() => Ok(JsonRpcRequest::new(id, method, obj.remove("params"))),
        _ => Err(McpError::InvalidRequest(issues)),
    }
}

fn issue(path: &str, message: &str) -> FieldIssue {
    FieldIssue {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// `/user/0/name` -> `user.0.name`, undoing JSON Pointer escapes.
fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_schema() -> ParamSchema {
        ParamSchema::new(json!({
            "type": "object",
            "description": "Echo a message",
            "properties": {
                "message": {"type": "string"},
                "times": {"type": "integer", "minimum": 1}
            },
            "required": ["message"]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_params_pass_through_unchanged() {
        let params = json!({"message": "hi", "times": 2});
        let out = validate_params(&message_schema(), Some(params.clone())).unwrap();
        assert_eq!(out, params);
    }

    #[test]
    fn test_one_issue_per_offending_field() {
        let err = validate_params(&message_schema(), Some(json!({"times": 0}))).unwrap_err();
        let McpError::Validation(issues) = err else {
            panic!("expected validation error");
        };
        let mut paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["message", "times"]);
    }

    #[test]
    fn test_nested_paths_are_dot_joined() {
        let schema = ParamSchema::new(json!({
            "type": "object",
            "properties": {
                "user": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                }
            }
        }))
        .unwrap();
        let issues = schema.issues(&json!({"user": {"name": 5}}));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "user.name");

        let issues = schema.issues(&json!({"user": {}}));
        assert_eq!(issues[0].path, "user.name");
    }

    #[test]
    fn test_missing_params_validate_as_null() {
        let err = validate_params(&message_schema(), None).unwrap_err();
        assert!(matches!(err, McpError::Validation(ref issues) if issues.len() == 1));

        let open = ParamSchema::new(json!({})).unwrap();
        assert_eq!(validate_params(&open, None).unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let err = ParamSchema::new(json!({"type": 12})).unwrap_err();
        assert!(matches!(err, McpError::InvalidSchema(_)));
    }

    #[test]
    fn test_description_taken_from_schema() {
        assert_eq!(message_schema().description(), Some("Echo a message"));
        let schema = message_schema().with_description("Repeat");
        assert_eq!(schema.description(), Some("Repeat"));
    }

    #[test]
    fn test_request_envelope_accepts_minimal_request() {
        let req = validate_request(json!({"jsonrpc": "2.0", "method": "mcp_toolDiscovery"})).unwrap();
        assert_eq!(req.method, "mcp_toolDiscovery");
        assert!(req.id.is_none());
        assert!(req.params.is_none());
    }

    #[test]
    fn test_request_envelope_accepts_any_numeric_id() {
        for id in [json!(1.5), json!(u64::MAX), json!(-3)] {
            let req = validate_request(json!({"jsonrpc": "2.0", "method": "x", "id": id.clone()})).unwrap();
            assert_eq!(serde_json::to_value(req.id.unwrap()).unwrap(), id);
        }
    }

    #[test]
    fn test_request_envelope_reports_each_bad_field() {
        let err = validate_request(json!({"jsonrpc": "1.0", "method": 3, "id": true})).unwrap_err();
        let McpError::InvalidRequest(issues) = err else {
            panic!("expected invalid request");
        };
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["jsonrpc", "method", "id"]);
    }

    #[test]
    fn test_request_envelope_rejects_non_object() {
        assert!(matches!(
            validate_request(json!([1, 2])),
            Err(McpError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_pointer_unescaping() {
        assert_eq!(pointer_to_path("/a~1b/c~0d"), "a/b.c~d");
        assert_eq!(pointer_to_path(""), "");
    }
}
