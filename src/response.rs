//! Activation responses returned by the webhook and by stage handlers

use crate::error::FlowError;
use serde::Serialize;
use serde_json::{json, Value};

/// Status code plus a `{"message": ...}` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationResponse {
    pub status_code: u16,
    pub body: Value,
}

impl ActivationResponse {
    pub fn new(status_code: u16, message: impl Serialize) -> Self {
        let message = serde_json::to_value(message).unwrap_or(Value::Null);
        Self {
            status_code,
            body: json!({ "message": message }),
        }
    }

    pub fn ok(message: impl Serialize) -> Self {
        Self::new(200, message)
    }

    pub fn accepted(message: impl Serialize) -> Self {
        Self::new(202, message)
    }

    /// Body for a handled terminal error: `{"message": {"error": {type, description}}}`
    pub fn error(status_code: u16, error: &FlowError) -> Self {
        Self::new(
            status_code,
            json!({
                "error": {
                    "type": error.type_name(),
                    "description": error.to_string(),
                }
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The `message.error.type` field, when this is an error response
    pub fn error_type(&self) -> Option<&str> {
        self.body
            .pointer("/message/error/type")
            .and_then(Value::as_str)
    }
}
