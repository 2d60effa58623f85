//! Notification payloads and their routing attributes

use crate::error::{FlowError, FlowResult};
use crate::pipeline::stage::Stage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Component names used in the `component` attribute
pub mod component {
    pub const PIPEDRIVE: &str = "pipedrive";
    pub const GDRIVE: &str = "gdrive";
    pub const SLACK: &str = "slack";
}

/// Routing attributes attached to every notification
///
/// Subscribers filter on `component`, `action` and `stage`. `pipeline` and `status`
/// are only set on notifications emitted by the transition engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub component: String,
    pub action: String,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Attributes {
    pub fn new(component: &str, action: &str, stage: impl Into<String>) -> Self {
        Self {
            component: component.to_string(),
            action: action.to_string(),
            stage: stage.into(),
            pipeline: None,
            status: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: impl ToString) -> Self {
        self.pipeline = Some(pipeline.to_string());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// The `stage` attribute as a pipeline stage
    pub fn pipeline_stage(&self) -> FlowResult<Stage> {
        self.stage.parse()
    }

    /// Flat string map, as carried on the wire
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("component".to_string(), self.component.clone());
        map.insert("action".to_string(), self.action.clone());
        map.insert("stage".to_string(), self.stage.clone());
        if let Some(pipeline) = &self.pipeline {
            map.insert("pipeline".to_string(), pipeline.clone());
        }
        if let Some(status) = &self.status {
            map.insert("status".to_string(), status.clone());
        }
        map
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> FlowResult<Self> {
        let required = |key: &str| {
            map.get(key)
                .cloned()
                .ok_or_else(|| FlowError::malformed(format!("missing '{}' attribute", key)))
        };

        Ok(Self {
            component: required("component")?,
            action: required("action")?,
            stage: required("stage")?,
            pipeline: map.get("pipeline").cloned(),
            status: map.get("status").cloned(),
        })
    }
}

/// A JSON payload plus routing attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub payload: Map<String, Value>,
    pub attributes: Attributes,
}

impl Notification {
    pub fn new(payload: Map<String, Value>, attributes: Attributes) -> Self {
        Self {
            payload,
            attributes,
        }
    }

    /// Builds a notification from any payload that serializes to a JSON object
    pub fn from_payload<T: Serialize>(payload: &T, attributes: Attributes) -> FlowResult<Self> {
        match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => Ok(Self::new(map, attributes)),
            Ok(other) => Err(FlowError::malformed(format!(
                "notification payload must be an object, got {}",
                other
            ))),
            Err(e) => Err(FlowError::malformed(format!("notification payload: {}", e))),
        }
    }

    /// Decodes the payload into a handler's input type
    pub fn decode<T: DeserializeOwned>(&self) -> FlowResult<T> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            FlowError::malformed(format!(
                "{}/{} payload: {}",
                self.attributes.component, self.attributes.action, e
            ))
        })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Serialized payload, the `message` body on the wire
    pub fn message(&self) -> String {
        Value::Object(self.payload.clone()).to_string()
    }
}

/// Acknowledgement returned by a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub topic: String,
    pub message_id: String,
}
