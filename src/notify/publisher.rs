//! Publishing notifications to topics

use crate::clients::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::error::{FlowError, FlowResult};
use crate::notify::notification::{Attributes, Notification, PublishReceipt};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Sends notifications to a named topic
///
/// Implementations must treat every failure as retryable. There is no batching and
/// no ordering guarantee between separate calls.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, notification: &Notification)
        -> FlowResult<PublishReceipt>;
}

/// A string-typed message attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireAttribute {
    pub data_type: String,
    pub string_value: String,
}

/// The envelope POSTed to a topic endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub message: String,
    pub attributes: BTreeMap<String, WireAttribute>,
}

impl WireMessage {
    pub fn from_notification(notification: &Notification) -> Self {
        let attributes = notification
            .attributes
            .to_map()
            .into_iter()
            .map(|(key, value)| {
                (
                    key,
                    WireAttribute {
                        data_type: "String".to_string(),
                        string_value: value,
                    },
                )
            })
            .collect();

        Self {
            message: notification.message(),
            attributes,
        }
    }

    /// Decodes an envelope as delivered to a subscriber
    pub fn into_notification(self) -> FlowResult<Notification> {
        let payload = match serde_json::from_str(&self.message) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return Err(FlowError::malformed("message body is not a JSON object")),
            Err(e) => return Err(FlowError::malformed(format!("message body: {}", e))),
        };
        let attributes = self
            .attributes
            .into_iter()
            .map(|(key, attribute)| (key, attribute.string_value))
            .collect();

        Ok(Notification::new(payload, Attributes::from_map(&attributes)?))
    }
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default, alias = "MessageId")]
    message_id: Option<String>,
}

/// Publisher for HTTP topic endpoints; the topic name is the endpoint URL
pub struct HttpTopicPublisher {
    http_client: Client,
    timeout: Duration,
}

impl HttpTopicPublisher {
    pub fn new() -> FlowResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> FlowResult<Self> {
        Ok(Self {
            http_client: http::build_client("topic", timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl Publisher for HttpTopicPublisher {
    async fn publish(
        &self,
        topic: &str,
        notification: &Notification,
    ) -> FlowResult<PublishReceipt> {
        let wire = WireMessage::from_notification(notification);
        debug!("Publishing to {}: {}", topic, wire.message);

        let publish_error = |message: String| FlowError::Publish {
            topic: topic.to_string(),
            message,
        };

        let response = self
            .http_client
            .post(topic)
            .json(&wire)
            .send()
            .await
            .map_err(|e| publish_error(http::request_error("topic", self.timeout, e).to_string()))?;

        let response = http::check_status("topic", response)
            .await
            .map_err(|e| publish_error(e.to_string()))?;

        // Endpoints that do not echo an id still accepted the message
        let message_id = response
            .json::<PublishResponse>()
            .await
            .ok()
            .and_then(|body| body.message_id)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        info!(
            "Published {}/{}/{} as {}",
            notification.attributes.component,
            notification.attributes.action,
            notification.attributes.stage,
            message_id
        );

        Ok(PublishReceipt {
            topic: topic.to_string(),
            message_id,
        })
    }
}
