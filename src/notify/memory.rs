//! In-process topic that keeps every published message

use crate::error::{FlowError, FlowResult};
use crate::notify::notification::{Attributes, Notification, PublishReceipt};
use crate::notify::publisher::{Publisher, WireMessage};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// A message as it was handed to the topic
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub topic: String,
    pub message_id: String,
    pub wire: WireMessage,
}

impl StoredMessage {
    /// Reads the message back as a notification
    pub fn notification(&self) -> FlowResult<Notification> {
        let payload = match serde_json::from_str(&self.wire.message) {
            Ok(Value::Object(map)) => map,
            _ => return Err(FlowError::malformed("stored message is not a JSON object")),
        };
        let attributes = self
            .wire
            .attributes
            .iter()
            .map(|(key, attr)| (key.clone(), attr.string_value.clone()))
            .collect();

        Ok(Notification::new(payload, Attributes::from_map(&attributes)?))
    }
}

/// Records every publish, optionally failing the next few
pub struct MemoryTopic {
    messages: Mutex<Vec<StoredMessage>>,
    failures: Mutex<usize>,
}

impl MemoryTopic {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            failures: Mutex::new(0),
        }
    }

    /// Makes the next `count` publishes fail with a retryable error
    pub fn fail_next(&self, count: usize) {
        *self.failures.lock().unwrap() = count;
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Every notification in publish order
    pub fn notifications(&self) -> Vec<Notification> {
        self.messages()
            .iter()
            .filter_map(|m| m.notification().ok())
            .collect()
    }

    pub fn notifications_on(&self, topic: &str) -> Vec<Notification> {
        self.messages()
            .iter()
            .filter(|m| m.topic == topic)
            .filter_map(|m| m.notification().ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }

    pub(crate) fn record(
        &self,
        topic: &str,
        notification: &Notification,
    ) -> FlowResult<PublishReceipt> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(FlowError::Publish {
                    topic: topic.to_string(),
                    message: "topic unavailable".to_string(),
                });
            }
        }

        let message_id = uuid::Uuid::new_v4().to_string();
        self.messages.lock().unwrap().push(StoredMessage {
            topic: topic.to_string(),
            message_id: message_id.clone(),
            wire: WireMessage::from_notification(notification),
        });

        Ok(PublishReceipt {
            topic: topic.to_string(),
            message_id,
        })
    }
}

impl Default for MemoryTopic {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTopic")
            .field("messages", &self.len())
            .finish()
    }
}

#[async_trait]
impl Publisher for MemoryTopic {
    async fn publish(
        &self,
        topic: &str,
        notification: &Notification,
    ) -> FlowResult<PublishReceipt> {
        self.record(topic, notification)
    }
}
