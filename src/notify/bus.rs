//! In-process notification bus that drives the whole handler chain
//!
//! [`LocalBus`] is a [`Publisher`]: it records every notification in a
//! [`MemoryTopic`] and queues it for dispatch. A [`Dispatcher`] owns the handlers
//! and drains the queue depth-first, so the notifications a handler publishes are
//! fully processed before the next sibling handler runs.

use crate::error::{FlowError, FlowResult};
use crate::handlers::{run_handler, StageHandler};
use crate::notify::memory::MemoryTopic;
use crate::notify::notification::{Notification, PublishReceipt};
use crate::notify::publisher::Publisher;
use crate::notify::routes::{subscribers, HandlerKind};
use crate::response::ActivationResponse;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Redelivery attempts for a handler that fails with a retryable error
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Publisher that records and queues notifications for local dispatch
#[derive(Debug, Default)]
pub struct LocalBus {
    topic: MemoryTopic,
    pending: Mutex<Vec<Notification>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order
    pub fn recorded(&self) -> &MemoryTopic {
        &self.topic
    }

    fn take_pending(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

#[async_trait]
impl Publisher for LocalBus {
    async fn publish(
        &self,
        topic: &str,
        notification: &Notification,
    ) -> FlowResult<PublishReceipt> {
        let receipt = self.topic.record(topic, notification)?;
        self.pending.lock().unwrap().push(notification.clone());
        Ok(receipt)
    }
}

/// Outcome of one handler activation during dispatch
#[derive(Debug)]
pub struct Delivery {
    pub handler: HandlerKind,
    pub notification: Notification,
    pub attempts: u32,
    pub outcome: FlowResult<ActivationResponse>,
}

/// Routes queued notifications to subscribed handlers until the bus is idle
pub struct Dispatcher {
    bus: Arc<LocalBus>,
    handlers: HashMap<HandlerKind, Arc<dyn StageHandler>>,
    max_attempts: u32,
}

impl Dispatcher {
    pub fn new(bus: Arc<LocalBus>) -> Self {
        Self {
            bus,
            handlers: HashMap::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn register_all(&mut self, handlers: impl IntoIterator<Item = Arc<dyn StageHandler>>) {
        for handler in handlers {
            self.register(handler);
        }
    }

    /// Dispatches everything queued on the bus, including follow-up notifications
    pub async fn run_until_idle(&self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        let mut stack: Vec<(HandlerKind, Notification)> = Vec::new();
        self.push_jobs(&mut stack, self.bus.take_pending());

        while let Some((kind, notification)) = stack.pop() {
            let Some(handler) = self.handlers.get(&kind) else {
                debug!("No handler registered for {}, skipping", kind);
                continue;
            };

            let (attempts, outcome) = self.deliver(handler.as_ref(), &notification).await;
            match &outcome {
                Ok(response) => info!("{} answered {}", kind, response.status_code),
                Err(e) => warn!("{} gave up after {} attempts: {}", kind, attempts, e),
            }

            deliveries.push(Delivery {
                handler: kind,
                notification,
                attempts,
                outcome,
            });
            self.push_jobs(&mut stack, self.bus.take_pending());
        }

        deliveries
    }

    async fn deliver(
        &self,
        handler: &dyn StageHandler,
        notification: &Notification,
    ) -> (u32, FlowResult<ActivationResponse>) {
        let mut attempt = 1;
        loop {
            match run_handler(handler, notification).await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "{} attempt {} failed, redelivering: {}",
                        handler.kind(),
                        attempt,
                        e
                    );
                    attempt += 1;
                }
                outcome => return (attempt, outcome),
            }
        }
    }

    /// Pushes jobs so the first notification's first subscriber is popped next
    fn push_jobs(&self, stack: &mut Vec<(HandlerKind, Notification)>, published: Vec<Notification>) {
        for notification in published.into_iter().rev() {
            let handlers = subscribers(&notification.attributes);
            if handlers.is_empty() {
                debug!(
                    "No subscribers for {}/{}/{}",
                    notification.attributes.component,
                    notification.attributes.action,
                    notification.attributes.stage
                );
            }
            for kind in handlers.into_iter().rev() {
                stack.push((kind, notification.clone()));
            }
        }
    }
}

/// Failures collected from a dispatch run
pub fn failures(deliveries: &[Delivery]) -> Vec<(&HandlerKind, &FlowError)> {
    deliveries
        .iter()
        .filter_map(|d| d.outcome.as_ref().err().map(|e| (&d.handler, e)))
        .collect()
}
