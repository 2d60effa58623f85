//! Stage handlers: one per subscription in the routing table
//!
//! Each handler consumes one notification, performs its side effects against the
//! external services and publishes a single result notification on its
//! component's topic.

pub mod channels;
pub mod deal_update;
pub mod documents;
pub mod folders;
pub mod messages;
pub mod templates;

use crate::error::{FlowError, FlowResult};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::response::ActivationResponse;
use crate::services::Services;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

pub use channels::ChannelHandler;
pub use deal_update::DealUpdateHandler;
pub use documents::DocumentHandler;
pub use folders::FolderHandler;
pub use messages::{ApnMessageHandler, DealWonHandler, EngagementReviewHandler, SaMessageHandler};
pub use templates::TemplateRefreshHandler;

#[async_trait]
pub trait StageHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Processes one notification, returning the receipt of the result notification
    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt>;
}

pub fn build_handler(kind: HandlerKind, services: &Services) -> Arc<dyn StageHandler> {
    let services = services.clone();
    match kind {
        HandlerKind::CreateFolders => Arc::new(FolderHandler::new(services)),
        HandlerKind::CopyFiles => Arc::new(DocumentHandler::new(services)),
        HandlerKind::DealUpdate => Arc::new(DealUpdateHandler::new(services)),
        HandlerKind::CreateChannel => Arc::new(ChannelHandler::new(services)),
        HandlerKind::SendMessageToSa => Arc::new(SaMessageHandler::new(services)),
        HandlerKind::SendMessageApn => Arc::new(ApnMessageHandler::new(services)),
        HandlerKind::SendMessageEngagementReview => {
            Arc::new(EngagementReviewHandler::new(services))
        }
        HandlerKind::DealWon => Arc::new(DealWonHandler::new(services)),
        HandlerKind::RefreshTemplates => Arc::new(TemplateRefreshHandler::new(services)),
    }
}

pub fn build_all(services: &Services) -> Vec<Arc<dyn StageHandler>> {
    HandlerKind::ALL
        .iter()
        .map(|kind| build_handler(*kind, services))
        .collect()
}

/// Handler boundary: retryable errors propagate, terminal errors become a 500 response
pub async fn run_handler(
    handler: &dyn StageHandler,
    notification: &Notification,
) -> FlowResult<ActivationResponse> {
    match handler.handle(notification).await {
        Ok(receipt) => {
            info!("{} published {}", handler.kind(), receipt.message_id);
            Ok(ActivationResponse::ok(receipt))
        }
        Err(e) if e.is_retryable() => Err(e),
        Err(e) => {
            error!("{} failed: {}", handler.kind(), e);
            Ok(ActivationResponse::error(500, &e))
        }
    }
}

/// Topic configured for a component
pub(crate) fn topic_for<'a>(services: &'a Services, component_name: &str) -> FlowResult<&'a str> {
    let config = &services.config;
    match component_name {
        component::PIPEDRIVE => Ok(&config.pipedrive_topic),
        component::GDRIVE => Ok(&config.gdrive_topic),
        component::SLACK => Ok(&config.slack_topic),
        other => Err(FlowError::malformed(format!("no topic for component '{}'", other))),
    }
}

/// Publishes a handler's result on its component topic
pub(crate) async fn publish_result<T: Serialize>(
    services: &Services,
    payload: &T,
    attributes: Attributes,
) -> FlowResult<PublishReceipt> {
    let topic = topic_for(services, &attributes.component)?;
    let notification = Notification::from_payload(payload, attributes)?;
    services.publisher.publish(topic, &notification).await
}
