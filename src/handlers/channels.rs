//! Customer and project messaging channels

use crate::clients::messaging::{ensure_channel, sanitize_channel_name, Channel};
use crate::error::FlowResult;
use crate::handlers::{publish_result, StageHandler};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::pipeline::stage::Stage;
use crate::services::Services;
use crate::store::channels::ChannelRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChannelRequest {
    customer_name: String,
    project_name: String,
    deal_id: i64,
    #[serde(default)]
    short_name: Value,
}

/// Short name for channel naming: the deal's short name, else the first three
/// characters of the customer name
pub fn short_name(explicit: &Value, customer: &str) -> String {
    match explicit.as_str().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => customer.chars().take(3).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SlackChannels {
    pub customer_channel: Channel,
    pub project_channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelsCreated {
    pub customer_name: String,
    pub project_name: String,
    pub short_name: String,
    pub deal_id: i64,
    pub slack_channels: SlackChannels,
}

pub struct ChannelHandler {
    services: Services,
}

impl ChannelHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl StageHandler for ChannelHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CreateChannel
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let request: ChannelRequest = notification.decode()?;
        let short = short_name(&request.short_name, &request.customer_name);
        let messaging = self.services.messaging.as_ref();

        let customer_channel = ensure_channel(messaging, &sanitize_channel_name(&short)).await?;
        let project_channel = ensure_channel(
            messaging,
            &sanitize_channel_name(&format!("{}-{}", short, request.project_name)),
        )
        .await?;

        self.services
            .channels
            .put_channels(&ChannelRecord {
                customer: request.customer_name.clone(),
                project: request.project_name.clone(),
                deal_id: request.deal_id,
                current_stage: notification.attributes.stage.clone(),
                pipeline_id: notification.attributes.pipeline.clone(),
                deal_status: notification.attributes.status.clone(),
                customer_channel_id: customer_channel.id.clone(),
                project_channel_id: project_channel.id.clone(),
                ..Default::default()
            })
            .await?;
        info!(
            "Channels #{} and #{} ready for {} - {}",
            customer_channel.name, project_channel.name, request.customer_name, request.project_name
        );

        let payload = ChannelsCreated {
            customer_name: request.customer_name,
            project_name: request.project_name,
            short_name: short,
            deal_id: request.deal_id,
            slack_channels: SlackChannels {
                customer_channel,
                project_channel,
            },
        };
        let attributes =
            Attributes::new(component::SLACK, "create_channel", Stage::LeadIn.as_str());
        publish_result(&self.services, &payload, attributes).await
    }
}
