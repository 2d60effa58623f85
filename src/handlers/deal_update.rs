//! Writes document links back onto the CRM deal

use crate::clients::crm::resolve_credentials;
use crate::error::FlowResult;
use crate::handlers::{publish_result, StageHandler};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::pipeline::fields::FieldDefinition;
use crate::services::Services;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LinkRequest {
    customer_name: String,
    project_name: String,
    deal_id: i64,
    #[serde(default)]
    deal_field_links: Map<String, Value>,
    #[serde(default)]
    copied_file_links: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealFieldsUpdated {
    pub customer_name: String,
    pub project_name: String,
    pub deal_id: i64,
    /// Link name to `{field key: value}`
    pub deal_field_links_updated: Map<String, Value>,
}

/// A link whose name matches a CRM field once spaces are removed
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub name: String,
    pub key: String,
    pub value: Value,
}

pub fn match_link_fields(fields: &[FieldDefinition], links: &Map<String, Value>) -> Vec<FieldMatch> {
    let mut matches = Vec::new();
    for field in fields {
        let compact = field.name.replace(' ', "");
        if let Some(value) = links.get(&compact) {
            matches.push(FieldMatch {
                name: compact,
                key: field.key.clone(),
                value: value.clone(),
            });
        }
    }
    matches
}

pub struct DealUpdateHandler {
    services: Services,
}

impl DealUpdateHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl StageHandler for DealUpdateHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::DealUpdate
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let request: LinkRequest = notification.decode()?;
        let links = if notification.attributes.action == "create_folders" {
            &request.deal_field_links
        } else {
            &request.copied_file_links
        };

        let credentials = resolve_credentials(
            self.services.secrets.as_ref(),
            self.services.crm.as_ref(),
            &self.services.config.pipedrive_token_secret,
        )
        .await?;
        let fields = self.services.crm.deal_fields(&credentials).await?;

        let mut updated = Map::new();
        for found in match_link_fields(&fields, links) {
            debug!("Setting {} ({}) on deal {}", found.name, found.key, request.deal_id);
            self.services
                .crm
                .update_deal_field(&credentials, request.deal_id, &found.key, &found.value)
                .await?;
            let mut entry = Map::new();
            entry.insert(found.key, found.value);
            updated.insert(found.name, Value::Object(entry));
        }
        info!(
            "Updated {} deal field(s) on deal {}",
            updated.len(),
            request.deal_id
        );

        let payload = DealFieldsUpdated {
            customer_name: request.customer_name,
            project_name: request.project_name,
            deal_id: request.deal_id,
            deal_field_links_updated: updated,
        };
        let attributes = Attributes::new(
            component::PIPEDRIVE,
            "update_deal_fields",
            notification.attributes.stage.clone(),
        );
        publish_result(&self.services, &payload, attributes).await
    }
}
