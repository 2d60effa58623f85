//! Refreshes the template catalog from the template folder

use crate::error::{FlowError, FlowResult};
use crate::handlers::{publish_result, StageHandler};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::services::Services;
use crate::store::templates::{TemplateRecord, UNSTAGED, UNTAGGED};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplatesRefreshed {
    pub status: String,
    pub template_folder_id: String,
    pub templates: Vec<TemplateRecord>,
}

pub struct TemplateRefreshHandler {
    services: Services,
}

impl TemplateRefreshHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    async fn describe(&self, file_id: &str, title: String) -> FlowResult<TemplateRecord> {
        let file = self.services.documents.get_file(file_id).await?;
        let property = |key: &str, default: &str| {
            file.properties
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Ok(TemplateRecord {
            stage: property("stage", UNSTAGED),
            tag: property("tag", UNTAGGED),
            title,
            id: file.id.clone(),
        })
    }
}

#[async_trait]
impl StageHandler for TemplateRefreshHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::RefreshTemplates
    }

    async fn handle(&self, _notification: &Notification) -> FlowResult<PublishReceipt> {
        let folder_id = self.services.config.gdrive_template_folder_id.clone();
        if folder_id.is_empty() {
            return Err(FlowError::malformed("template folder id is not configured"));
        }

        let mut templates = Vec::new();
        for file in self.services.documents.list_children(&folder_id).await? {
            if file.is_folder() {
                continue;
            }
            let record = self.describe(&file.id, file.name).await?;
            debug!(
                "Template '{}' is {}/{}",
                record.title, record.stage, record.tag
            );
            self.services.templates.put_template(&record).await?;
            templates.push(record);
        }
        info!("Refreshed {} templates from {}", templates.len(), folder_id);

        let payload = TemplatesRefreshed {
            status: "Update Successful".to_string(),
            template_folder_id: folder_id,
            templates,
        };
        let attributes = Attributes::new(component::GDRIVE, "update_db", "doc_templates");
        publish_result(&self.services, &payload, attributes).await
    }
}
