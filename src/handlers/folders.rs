//! Customer and project folder layout in the document store

use crate::clients::drive::{ensure_folder, DocumentStore, DriveFile};
use crate::error::{FlowError, FlowResult};
use crate::handlers::{publish_result, StageHandler};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::pipeline::stage::Stage;
use crate::services::Services;
use crate::store::folders::{
    AccountFolder, AreaFolders, FolderIds, ACCOUNT_AREA, DELIVERY_AREA, ENGINEERING_AREA,
    SALES_AREA,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const SALES_SUB_FOLDERS: [&str; 4] = ["APN Portal Admin", "Deliverables", "Meeting_Notes", "SOW"];
pub const ENGINEERING_SUB_FOLDERS: [&str; 2] = ["Deliverables", "Provided_Documents"];
pub const DELIVERY_SUB_FOLDERS: [&str; 5] = [
    "Weekly_Action_Reports",
    "Engagement_Data_Reports",
    "Communications",
    "Onboarding",
    "Who's Who",
];

pub fn project_folder_name(project: &str) -> String {
    format!("Project Name: {}", project)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FolderRequest {
    customer_name: String,
    project_name: String,
    deal_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealFieldLinks {
    #[serde(rename = "GDriveLink")]
    pub gdrive_link: String,
    #[serde(rename = "SOWLink")]
    pub sow_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FoldersCreated {
    pub customer_name: String,
    pub project_name: String,
    pub deal_id: i64,
    pub deal_field_links: DealFieldLinks,
    pub folder_ids: FolderIds,
}

pub struct FolderHandler {
    services: Services,
}

impl FolderHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Project folder under an area root plus every required sub-folder
    ///
    /// Sub-folders already present under the project folder are kept in the map,
    /// including ones outside the required set.
    async fn project_area(
        &self,
        area_root: &DriveFile,
        project: &str,
        required: &[&str],
    ) -> FlowResult<AreaFolders> {
        let documents: &dyn DocumentStore = self.services.documents.as_ref();
        let project_folder = ensure_folder(documents, &area_root.id, &project_folder_name(project)).await?;

        let mut sub_folders: BTreeMap<String, String> = documents
            .list_children(&project_folder.id)
            .await?
            .into_iter()
            .filter(DriveFile::is_folder)
            .map(|folder| (folder.name, folder.id))
            .collect();

        for name in required {
            if !sub_folders.contains_key(*name) {
                let folder = documents.create_folder(&project_folder.id, name).await?;
                sub_folders.insert(name.to_string(), folder.id);
            }
        }

        Ok(AreaFolders {
            root_id: area_root.id.clone(),
            project_id: project_folder.id,
            sub_folders,
        })
    }
}

#[async_trait]
impl StageHandler for FolderHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CreateFolders
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let request: FolderRequest = notification.decode()?;
        let documents: &dyn DocumentStore = self.services.documents.as_ref();
        let parent = &self.services.config.gdrive_parent_folder_id;

        let customer = ensure_folder(documents, parent, &request.customer_name).await?;
        let sales = ensure_folder(documents, &customer.id, SALES_AREA).await?;
        let engineering = ensure_folder(documents, &customer.id, ENGINEERING_AREA).await?;
        let delivery = ensure_folder(documents, &customer.id, DELIVERY_AREA).await?;
        let account = ensure_folder(documents, &customer.id, ACCOUNT_AREA).await?;

        let folder_ids = FolderIds {
            customer_folder_id: customer.id.clone(),
            sales_folder: self
                .project_area(&sales, &request.project_name, &SALES_SUB_FOLDERS)
                .await?,
            engineering_folder: self
                .project_area(&engineering, &request.project_name, &ENGINEERING_SUB_FOLDERS)
                .await?,
            delivery_folder: self
                .project_area(&delivery, &request.project_name, &DELIVERY_SUB_FOLDERS)
                .await?,
            account_folder: AccountFolder {
                root_id: account.id,
            },
        };

        let sow_id = folder_ids
            .sales_folder
            .sub_folder("SOW")
            .ok_or_else(|| FlowError::malformed("SOW folder was not created"))?;
        let sow_link = documents.get_file(sow_id).await?.web_link();

        self.services
            .folders
            .save_folders(&request.customer_name, &request.project_name, &folder_ids)
            .await?;
        info!(
            "Folder layout ready for {} - {}",
            request.customer_name, request.project_name
        );

        let payload = FoldersCreated {
            customer_name: request.customer_name,
            project_name: request.project_name,
            deal_id: request.deal_id,
            deal_field_links: DealFieldLinks {
                gdrive_link: customer.web_link(),
                sow_link,
            },
            folder_ids,
        };
        let attributes =
            Attributes::new(component::GDRIVE, "create_folders", Stage::LeadIn.as_str());
        publish_result(&self.services, &payload, attributes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_folder_name() {
        assert_eq!(project_folder_name("Data Lake"), "Project Name: Data Lake");
    }

    #[test]
    fn test_created_payload_field_names() {
        let payload = FoldersCreated {
            customer_name: "Acme".to_string(),
            project_name: "Migration".to_string(),
            deal_id: 1,
            deal_field_links: DealFieldLinks {
                gdrive_link: "g".to_string(),
                sow_link: "s".to_string(),
            },
            folder_ids: FolderIds::default(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["DealFieldLinks"]["GDriveLink"], "g");
        assert_eq!(value["DealFieldLinks"]["SOWLink"], "s");
        assert!(value["FolderIds"]["SalesFolder"].get("SubFolders").is_some());
        assert!(value["FolderIds"]["AccountFolder"].get("RootId").is_some());
    }
}
