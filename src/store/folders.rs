//! Folder registry: document-store folder ids per project

use crate::error::FlowResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SALES_AREA: &str = "_SALES";
pub const ENGINEERING_AREA: &str = "_ENGINEERING";
pub const DELIVERY_AREA: &str = "_DELIVERY";
pub const ACCOUNT_AREA: &str = "_ACCOUNT";

/// Root, project folder and named sub-folders of one functional area
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AreaFolders {
    pub root_id: String,
    pub project_id: String,
    #[serde(default)]
    pub sub_folders: BTreeMap<String, String>,
}

impl AreaFolders {
    pub fn sub_folder(&self, name: &str) -> Option<&str> {
        self.sub_folders.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountFolder {
    pub root_id: String,
}

/// The full folder layout for one (customer, project)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderIds {
    pub customer_folder_id: String,
    pub sales_folder: AreaFolders,
    pub engineering_folder: AreaFolders,
    pub delivery_folder: AreaFolders,
    pub account_folder: AccountFolder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub customer: String,
    pub project: String,
    pub folder_ids: FolderIds,
}

#[async_trait]
pub trait FolderRegistry: Send + Sync {
    async fn save_folders(&self, customer: &str, project: &str, ids: &FolderIds)
        -> FlowResult<()>;

    async fn folders(&self, customer: &str, project: &str) -> FlowResult<Option<FolderIds>>;
}
