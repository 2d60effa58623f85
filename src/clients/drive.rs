//! Document store client: folders, template copies and file properties

use crate::clients::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::error::FlowResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "gdrive";

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const FILE_FIELDS: &str = "id,name,mimeType,webViewLink,properties";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, rename = "webViewLink")]
    pub link: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Web link, falling back to the canonical open URL
    pub fn web_link(&self) -> String {
        self.link
            .clone()
            .unwrap_or_else(|| format!("https://drive.google.com/open?id={}", self.id))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Non-trashed direct children of a folder
    async fn list_children(&self, folder_id: &str) -> FlowResult<Vec<DriveFile>>;

    async fn create_folder(&self, parent_id: &str, name: &str) -> FlowResult<DriveFile>;

    async fn copy_file(&self, source_id: &str, name: &str, parent_id: &str)
        -> FlowResult<DriveFile>;

    async fn get_file(&self, file_id: &str) -> FlowResult<DriveFile>;
}

/// Child folder with exactly this name, if any
pub async fn find_folder(
    store: &dyn DocumentStore,
    parent_id: &str,
    name: &str,
) -> FlowResult<Option<DriveFile>> {
    Ok(store
        .list_children(parent_id)
        .await?
        .into_iter()
        .find(|file| file.is_folder() && file.name == name))
}

/// Existing child folder with this name, or a newly created one
pub async fn ensure_folder(
    store: &dyn DocumentStore,
    parent_id: &str,
    name: &str,
) -> FlowResult<DriveFile> {
    if let Some(existing) = find_folder(store, parent_id, name).await? {
        debug!("Folder '{}' already exists as {}", name, existing.id);
        return Ok(existing);
    }
    info!("Creating folder '{}' under {}", name, parent_id);
    store.create_folder(parent_id, name).await
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive v3 REST client authenticated with a bearer access token
pub struct DriveClient {
    api_base: String,
    access_token: String,
    http_client: Client,
    timeout: Duration,
}

impl DriveClient {
    pub fn new(access_token: String) -> FlowResult<Self> {
        Self::with_endpoint(
            DEFAULT_API_BASE.to_string(),
            access_token,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_endpoint(
        api_base: String,
        access_token: String,
        timeout: Duration,
    ) -> FlowResult<Self> {
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
            http_client: http::build_client(SERVICE, timeout)?,
            timeout,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> FlowResult<DriveFile> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, self.timeout, e))?;
        let response = http::check_status(SERVICE, response).await?;
        http::read_json(SERVICE, response).await
    }
}

#[async_trait]
impl DocumentStore for DriveClient {
    async fn list_children(&self, folder_id: &str) -> FlowResult<Vec<DriveFile>> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let fields = format!("files({})", FILE_FIELDS);
        let response = self
            .http_client
            .get(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", fields.as_str())])
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, self.timeout, e))?;
        let response = http::check_status(SERVICE, response).await?;
        let list: FileList = http::read_json(SERVICE, response).await?;
        Ok(list.files)
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> FlowResult<DriveFile> {
        let request = self
            .http_client
            .post(self.files_url())
            .query(&[("fields", FILE_FIELDS)])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }));
        self.send(request).await
    }

    async fn copy_file(
        &self,
        source_id: &str,
        name: &str,
        parent_id: &str,
    ) -> FlowResult<DriveFile> {
        let request = self
            .http_client
            .post(format!("{}/{}/copy", self.files_url(), source_id))
            .query(&[("fields", FILE_FIELDS)])
            .json(&json!({
                "name": name,
                "parents": [parent_id],
            }));
        let copy = self.send(request).await?;
        info!("Copied {} to '{}' ({})", source_id, name, copy.id);
        Ok(copy)
    }

    async fn get_file(&self, file_id: &str) -> FlowResult<DriveFile> {
        let request = self
            .http_client
            .get(format!("{}/{}", self.files_url(), file_id))
            .query(&[("fields", FILE_FIELDS)]);
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_decoding() {
        let file: DriveFile = serde_json::from_value(json!({
            "id": "abc",
            "name": "SOW",
            "mimeType": FOLDER_MIME_TYPE,
            "webViewLink": "https://drive.google.com/drive/folders/abc",
            "properties": {"stage": "lead_in"}
        }))
        .unwrap();

        assert!(file.is_folder());
        assert_eq!(file.web_link(), "https://drive.google.com/drive/folders/abc");
        assert_eq!(file.properties["stage"], "lead_in");
    }

    #[test]
    fn test_missing_link_falls_back() {
        let file = DriveFile {
            id: "xyz".to_string(),
            ..Default::default()
        };
        assert!(!file.is_folder());
        assert_eq!(file.web_link(), "https://drive.google.com/open?id=xyz");
    }
}
