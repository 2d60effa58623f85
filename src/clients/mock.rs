//! In-memory fakes of the external services, for tests and local simulation

use crate::clients::crm::{CrmClient, CrmCredentials};
use crate::clients::drive::{DocumentStore, DriveFile, FOLDER_MIME_TYPE};
use crate::clients::messaging::{Channel, MessagingClient};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::fields::FieldDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A recorded deal field write
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub deal_id: i64,
    pub field_key: String,
    pub value: Value,
}

pub struct MockCrm {
    domain: String,
    fields: Mutex<Vec<FieldDefinition>>,
    updates: Mutex<Vec<FieldUpdate>>,
    schema_failures: Mutex<usize>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self {
            domain: "example".to_string(),
            fields: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            schema_failures: Mutex::new(0),
        }
    }

    pub fn with_fields(self, fields: Vec<FieldDefinition>) -> Self {
        *self.fields.lock().unwrap() = fields;
        self
    }

    /// Makes the next `count` schema fetches fail with a retryable error
    pub fn fail_schema(&self, count: usize) {
        *self.schema_failures.lock().unwrap() = count;
    }

    pub fn updates(&self) -> Vec<FieldUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl Default for MockCrm {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockCrm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCrm")
            .field("domain", &self.domain)
            .field("updates", &self.updates.lock().unwrap().len())
            .finish()
    }
}

#[async_trait]
impl CrmClient for MockCrm {
    async fn company_domain(&self, _token: &str) -> FlowResult<String> {
        Ok(self.domain.clone())
    }

    async fn deal_fields(&self, _credentials: &CrmCredentials) -> FlowResult<Vec<FieldDefinition>> {
        let mut failures = self.schema_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(FlowError::HttpStatus {
                service: "pipedrive".to_string(),
                status: 503,
                message: "schema unavailable".to_string(),
            });
        }
        Ok(self.fields.lock().unwrap().clone())
    }

    async fn update_deal_field(
        &self,
        _credentials: &CrmCredentials,
        deal_id: i64,
        field_key: &str,
        value: &Value,
    ) -> FlowResult<()> {
        self.updates.lock().unwrap().push(FieldUpdate {
            deal_id,
            field_key: field_key.to_string(),
            value: value.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    parent: String,
    file: DriveFile,
}

/// Folder tree keyed by parent id
pub struct MockDrive {
    entries: Mutex<Vec<Entry>>,
    roots: Mutex<HashSet<String>>,
    missing: Mutex<HashSet<String>>,
    broken: Mutex<HashSet<String>>,
    next_id: Mutex<u64>,
    created_folders: Mutex<usize>,
    copies: Mutex<usize>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            roots: Mutex::new(HashSet::new()),
            missing: Mutex::new(HashSet::new()),
            broken: Mutex::new(HashSet::new()),
            next_id: Mutex::new(1),
            created_folders: Mutex::new(0),
            copies: Mutex::new(0),
        }
    }

    /// Registers a top-level folder that exists without a parent
    pub fn with_root(self, folder_id: &str) -> Self {
        self.roots.lock().unwrap().insert(folder_id.to_string());
        self
    }

    /// Places a file (or folder) under `parent`
    pub fn add_file(&self, parent: &str, file: DriveFile) {
        self.entries.lock().unwrap().push(Entry {
            parent: parent.to_string(),
            file,
        });
    }

    /// Copies of this source id answer 404
    pub fn mark_missing(&self, source_id: &str) {
        self.missing.lock().unwrap().insert(source_id.to_string());
    }

    /// Copies of this source id answer 500
    pub fn mark_broken(&self, source_id: &str) {
        self.broken.lock().unwrap().insert(source_id.to_string());
    }

    pub fn created_folders(&self) -> usize {
        *self.created_folders.lock().unwrap()
    }

    pub fn copies(&self) -> usize {
        *self.copies.lock().unwrap()
    }

    pub fn children(&self, parent: &str) -> Vec<DriveFile> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.parent == parent)
            .map(|e| e.file.clone())
            .collect()
    }

    fn folder_exists(&self, id: &str) -> bool {
        self.roots.lock().unwrap().contains(id)
            || self
                .entries
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.file.id == id && e.file.is_folder())
    }

    fn new_file(&self, name: &str, mime_type: &str) -> DriveFile {
        let mut next = self.next_id.lock().unwrap();
        let id = format!("file-{}", *next);
        *next += 1;
        DriveFile {
            link: Some(format!("https://drive.example.com/{}", id)),
            id,
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            properties: HashMap::new(),
        }
    }

    fn not_found(id: &str) -> FlowError {
        FlowError::HttpStatus {
            service: "gdrive".to_string(),
            status: 404,
            message: format!("File not found: {}", id),
        }
    }
}

impl Default for MockDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDrive")
            .field("entries", &self.entries.lock().unwrap().len())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MockDrive {
    async fn list_children(&self, folder_id: &str) -> FlowResult<Vec<DriveFile>> {
        if !self.folder_exists(folder_id) {
            return Err(Self::not_found(folder_id));
        }
        Ok(self.children(folder_id))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> FlowResult<DriveFile> {
        if !self.folder_exists(parent_id) {
            return Err(Self::not_found(parent_id));
        }
        let folder = self.new_file(name, FOLDER_MIME_TYPE);
        self.add_file(parent_id, folder.clone());
        *self.created_folders.lock().unwrap() += 1;
        Ok(folder)
    }

    async fn copy_file(
        &self,
        source_id: &str,
        name: &str,
        parent_id: &str,
    ) -> FlowResult<DriveFile> {
        if self.missing.lock().unwrap().contains(source_id) {
            return Err(Self::not_found(source_id));
        }
        if self.broken.lock().unwrap().contains(source_id) {
            return Err(FlowError::HttpStatus {
                service: "gdrive".to_string(),
                status: 500,
                message: "Internal error".to_string(),
            });
        }
        if !self.folder_exists(parent_id) {
            return Err(Self::not_found(parent_id));
        }

        let copy = self.new_file(name, "application/vnd.google-apps.document");
        self.add_file(parent_id, copy.clone());
        *self.copies.lock().unwrap() += 1;
        Ok(copy)
    }

    async fn get_file(&self, file_id: &str) -> FlowResult<DriveFile> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.file.id == file_id)
            .map(|e| e.file.clone())
            .ok_or_else(|| Self::not_found(file_id))
    }
}

/// A message posted through [`MockMessaging`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: String,
    pub text: String,
}

pub struct MockMessaging {
    channels: Mutex<Vec<Channel>>,
    users: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<SentMessage>>,
    created: Mutex<usize>,
}

impl MockMessaging {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            users: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            created: Mutex::new(0),
        }
    }

    pub fn with_user(self, email: &str, user_id: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(email.to_string(), user_id.to_string());
        self
    }

    pub fn with_channel(self, id: &str, name: &str) -> Self {
        self.channels.lock().unwrap().push(Channel {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.channels.lock().unwrap().clone()
    }

    pub fn created_channels(&self) -> usize {
        *self.created.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockMessaging {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockMessaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockMessaging")
            .field("channels", &self.channels.lock().unwrap().len())
            .field("sent", &self.sent.lock().unwrap().len())
            .finish()
    }
}

#[async_trait]
impl MessagingClient for MockMessaging {
    async fn list_channels(&self) -> FlowResult<Vec<Channel>> {
        Ok(self.channels())
    }

    async fn create_channel(&self, name: &str) -> FlowResult<Channel> {
        let mut channels = self.channels.lock().unwrap();
        if channels.iter().any(|c| c.name == name) {
            return Err(FlowError::ApiRejected {
                service: "slack conversations.create".to_string(),
                error: "name_taken".to_string(),
                detail: None,
            });
        }
        let channel = Channel {
            id: format!("C{:04}", channels.len() + 1),
            name: name.to_string(),
        };
        channels.push(channel.clone());
        *self.created.lock().unwrap() += 1;
        Ok(channel)
    }

    async fn lookup_user_by_email(&self, email: &str) -> FlowResult<String> {
        self.users
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .ok_or_else(|| FlowError::ApiRejected {
                service: "slack users.lookupByEmail".to_string(),
                error: "users_not_found".to_string(),
                detail: None,
            })
    }

    async fn open_direct_message(&self, user_id: &str) -> FlowResult<String> {
        Ok(format!("D-{}", user_id))
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> FlowResult<()> {
        self.sent.lock().unwrap().push(SentMessage {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
