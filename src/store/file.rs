//! JSON-file backed tables for single-host deployments

use crate::error::{FlowError, FlowResult};
use crate::pipeline::deal::DealSnapshot;
use crate::store::channels::{ChannelRecord, ChannelRegistry, WonDeal};
use crate::store::folders::{FolderIds, FolderRegistry};
use crate::store::ledger::{DealLedger, LedgerRecord};
use crate::store::state::StoreState;
use crate::store::templates::{TemplateCatalog, TemplateRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Keeps every table in one JSON document, rewritten on each change
///
/// The lock serializes access within a process; writes go through a temporary
/// file and a rename so readers never observe a partial document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, table: &str) -> FlowResult<StoreState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(StoreState::default()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                FlowError::persistence(table, format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(FlowError::persistence(table, e)),
        }
    }

    async fn save(&self, table: &str, state: &StoreState) -> FlowResult<()> {
        let contents =
            serde_json::to_string_pretty(state).map_err(|e| FlowError::persistence(table, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| FlowError::persistence(table, e))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| FlowError::persistence(table, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| FlowError::persistence(table, e))?;

        debug!("Saved {} to {}", table, self.path.display());
        Ok(())
    }

    async fn read<T>(&self, table: &str, f: impl FnOnce(&StoreState) -> T) -> FlowResult<T> {
        let _guard = self.lock.lock().await;
        let state = self.load(table).await?;
        Ok(f(&state))
    }

    async fn modify<T>(&self, table: &str, f: impl FnOnce(&mut StoreState) -> T) -> FlowResult<T> {
        let _guard = self.lock.lock().await;
        let mut state = self.load(table).await?;
        let result = f(&mut state);
        self.save(table, &state).await?;
        Ok(result)
    }
}

#[async_trait]
impl DealLedger for JsonFileStore {
    async fn record_new(&self, deal: &DealSnapshot) -> FlowResult<()> {
        self.modify("deals", |s| s.record_new(deal)).await
    }

    async fn record_update(&self, deal: &DealSnapshot) -> FlowResult<()> {
        self.modify("deals", |s| s.record_update(deal)).await
    }

    async fn lookup(&self, customer: &str, project: &str) -> FlowResult<Option<LedgerRecord>> {
        self.read("deals", |s| s.lookup(customer, project)).await
    }
}

#[async_trait]
impl FolderRegistry for JsonFileStore {
    async fn save_folders(&self, customer: &str, project: &str, ids: &FolderIds) -> FlowResult<()> {
        self.modify("folders", |s| s.save_folders(customer, project, ids))
            .await
    }

    async fn folders(&self, customer: &str, project: &str) -> FlowResult<Option<FolderIds>> {
        self.read("folders", |s| s.folders(customer, project)).await
    }
}

#[async_trait]
impl ChannelRegistry for JsonFileStore {
    async fn put_channels(&self, record: &ChannelRecord) -> FlowResult<()> {
        self.modify("channels", |s| s.put_channels(record)).await
    }

    async fn channels(&self, customer: &str, project: &str) -> FlowResult<Option<ChannelRecord>> {
        self.read("channels", |s| s.channels(customer, project)).await
    }

    async fn mark_won(
        &self,
        customer: &str,
        project: &str,
        won: &WonDeal,
    ) -> FlowResult<Option<ChannelRecord>> {
        self.modify("channels", |s| s.mark_won(customer, project, won))
            .await
    }
}

#[async_trait]
impl TemplateCatalog for JsonFileStore {
    async fn put_template(&self, record: &TemplateRecord) -> FlowResult<()> {
        self.modify("templates", |s| s.put_template(record)).await
    }

    async fn templates_for(&self, stage: &str) -> FlowResult<Vec<TemplateRecord>> {
        self.read("templates", |s| s.templates_for(stage)).await
    }
}
