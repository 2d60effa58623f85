//! In-memory tables, used by tests and the local simulation

use crate::error::{FlowError, FlowResult};
use crate::pipeline::deal::DealSnapshot;
use crate::store::channels::{ChannelRecord, ChannelRegistry, WonDeal};
use crate::store::folders::{FolderIds, FolderRegistry};
use crate::store::ledger::{DealLedger, LedgerRecord};
use crate::store::state::StoreState;
use crate::store::templates::{TemplateCatalog, TemplateRecord};
use async_trait::async_trait;
use std::sync::Mutex;

/// All four tables behind one lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    unavailable: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with a retryable persistence error
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().unwrap().clone()
    }

    fn with_state<T>(&self, table: &str, f: impl FnOnce(&mut StoreState) -> T) -> FlowResult<T> {
        if *self.unavailable.lock().unwrap() {
            return Err(FlowError::persistence(table, "store unavailable"));
        }
        let mut state = self.state.lock().unwrap();
        Ok(f(&mut state))
    }
}

#[async_trait]
impl DealLedger for MemoryStore {
    async fn record_new(&self, deal: &DealSnapshot) -> FlowResult<()> {
        self.with_state("deals", |s| s.record_new(deal))
    }

    async fn record_update(&self, deal: &DealSnapshot) -> FlowResult<()> {
        self.with_state("deals", |s| s.record_update(deal))
    }

    async fn lookup(&self, customer: &str, project: &str) -> FlowResult<Option<LedgerRecord>> {
        self.with_state("deals", |s| s.lookup(customer, project))
    }
}

#[async_trait]
impl FolderRegistry for MemoryStore {
    async fn save_folders(&self, customer: &str, project: &str, ids: &FolderIds) -> FlowResult<()> {
        self.with_state("folders", |s| s.save_folders(customer, project, ids))
    }

    async fn folders(&self, customer: &str, project: &str) -> FlowResult<Option<FolderIds>> {
        self.with_state("folders", |s| s.folders(customer, project))
    }
}

#[async_trait]
impl ChannelRegistry for MemoryStore {
    async fn put_channels(&self, record: &ChannelRecord) -> FlowResult<()> {
        self.with_state("channels", |s| s.put_channels(record))
    }

    async fn channels(&self, customer: &str, project: &str) -> FlowResult<Option<ChannelRecord>> {
        self.with_state("channels", |s| s.channels(customer, project))
    }

    async fn mark_won(
        &self,
        customer: &str,
        project: &str,
        won: &WonDeal,
    ) -> FlowResult<Option<ChannelRecord>> {
        self.with_state("channels", |s| s.mark_won(customer, project, won))
    }
}

#[async_trait]
impl TemplateCatalog for MemoryStore {
    async fn put_template(&self, record: &TemplateRecord) -> FlowResult<()> {
        self.with_state("templates", |s| s.put_template(record))
    }

    async fn templates_for(&self, stage: &str) -> FlowResult<Vec<TemplateRecord>> {
        self.with_state("templates", |s| s.templates_for(stage))
    }
}
