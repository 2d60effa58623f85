//! Deal ledger: last observed stage and status per (customer, project)

use crate::error::FlowResult;
use crate::pipeline::deal::{DealSnapshot, DealStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub customer: String,
    pub project: String,
    pub deal_id: i64,
    pub current_stage: i64,
    pub pipeline_id: i64,
    pub deal_status: DealStatus,
}

impl LedgerRecord {
    pub fn from_deal(deal: &DealSnapshot) -> Self {
        Self {
            customer: deal.customer().to_string(),
            project: deal.project().to_string(),
            deal_id: deal.id,
            current_stage: deal.stage_id,
            pipeline_id: deal.pipeline_id,
            deal_status: deal.status.clone(),
        }
    }

    /// A new deal always enters the ledger at stage 1
    pub fn initial(deal: &DealSnapshot) -> Self {
        Self {
            current_stage: 1,
            ..Self::from_deal(deal)
        }
    }

    pub fn matches(&self, customer: &str, project: &str) -> bool {
        self.customer == customer && self.project == project
    }
}

/// Persistent map keyed by (customer, project); every failure is retryable
#[async_trait]
pub trait DealLedger: Send + Sync {
    /// Inserts or overwrites the record at stage 1
    async fn record_new(&self, deal: &DealSnapshot) -> FlowResult<()>;

    /// Sets stage and status, creating the record if needed
    async fn record_update(&self, deal: &DealSnapshot) -> FlowResult<()>;

    async fn lookup(&self, customer: &str, project: &str) -> FlowResult<Option<LedgerRecord>>;
}
