//! Channel registry: messaging channels and closure links per project

use crate::error::FlowResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub customer: String,
    pub project: String,
    pub deal_id: i64,
    pub current_stage: String,
    #[serde(default)]
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub deal_status: Option<String>,
    pub customer_channel_id: String,
    pub project_channel_id: String,
    #[serde(default)]
    pub engagement_data_link: Option<String>,
    /// Weekly status report links keyed by report date (MM-DD-YYYY)
    #[serde(default)]
    pub weekly_status_reports: BTreeMap<String, String>,
}

/// Closure details recorded when a deal is won
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WonDeal {
    pub engagement_data_link: String,
    pub report_date: String,
    pub weekly_status_report_link: String,
}

#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    async fn put_channels(&self, record: &ChannelRecord) -> FlowResult<()>;

    async fn channels(&self, customer: &str, project: &str) -> FlowResult<Option<ChannelRecord>>;

    /// Marks the project won at `deal_closure` and returns the updated record,
    /// or `None` when no channels were ever recorded for it
    async fn mark_won(
        &self,
        customer: &str,
        project: &str,
        won: &WonDeal,
    ) -> FlowResult<Option<ChannelRecord>>;
}
