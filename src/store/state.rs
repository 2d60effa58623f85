//! Table contents shared by the memory and file backends

use crate::pipeline::deal::DealSnapshot;
use crate::store::channels::{ChannelRecord, WonDeal};
use crate::store::folders::{FolderIds, FolderRecord};
use crate::store::ledger::LedgerRecord;
use crate::store::templates::TemplateRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub deals: Vec<LedgerRecord>,
    #[serde(default)]
    pub folders: Vec<FolderRecord>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    #[serde(default)]
    pub templates: Vec<TemplateRecord>,
}

impl StoreState {
    pub fn record_new(&mut self, deal: &DealSnapshot) {
        let record = LedgerRecord::initial(deal);
        match self
            .deals
            .iter_mut()
            .find(|r| r.matches(&record.customer, &record.project))
        {
            Some(existing) => *existing = record,
            None => self.deals.push(record),
        }
    }

    pub fn record_update(&mut self, deal: &DealSnapshot) {
        match self
            .deals
            .iter_mut()
            .find(|r| r.matches(deal.customer(), deal.project()))
        {
            Some(existing) => {
                existing.current_stage = deal.stage_id;
                existing.deal_status = deal.status.clone();
            }
            None => self.deals.push(LedgerRecord::from_deal(deal)),
        }
    }

    pub fn lookup(&self, customer: &str, project: &str) -> Option<LedgerRecord> {
        self.deals
            .iter()
            .find(|r| r.matches(customer, project))
            .cloned()
    }

    pub fn save_folders(&mut self, customer: &str, project: &str, ids: &FolderIds) {
        let record = FolderRecord {
            customer: customer.to_string(),
            project: project.to_string(),
            folder_ids: ids.clone(),
        };
        match self
            .folders
            .iter_mut()
            .find(|r| r.customer == customer && r.project == project)
        {
            Some(existing) => *existing = record,
            None => self.folders.push(record),
        }
    }

    pub fn folders(&self, customer: &str, project: &str) -> Option<FolderIds> {
        self.folders
            .iter()
            .find(|r| r.customer == customer && r.project == project)
            .map(|r| r.folder_ids.clone())
    }

    pub fn put_channels(&mut self, record: &ChannelRecord) {
        match self
            .channels
            .iter_mut()
            .find(|r| r.customer == record.customer && r.project == record.project)
        {
            Some(existing) => *existing = record.clone(),
            None => self.channels.push(record.clone()),
        }
    }

    pub fn channels(&self, customer: &str, project: &str) -> Option<ChannelRecord> {
        self.channels
            .iter()
            .find(|r| r.customer == customer && r.project == project)
            .cloned()
    }

    pub fn mark_won(&mut self, customer: &str, project: &str, won: &WonDeal) -> Option<ChannelRecord> {
        let record = self
            .channels
            .iter_mut()
            .find(|r| r.customer == customer && r.project == project)?;

        record.current_stage = "deal_closure".to_string();
        record.deal_status = Some("won".to_string());
        record.engagement_data_link = Some(won.engagement_data_link.clone());
        record.weekly_status_reports = [(
            won.report_date.clone(),
            won.weekly_status_report_link.clone(),
        )]
        .into_iter()
        .collect();

        Some(record.clone())
    }

    pub fn put_template(&mut self, record: &TemplateRecord) {
        match self
            .templates
            .iter_mut()
            .find(|r| r.stage == record.stage && r.tag == record.tag)
        {
            Some(existing) => *existing = record.clone(),
            None => self.templates.push(record.clone()),
        }
    }

    pub fn templates_for(&self, stage: &str) -> Vec<TemplateRecord> {
        self.templates
            .iter()
            .filter(|r| r.stage == stage)
            .cloned()
            .collect()
    }
}
