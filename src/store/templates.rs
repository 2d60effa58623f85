//! Template catalog: source document ids keyed by (stage, tag)

use crate::error::FlowResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stage recorded for templates without a `stage` property
pub const UNSTAGED: &str = "none";
/// Tag recorded for templates without a `tag` property
pub const UNTAGGED: &str = "untagged";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub stage: String,
    pub tag: String,
    pub title: String,
    pub id: String,
}

#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    /// Inserts or replaces the template for its (stage, tag)
    async fn put_template(&self, record: &TemplateRecord) -> FlowResult<()>;

    async fn templates_for(&self, stage: &str) -> FlowResult<Vec<TemplateRecord>>;
}

/// Template ids of one stage by tag
pub fn ids_by_tag(records: &[TemplateRecord]) -> HashMap<String, String> {
    records
        .iter()
        .map(|record| (record.tag.clone(), record.id.clone()))
        .collect()
}
