//! Shared builders for webhook bodies and engines over fakes
#![allow(dead_code)]

use dealflow::clients::MockCrm;
use dealflow::credentials::StaticSecretStore;
use dealflow::notify::MemoryTopic;
use dealflow::pipeline::{EngineSettings, TransitionEngine};
use dealflow::sandbox::{field_keys, sandbox_fields, CRM_TOKEN};
use dealflow::store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SHORT_NAME_FIELD: &str = "short_name_key";
pub const CRM_TOKEN_SECRET: &str = "/dealflow/pipedrive/api-token";
pub const TOPIC: &str = "pipedrive";

/// One deal snapshot as the CRM sends it
#[derive(Debug, Clone)]
pub struct DealBuilder {
    id: i64,
    customer: String,
    project: String,
    stage_id: i64,
    status: String,
    fields: serde_json::Map<String, Value>,
}

impl DealBuilder {
    pub fn new(stage_id: i64) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(field_keys::TERRITORY.to_string(), json!(1));
        fields.insert(field_keys::DEAL_TYPE.to_string(), json!(10));
        fields.insert(field_keys::SOLUTION_PROGRAM.to_string(), json!(20));
        fields.insert(
            field_keys::SOW_LINK.to_string(),
            json!("https://docs.example.com/sow/42"),
        );
        fields.insert(field_keys::GDRIVE_LINK.to_string(), Value::Null);
        fields.insert(
            field_keys::APN_LINK.to_string(),
            json!("https://partners.example.com/opp/42"),
        );
        Self {
            id: 42,
            customer: "Acme Corp".to_string(),
            project: "Data Lake".to_string(),
            stage_id,
            status: "open".to_string(),
            fields,
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn project(mut self, project: &str) -> Self {
        self.project = project.to_string();
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn to_json(&self, short_name_field: &str) -> Value {
        let mut deal = self.fields.clone();
        deal.insert("id".to_string(), json!(self.id));
        deal.insert("org_name".to_string(), json!(self.customer));
        deal.insert("title".to_string(), json!(self.project));
        deal.insert("stage_id".to_string(), json!(self.stage_id));
        deal.insert("pipeline_id".to_string(), json!(1));
        deal.insert("status".to_string(), json!(self.status));
        deal.insert(short_name_field.to_string(), json!("ACME"));
        Value::Object(deal)
    }
}

pub fn added_event(deal: &DealBuilder, short_name_field: &str) -> String {
    json!({
        "event": "added.deal",
        "current": deal.to_json(short_name_field),
        "previous": null,
    })
    .to_string()
}

pub fn updated_event(previous: &DealBuilder, current: &DealBuilder, short_name_field: &str) -> String {
    json!({
        "event": "updated.deal",
        "current": current.to_json(short_name_field),
        "previous": previous.to_json(short_name_field),
    })
    .to_string()
}

/// An engine publishing to an in-memory topic, plus handles on its fakes
pub struct EngineHarness {
    pub engine: TransitionEngine,
    pub topic: Arc<MemoryTopic>,
    pub crm: Arc<MockCrm>,
    pub store: Arc<MemoryStore>,
}

impl EngineHarness {
    pub fn new() -> Self {
        let topic = Arc::new(MemoryTopic::new());
        let crm = Arc::new(MockCrm::new().with_fields(sandbox_fields()));
        let store = Arc::new(MemoryStore::new());
        let secrets = StaticSecretStore::new().with_secret(CRM_TOKEN_SECRET, CRM_TOKEN);

        let settings = EngineSettings {
            topic: TOPIC.to_string(),
            short_name_field: SHORT_NAME_FIELD.to_string(),
            crm_token_secret: CRM_TOKEN_SECRET.to_string(),
        };
        let engine = TransitionEngine::new(
            settings,
            Arc::new(secrets),
            topic.clone(),
            crm.clone(),
            store.clone(),
        );

        Self {
            engine,
            topic,
            crm,
            store,
        }
    }

    /// `action/stage` of every published notification
    pub fn published(&self) -> Vec<String> {
        self.topic
            .notifications()
            .iter()
            .map(|n| format!("{}/{}", n.attributes.action, n.attributes.stage))
            .collect()
    }
}
