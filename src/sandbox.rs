//! A complete pipeline wired to in-memory fakes
//!
//! Backs `dealflow simulate` and the end-to-end tests: the webhook engine and
//! every stage handler share one [`LocalBus`], so a single deal event plays out
//! the whole notification chain locally.

use crate::clients::drive::DriveFile;
use crate::clients::{MockCrm, MockDrive, MockMessaging};
use crate::config::FlowConfig;
use crate::credentials::StaticSecretStore;
use crate::error::FlowResult;
use crate::handlers::build_all;
use crate::notify::{component, Attributes, Delivery, Dispatcher, LocalBus, Notification, Publisher};
use crate::pipeline::fields::FieldDefinition;
use crate::pipeline::{handle_webhook, TransitionEngine};
use crate::response::ActivationResponse;
use crate::services::{Fakes, Services};
use crate::store::MemoryStore;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const PARENT_FOLDER_ID: &str = "customers-root";
pub const TEMPLATE_FOLDER_ID: &str = "templates-root";
pub const SA_EMAIL_WEST: &str = "sa-west@example.com";
pub const SA_EMAIL_EAST: &str = "sa-east@example.com";
pub const APN_EMAIL: &str = "partners@example.com";
pub const CRM_TOKEN: &str = "sandbox-token";
pub const RESOURCE_REQUEST_LINK: &str = "https://forms.example.com/resource-request";

/// (stage, tag) of every template placed in the template folder
pub const TEMPLATE_TAGS: [(&str, &str); 9] = [
    ("lead_in", "AccountPlan"),
    ("lead_in", "RiskLog"),
    ("lead_in", "APNPortalOpp"),
    ("lead_validation", "KickOffNotes"),
    ("solution_development", "DevOpsProgram"),
    ("solution_development", "DataAnalyticsProgram"),
    ("proposal_development", "SOW"),
    ("deal_closure", "WeeklyStatusReport"),
    ("deal_closure", "EngagementDataPoints"),
];

/// CRM keys of the sandbox deal fields
pub mod field_keys {
    pub const TERRITORY: &str = "territory";
    pub const DEAL_TYPE: &str = "deal_type";
    pub const SOLUTION_PROGRAM: &str = "solution_program";
    pub const SOW_LINK: &str = "sow_link";
    pub const GDRIVE_LINK: &str = "gdrive_link";
    pub const APN_LINK: &str = "apn_portal_opp_link";
}

/// Deal field schema served by the sandbox CRM
pub fn sandbox_fields() -> Vec<FieldDefinition> {
    let fields = json!([
        {"key": "title", "name": "Title"},
        {"key": field_keys::TERRITORY, "name": "Territory", "options": [
            {"id": 1, "label": "USWEST"},
            {"id": 2, "label": "USEAST"}
        ]},
        {"key": field_keys::DEAL_TYPE, "name": "Deal Type", "options": [
            {"id": 10, "label": "New Business"},
            {"id": 11, "label": "Expansion"}
        ]},
        {"key": field_keys::SOLUTION_PROGRAM, "name": "Solution Program", "options": [
            {"id": 20, "label": "DevOps Program"},
            {"id": 21, "label": "Data Analytics Program"}
        ]},
        {"key": field_keys::SOW_LINK, "name": "SOW Link"},
        {"key": field_keys::GDRIVE_LINK, "name": "GDrive Link"},
        {"key": field_keys::APN_LINK, "name": "APN Portal Opp Link"}
    ]);
    serde_json::from_value(fields).unwrap_or_default()
}

/// Responses and handler activations caused by one inbound event
#[derive(Debug)]
pub struct SimulationReport {
    pub response: FlowResult<ActivationResponse>,
    pub deliveries: Vec<Delivery>,
}

impl SimulationReport {
    pub fn failed(&self) -> Vec<&Delivery> {
        self.deliveries
            .iter()
            .filter(|d| !matches!(&d.outcome, Ok(r) if r.is_success()))
            .collect()
    }
}

pub struct Sandbox {
    pub bus: Arc<LocalBus>,
    pub fakes: Fakes,
    pub services: Services,
    engine: TransitionEngine,
    dispatcher: Dispatcher,
}

impl Sandbox {
    /// Sandbox over `config`, with folder ids and contacts pointed at the fakes
    pub fn new(mut config: FlowConfig) -> Self {
        config.gdrive_parent_folder_id = PARENT_FOLDER_ID.to_string();
        config.gdrive_template_folder_id = TEMPLATE_FOLDER_ID.to_string();
        config.sa_email_west = SA_EMAIL_WEST.to_string();
        config.sa_email_east = SA_EMAIL_EAST.to_string();
        config.apn_email = APN_EMAIL.to_string();

        let drive = MockDrive::new()
            .with_root(PARENT_FOLDER_ID)
            .with_root(TEMPLATE_FOLDER_ID);
        for (index, (stage, tag)) in TEMPLATE_TAGS.iter().enumerate() {
            let properties: HashMap<String, String> = [
                ("stage".to_string(), stage.to_string()),
                ("tag".to_string(), tag.to_string()),
            ]
            .into_iter()
            .collect();
            drive.add_file(
                TEMPLATE_FOLDER_ID,
                DriveFile {
                    id: format!("tpl-{}", index + 1),
                    name: format!("{} Template", tag),
                    mime_type: "application/vnd.google-apps.document".to_string(),
                    link: None,
                    properties,
                },
            );
        }

        let fakes = Fakes {
            crm: Arc::new(MockCrm::new().with_fields(sandbox_fields())),
            drive: Arc::new(drive),
            messaging: Arc::new(
                MockMessaging::new()
                    .with_user(SA_EMAIL_WEST, "U-SA-WEST")
                    .with_user(SA_EMAIL_EAST, "U-SA-EAST")
                    .with_user(APN_EMAIL, "U-APN"),
            ),
            store: Arc::new(MemoryStore::new()),
        };

        let secrets = StaticSecretStore::new()
            .with_secret(config.pipedrive_token_secret.clone(), CRM_TOKEN)
            .with_secret(config.resource_request_secret.clone(), RESOURCE_REQUEST_LINK);

        let bus = Arc::new(LocalBus::new());
        let services = Services::fakes(config, Arc::new(secrets), bus.clone(), &fakes);
        let engine = TransitionEngine::from_services(&services);
        let mut dispatcher = Dispatcher::new(bus.clone());
        dispatcher.register_all(build_all(&services));

        Self {
            bus,
            fakes,
            services,
            engine,
            dispatcher,
        }
    }

    /// Loads the template folder into the catalog through the refresh handler
    pub async fn refresh_templates(&self) -> FlowResult<Vec<Delivery>> {
        let request = Notification::new(
            Map::new(),
            Attributes::new(component::GDRIVE, "update_templates", "doc_templates"),
        );
        self.inject(request).await
    }

    /// Runs one webhook body through the engine and every downstream handler
    pub async fn deliver_webhook(&self, body: &str) -> SimulationReport {
        let response = handle_webhook(&self.engine, body).await;
        let deliveries = self.dispatch().await;
        info!(
            "Webhook produced {} handler activation(s)",
            deliveries.len()
        );
        SimulationReport {
            response,
            deliveries,
        }
    }

    /// Publishes a notification on its component topic and drains the bus
    pub async fn inject(&self, notification: Notification) -> FlowResult<Vec<Delivery>> {
        let topic = crate::handlers::topic_for(&self.services, &notification.attributes.component)?
            .to_string();
        self.bus.publish(&topic, &notification).await?;
        Ok(self.dispatch().await)
    }

    /// Drains whatever is queued on the bus
    pub async fn dispatch(&self) -> Vec<Delivery> {
        self.dispatcher.run_until_idle().await
    }

    /// Every notification published so far, in order
    pub fn published(&self) -> Vec<Notification> {
        self.bus.recorded().notifications()
    }

    /// `component/action/stage` of every published notification
    pub fn trace(&self) -> Vec<String> {
        self.published()
            .iter()
            .map(|n| {
                format!(
                    "{}/{}/{}",
                    n.attributes.component, n.attributes.action, n.attributes.stage
                )
            })
            .collect()
    }
}
