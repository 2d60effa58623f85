//! Stage transition engine
//!
//! Turns one CRM webhook event into zero or more `pipedrive` notifications and
//! keeps the deal ledger in step. Every stage a deal skipped is replayed in order
//! (backfill), so downstream handlers see each stage exactly as if the deal had
//! moved through it.

use crate::clients::crm::{resolve_credentials, CrmClient};
use crate::config::FlowConfig;
use crate::credentials::SecretStore;
use crate::error::{FlowError, FlowResult};
use crate::notify::{component, Attributes, Notification, PublishReceipt, Publisher};
use crate::pipeline::deal::{deal_diff, DealEvent, DealSnapshot, EventKind, ADDED_DEAL, UPDATED_DEAL};
use crate::pipeline::fields::{FieldMap, TRACKED_FIELDS};
use crate::pipeline::stage::{backfill_stages, Stage};
use crate::services::Services;
use crate::store::DealLedger;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Payload of the notification announcing a new deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealCreated {
    pub customer_name: String,
    pub project_name: String,
    #[serde(default)]
    pub short_name: Value,
    pub event_type: String,
    pub deal_id: i64,
}

/// Payload of a stage transition notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealUpdated {
    pub customer_name: String,
    pub project_name: String,
    #[serde(default)]
    pub short_name: Value,
    pub event_type: String,
    #[serde(default)]
    pub territory: Value,
    #[serde(default)]
    pub deal_type: Value,
    #[serde(default)]
    pub solution_program: Value,
    #[serde(rename = "SOWLink", default)]
    pub sow_link: Value,
    #[serde(rename = "GDriveLink", default)]
    pub gdrive_link: Value,
    #[serde(rename = "APNPortalOppLink", default)]
    pub apn_portal_opp_link: Value,
    pub deal_id: i64,
    #[serde(default)]
    pub updates: Map<String, Value>,
}

/// What the engine did with an event
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Notifications were published and the ledger updated
    Processed {
        stage: Stage,
        published: Vec<PublishReceipt>,
    },
    /// The event was accepted but required no work
    NoAction(String),
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Topic the engine publishes to
    pub topic: String,
    /// CRM key of the short-name custom field
    pub short_name_field: String,
    /// Secret name of the CRM API token
    pub crm_token_secret: String,
}

impl EngineSettings {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            topic: config.pipedrive_topic.clone(),
            short_name_field: config.short_name_field.clone(),
            crm_token_secret: config.pipedrive_token_secret.clone(),
        }
    }
}

pub struct TransitionEngine {
    settings: EngineSettings,
    secrets: Arc<dyn SecretStore>,
    publisher: Arc<dyn Publisher>,
    crm: Arc<dyn CrmClient>,
    ledger: Arc<dyn DealLedger>,
}

impl TransitionEngine {
    pub fn new(
        settings: EngineSettings,
        secrets: Arc<dyn SecretStore>,
        publisher: Arc<dyn Publisher>,
        crm: Arc<dyn CrmClient>,
        ledger: Arc<dyn DealLedger>,
    ) -> Self {
        Self {
            settings,
            secrets,
            publisher,
            crm,
            ledger,
        }
    }

    pub fn from_services(services: &Services) -> Self {
        Self::new(
            EngineSettings::from_config(&services.config),
            services.secrets.clone(),
            services.publisher.clone(),
            services.crm.clone(),
            services.ledger.clone(),
        )
    }

    pub async fn process(&self, event: &DealEvent) -> FlowResult<TransitionOutcome> {
        match event.kind() {
            EventKind::Added => self.added(event).await,
            EventKind::Updated => self.updated(event).await,
            EventKind::Other(kind) => {
                debug!("Ignoring {} event", kind);
                Ok(TransitionOutcome::NoAction(format!(
                    "No actions for {} events",
                    kind
                )))
            }
        }
    }

    async fn added(&self, event: &DealEvent) -> FlowResult<TransitionOutcome> {
        let deal = &event.current;
        let stage = deal.stage()?;
        info!(
            "New deal {} for {} - {} at {}",
            deal.id,
            deal.customer(),
            deal.project(),
            stage
        );

        let mut published = vec![self.publish_created(deal).await?];
        self.ledger.record_new(deal).await?;

        if stage > Stage::LeadIn {
            let mut fields = None;
            for skipped in backfill_stages(Stage::LeadIn.id(), stage.id()) {
                let receipt = self
                    .transition(deal, event, skipped, true, &mut fields)
                    .await?;
                published.extend(receipt);
            }
            self.ledger.record_update(deal).await?;
        }

        Ok(TransitionOutcome::Processed { stage, published })
    }

    async fn updated(&self, event: &DealEvent) -> FlowResult<TransitionOutcome> {
        let deal = &event.current;
        let stage = deal.stage()?;
        check_regression(deal, event.previous.as_ref())?;

        if stage == Stage::LeadIn {
            return Ok(TransitionOutcome::NoAction(
                "No actions for lead_in updates".to_string(),
            ));
        }

        let mut published = Vec::new();
        let mut fields = None;

        if self
            .ledger
            .lookup(deal.customer(), deal.project())
            .await?
            .is_none()
        {
            warn!(
                "No ledger record for {} - {}, replaying from lead_in",
                deal.customer(),
                deal.project()
            );
            published.push(self.publish_created(deal).await?);
            for skipped in backfill_stages(Stage::LeadIn.id(), stage.id() - 1) {
                let receipt = self
                    .transition(deal, event, skipped, true, &mut fields)
                    .await?;
                published.extend(receipt);
            }
            // Recorded only once the catch-up has fully published
            self.ledger.record_new(deal).await?;
        }

        match self
            .transition(deal, event, stage, false, &mut fields)
            .await?
        {
            Some(receipt) => published.push(receipt),
            None if published.is_empty() => {
                return Ok(TransitionOutcome::NoAction(format!(
                    "No stage change for deal {}",
                    deal.id
                )));
            }
            None => {}
        }

        self.ledger.record_update(deal).await?;
        Ok(TransitionOutcome::Processed { stage, published })
    }

    async fn publish_created(&self, deal: &DealSnapshot) -> FlowResult<PublishReceipt> {
        let payload = DealCreated {
            customer_name: deal.customer().to_string(),
            project_name: deal.project().to_string(),
            short_name: deal.field(&self.settings.short_name_field),
            event_type: ADDED_DEAL.to_string(),
            deal_id: deal.id,
        };
        let attributes = Attributes::new(component::PIPEDRIVE, ADDED_DEAL, Stage::LeadIn.as_str())
            .with_pipeline(deal.pipeline_id)
            .with_status(deal.status.as_str());

        let notification = Notification::from_payload(&payload, attributes)?;
        self.publisher
            .publish(&self.settings.topic, &notification)
            .await
    }

    /// Publishes one update transition, or nothing when the stage did not change
    async fn transition(
        &self,
        deal: &DealSnapshot,
        event: &DealEvent,
        target: Stage,
        backfill: bool,
        fields: &mut Option<FieldMap>,
    ) -> FlowResult<Option<PublishReceipt>> {
        let previous = event.previous.as_ref();

        if !backfill {
            if let Some(previous) = previous {
                if previous.stage_id == deal.stage_id && !deal.status.is_won() {
                    debug!("Deal {} stayed at {}", deal.id, target);
                    return Ok(None);
                }
            }
        }

        let updates = deal_diff(deal, previous);
        // Synthesized stages keep their own stage even when the deal was won
        let stage = if !backfill && updates.get("status").and_then(Value::as_str) == Some("won") {
            Stage::DealClosure
        } else {
            target
        };

        let field_map = match fields.take() {
            Some(map) => map,
            None => self.field_map().await?,
        };

        let payload = DealUpdated {
            customer_name: deal.customer().to_string(),
            project_name: deal.project().to_string(),
            short_name: deal.field(&self.settings.short_name_field),
            event_type: event.event.clone(),
            territory: field_map.lookup("Territory", deal),
            deal_type: field_map.lookup("DealType", deal),
            solution_program: field_map.lookup("SolutionProgram", deal),
            sow_link: field_map.lookup("SOWLink", deal),
            gdrive_link: field_map.lookup("GDriveLink", deal),
            apn_portal_opp_link: field_map.lookup("APNPortalOppLink", deal),
            deal_id: deal.id,
            updates,
        };
        *fields = Some(field_map);

        let attributes = Attributes::new(component::PIPEDRIVE, UPDATED_DEAL, stage.as_str())
            .with_pipeline(deal.pipeline_id)
            .with_status(deal.status.as_str());

        let notification = Notification::from_payload(&payload, attributes)?;
        let receipt = self
            .publisher
            .publish(&self.settings.topic, &notification)
            .await?;

        info!(
            "Deal {} transitioned to {}{}",
            deal.id,
            stage,
            if backfill { " (backfill)" } else { "" }
        );
        Ok(Some(receipt))
    }

    async fn field_map(&self) -> FlowResult<FieldMap> {
        let credentials = resolve_credentials(
            self.secrets.as_ref(),
            self.crm.as_ref(),
            &self.settings.crm_token_secret,
        )
        .await?;
        let definitions = self.crm.deal_fields(&credentials).await?;
        Ok(FieldMap::build(&definitions, &TRACKED_FIELDS))
    }
}

fn check_regression(current: &DealSnapshot, previous: Option<&DealSnapshot>) -> FlowResult<()> {
    let Some(previous) = previous else {
        return Ok(());
    };
    if current.stage_id < previous.stage_id {
        return Err(FlowError::RegressiveTransition {
            previous: previous.stage_id,
            current: current.stage_id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(stage_id: i64) -> DealSnapshot {
        serde_json::from_value(json!({
            "id": 1,
            "org_name": "Acme",
            "title": "Migration",
            "stage_id": stage_id,
            "pipeline_id": 1,
            "status": "open",
        }))
        .unwrap()
    }

    #[test]
    fn test_regression_detected() {
        let err = check_regression(&snapshot(2), Some(&snapshot(4))).unwrap_err();
        assert!(matches!(
            err,
            FlowError::RegressiveTransition {
                previous: 4,
                current: 2
            }
        ));
    }

    #[test]
    fn test_regression_reports_raw_stage_ids() {
        let err = check_regression(&snapshot(2), Some(&snapshot(300))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Current stage 2 is less than previous stage 300"
        );
    }

    #[test]
    fn test_forward_and_first_sight_allowed() {
        assert!(check_regression(&snapshot(4), Some(&snapshot(2))).is_ok());
        assert!(check_regression(&snapshot(4), Some(&snapshot(4))).is_ok());
        assert!(check_regression(&snapshot(1), None).is_ok());
    }

    #[test]
    fn test_update_payload_uses_link_field_names() {
        let payload = DealUpdated {
            customer_name: "Acme".to_string(),
            project_name: "Migration".to_string(),
            short_name: Value::Null,
            event_type: UPDATED_DEAL.to_string(),
            territory: json!("USWEST"),
            deal_type: Value::Null,
            solution_program: Value::Null,
            sow_link: json!("https://sow"),
            gdrive_link: Value::Null,
            apn_portal_opp_link: Value::Null,
            deal_id: 1,
            updates: Map::new(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        for key in [
            "CustomerName",
            "ProjectName",
            "ShortName",
            "EventType",
            "Territory",
            "DealType",
            "SolutionProgram",
            "SOWLink",
            "GDriveLink",
            "APNPortalOppLink",
            "DealId",
            "Updates",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
