//! Direct and channel messages sent as the pipeline advances

use crate::clients::messaging::{ensure_channel, MessagingClient};
use crate::error::{FlowError, FlowResult};
use crate::handlers::{publish_result, StageHandler};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::pipeline::stage::Stage;
use crate::services::Services;
use crate::store::channels::WonDeal;
use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

pub const WEST_TERRITORY: &str = "USWEST";

/// The given date when it is a Friday, otherwise the following Friday
pub fn next_friday(date: NaiveDate) -> NaiveDate {
    let days_ahead = (Weekday::Fri.num_days_from_monday() + 7
        - date.weekday().num_days_from_monday())
        % 7;
    date + Duration::days(i64::from(days_ahead))
}

fn link_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(link)) if !link.is_empty() => link.clone(),
        _ => "(not set)".to_string(),
    }
}

fn required_link(links: &Map<String, Value>, key: &str) -> FlowResult<String> {
    links
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FlowError::malformed(format!("missing {}", key)))
}

/// Result payload shared by the message handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageSent {
    pub customer_name: String,
    pub project_name: String,
    pub deal_id: i64,
    #[serde(rename = "SOWLink", default, skip_serializing_if = "Option::is_none")]
    pub sow_link: Option<Value>,
    #[serde(rename = "APNPortalOppLink", default, skip_serializing_if = "Option::is_none")]
    pub apn_portal_opp_link: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_status: Option<String>,
}

impl MessageSent {
    fn new(customer_name: String, project_name: String, deal_id: i64) -> Self {
        Self {
            customer_name,
            project_name,
            deal_id,
            sow_link: None,
            apn_portal_opp_link: None,
            message_status: None,
        }
    }

    fn with_status(mut self, status: impl Into<String>) -> Self {
        self.message_status = Some(status.into());
        self
    }
}

/// Sends `text` as a direct message to the user registered under `email`
async fn direct_message(
    lookup: &dyn MessagingClient,
    bot: &dyn MessagingClient,
    email: &str,
    text: &str,
) -> FlowResult<()> {
    let user_id = lookup.lookup_user_by_email(email).await?;
    let channel_id = bot.open_direct_message(&user_id).await?;
    bot.post_message(&channel_id, text).await
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CopiedFilesRequest {
    customer_name: String,
    project_name: String,
    deal_id: i64,
    #[serde(default)]
    territory: Value,
    #[serde(default)]
    copied_file_links: Map<String, Value>,
    #[serde(default)]
    resource_request_link: Option<String>,
}

/// Message for the solution architect at a stage, or an error for other stages
pub fn sa_message(
    stage: Stage,
    customer: &str,
    project: &str,
    links: &Map<String, Value>,
    resource_request_link: Option<&str>,
) -> FlowResult<String> {
    match stage {
        Stage::LeadValidation => Ok(format!(
            "Please add the pre-kickoff meeting notes here: {}",
            required_link(links, "KickOffNotesLink")?
        )),
        Stage::ProposalDevelopment => {
            let form = resource_request_link
                .ok_or_else(|| FlowError::malformed("missing ResourceRequestLink"))?;
            Ok(format!(
                "Please complete the Resource Request Form: {}\nCustomer: {}\nProject: {}\nSOW Link: {}",
                form,
                customer,
                project,
                required_link(links, "SOWLink")?
            ))
        }
        other => Err(FlowError::malformed(format!(
            "no solution architect message for stage {}",
            other
        ))),
    }
}

/// DMs the territory's solution architect after stage documents were copied
pub struct SaMessageHandler {
    services: Services,
}

impl SaMessageHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    fn architect_email(&self, territory: &Value) -> &str {
        let config = &self.services.config;
        if territory.as_str() == Some(WEST_TERRITORY) {
            &config.sa_email_west
        } else {
            &config.sa_email_east
        }
    }
}

#[async_trait]
impl StageHandler for SaMessageHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::SendMessageToSa
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let stage = notification.attributes.pipeline_stage()?;
        let request: CopiedFilesRequest = notification.decode()?;
        let text = sa_message(
            stage,
            &request.customer_name,
            &request.project_name,
            &request.copied_file_links,
            request.resource_request_link.as_deref(),
        )?;

        let bot = self.services.bot_messaging.as_ref();
        let email = self.architect_email(&request.territory);
        direct_message(bot, bot, email, &text).await?;
        info!("Sent {} message to solution architect {}", stage, email);

        let payload = MessageSent::new(request.customer_name, request.project_name, request.deal_id)
            .with_status(format!("{} Message successfully sent to SA", stage));
        let attributes = Attributes::new(component::SLACK, "send_message_to_sa", stage.as_str());
        publish_result(&self.services, &payload, attributes).await
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NegotiationRequest {
    customer_name: String,
    project_name: String,
    deal_id: i64,
    #[serde(rename = "SOWLink", default)]
    sow_link: Value,
    #[serde(rename = "APNPortalOppLink", default)]
    apn_portal_opp_link: Value,
}

/// DMs the partner-network contact with the opportunity sheet and SOW links
pub struct ApnMessageHandler {
    services: Services,
}

impl ApnMessageHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl StageHandler for ApnMessageHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::SendMessageApn
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let request: NegotiationRequest = notification.decode()?;
        let text = format!(
            "Please complete the APN Opportunity google sheet: {}. Link to the SOW is here: {}",
            link_text(Some(&request.apn_portal_opp_link)),
            link_text(Some(&request.sow_link))
        );

        direct_message(
            self.services.messaging.as_ref(),
            self.services.bot_messaging.as_ref(),
            &self.services.config.apn_email,
            &text,
        )
        .await?;
        info!("Sent APN message for deal {}", request.deal_id);

        let mut payload =
            MessageSent::new(request.customer_name, request.project_name, request.deal_id)
                .with_status("Message successfully delivered");
        payload.sow_link = Some(request.sow_link);
        payload.apn_portal_opp_link = Some(request.apn_portal_opp_link);

        let attributes = Attributes::new(
            component::SLACK,
            "send_message_apn",
            notification.attributes.stage.clone(),
        );
        publish_result(&self.services, &payload, attributes).await
    }
}

/// Posts the SOW to the engagement review channel for feedback
pub struct EngagementReviewHandler {
    services: Services,
}

impl EngagementReviewHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl StageHandler for EngagementReviewHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::SendMessageEngagementReview
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let request: NegotiationRequest = notification.decode()?;
        let channel_name = &self.services.config.engagement_channel;

        let channel = ensure_channel(self.services.messaging.as_ref(), channel_name).await?;
        let text = format!(
            "@here Please review the included SOW and provide feedback with any areas of concern within 24 hours: {}",
            link_text(Some(&request.sow_link))
        );
        self.services
            .bot_messaging
            .post_message(&channel.id, &text)
            .await?;

        let mut payload =
            MessageSent::new(request.customer_name, request.project_name, request.deal_id)
                .with_status(format!("Message successfully delivered to #{}", channel_name));
        payload.sow_link = Some(request.sow_link);

        let attributes = Attributes::new(
            component::SLACK,
            "send_message_engagement_review",
            notification.attributes.stage.clone(),
        );
        publish_result(&self.services, &payload, attributes).await
    }
}

/// Records a won deal and asks the engagement lead for the data report
pub struct DealWonHandler {
    services: Services,
}

impl DealWonHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl StageHandler for DealWonHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::DealWon
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let request: CopiedFilesRequest = notification.decode()?;
        let links = &request.copied_file_links;
        let engagement_link = required_link(links, "EngagementDataPointsLink")?;

        let won = WonDeal {
            engagement_data_link: engagement_link.clone(),
            report_date: next_friday(Local::now().date_naive())
                .format("%m-%d-%Y")
                .to_string(),
            weekly_status_report_link: required_link(links, "WeeklyStatusReportLink")?,
        };
        let record = self
            .services
            .channels
            .mark_won(&request.customer_name, &request.project_name, &won)
            .await?
            .ok_or_else(|| {
                FlowError::malformed(format!(
                    "no channels recorded for {} - {}",
                    request.customer_name, request.project_name
                ))
            })?;

        let text = format!(
            "@here Engagement Lead, please complete the Engagement Data Report\n\
             to capture the customer environment prior to us implementing solutions\n\
             Engagement Data Report: {}",
            engagement_link
        );
        self.services
            .bot_messaging
            .post_message(&record.project_channel_id, &text)
            .await?;
        info!(
            "Deal {} won, reminder posted to {}",
            request.deal_id, record.project_channel_id
        );

        let payload = MessageSent::new(request.customer_name, request.project_name, request.deal_id);
        let attributes = Attributes::new(
            component::SLACK,
            "deal_won",
            notification.attributes.stage.clone(),
        );
        publish_result(&self.services, &payload, attributes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_friday() {
        // 2026-10-19 is a Monday
        assert_eq!(next_friday(date(2026, 10, 19)), date(2026, 10, 23));
        assert_eq!(next_friday(date(2026, 10, 23)), date(2026, 10, 23));
        assert_eq!(next_friday(date(2026, 10, 24)), date(2026, 10, 30));
    }

    #[test]
    fn test_sa_messages_per_stage() {
        let mut links = Map::new();
        links.insert("KickOffNotesLink".to_string(), json!("https://notes"));
        links.insert("SOWLink".to_string(), json!("https://sow"));

        let text = sa_message(Stage::LeadValidation, "Acme", "Migration", &links, None).unwrap();
        assert_eq!(text, "Please add the pre-kickoff meeting notes here: https://notes");

        let text = sa_message(
            Stage::ProposalDevelopment,
            "Acme",
            "Migration",
            &links,
            Some("https://form"),
        )
        .unwrap();
        assert_eq!(
            text,
            "Please complete the Resource Request Form: https://form\nCustomer: Acme\nProject: Migration\nSOW Link: https://sow"
        );

        assert!(sa_message(Stage::Negotiation, "Acme", "Migration", &links, None).is_err());
        assert!(sa_message(Stage::ProposalDevelopment, "Acme", "Migration", &links, None).is_err());
    }

    #[test]
    fn test_link_text_placeholder() {
        assert_eq!(link_text(Some(&json!("https://x"))), "https://x");
        assert_eq!(link_text(Some(&Value::Null)), "(not set)");
        assert_eq!(link_text(None), "(not set)");
    }
}
