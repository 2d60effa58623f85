//! Whole-chain behaviour: webhook, engine and every stage handler on one local bus

mod support;

use dealflow::notify::{component, Attributes, Notification, Publisher};
use dealflow::sandbox::{Sandbox, RESOURCE_REQUEST_LINK};
use dealflow::store::ChannelRegistry;
use dealflow::FlowConfig;
use serde_json::{json, Map, Value};
use support::{added_event, updated_event, DealBuilder};

async fn sandbox() -> Sandbox {
    let sandbox = Sandbox::new(FlowConfig::default());
    sandbox.refresh_templates().await.unwrap();
    sandbox
}

fn short_name_field(sandbox: &Sandbox) -> String {
    sandbox.services.config.short_name_field.clone()
}

fn trace_since(sandbox: &Sandbox, skip: usize) -> Vec<String> {
    sandbox.trace().into_iter().skip(skip).collect()
}

fn last_with_action(sandbox: &Sandbox, action: &str) -> Notification {
    sandbox
        .published()
        .into_iter()
        .filter(|n| n.attributes.action == action)
        .last()
        .unwrap()
}

async fn advance(sandbox: &Sandbox, from: &DealBuilder, to: &DealBuilder) {
    let body = updated_event(from, to, &short_name_field(sandbox));
    let report = sandbox.deliver_webhook(&body).await;
    assert_eq!(report.response.as_ref().unwrap().status_code, 200);
    assert!(report.failed().is_empty(), "{:?}", report.failed());
}

#[tokio::test]
async fn test_new_deal_runs_lead_in_chain_depth_first() {
    let sandbox = sandbox().await;
    let start = sandbox.published().len();

    let body = added_event(&DealBuilder::new(1), &short_name_field(&sandbox));
    let report = sandbox.deliver_webhook(&body).await;

    assert_eq!(report.response.as_ref().unwrap().status_code, 200);
    assert!(report.failed().is_empty(), "{:?}", report.failed());
    assert_eq!(
        trace_since(&sandbox, start),
        vec![
            "pipedrive/added.deal/lead_in",
            "gdrive/create_folders/lead_in",
            "gdrive/copy_files/lead_in",
            "pipedrive/update_deal_fields/lead_in",
            "pipedrive/update_deal_fields/lead_in",
            "slack/create_channel/lead_in",
        ]
    );

    // customer + 4 areas + 3 project folders + 11 sub-folders
    assert_eq!(sandbox.fakes.drive.created_folders(), 19);
    assert_eq!(sandbox.fakes.drive.copies(), 3);
    assert_eq!(sandbox.fakes.messaging.created_channels(), 2);

    let names: Vec<String> = sandbox
        .fakes
        .messaging
        .channels()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["acme", "acme-data-lake"]);

    let copied = last_with_action(&sandbox, "copy_files");
    let links = copied.payload["CopiedFileLinks"].as_object().unwrap();
    assert!(links.contains_key("AccountPlanLink"));
    assert!(links.contains_key("RiskLogLink"));
    assert!(links.contains_key("APNPortalOppLink"));

    // APN link from the copy, then GDrive and SOW links from the folder layout
    let written: Vec<String> = sandbox
        .fakes
        .crm
        .updates()
        .into_iter()
        .map(|u| u.field_key)
        .collect();
    assert_eq!(written, vec!["apn_portal_opp_link", "sow_link", "gdrive_link"]);
}

#[tokio::test]
async fn test_replayed_creation_does_not_duplicate_resources() {
    let sandbox = sandbox().await;
    let body = added_event(&DealBuilder::new(1), &short_name_field(&sandbox));

    sandbox.deliver_webhook(&body).await;
    let report = sandbox.deliver_webhook(&body).await;

    assert!(report.failed().is_empty(), "{:?}", report.failed());
    assert_eq!(sandbox.fakes.drive.created_folders(), 19);
    assert_eq!(sandbox.fakes.drive.copies(), 3);
    assert_eq!(sandbox.fakes.messaging.created_channels(), 2);
}

#[tokio::test]
async fn test_full_lifecycle_to_won() {
    let sandbox = sandbox().await;
    let field = short_name_field(&sandbox);
    let report = sandbox
        .deliver_webhook(&added_event(&DealBuilder::new(1), &field))
        .await;
    assert!(report.failed().is_empty(), "{:?}", report.failed());

    advance(&sandbox, &DealBuilder::new(1), &DealBuilder::new(2)).await;
    let sent = sandbox.fakes.messaging.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel_id, "D-U-SA-WEST");
    assert!(sent[0]
        .text
        .starts_with("Please add the pre-kickoff meeting notes here: https://drive.example.com/"));
    assert_eq!(
        last_with_action(&sandbox, "send_message_to_sa").payload["MessageStatus"],
        "lead_validation Message successfully sent to SA"
    );

    advance(&sandbox, &DealBuilder::new(2), &DealBuilder::new(3)).await;
    let program = last_with_action(&sandbox, "copy_files");
    assert_eq!(program.attributes.stage, "solution_development");
    assert!(program.payload["CopiedFileLinks"]
        .get("SolutionProgramLink")
        .is_some());

    advance(&sandbox, &DealBuilder::new(3), &DealBuilder::new(4)).await;
    let sent = sandbox.fakes.messaging.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].text.contains(RESOURCE_REQUEST_LINK));
    assert!(sent[1].text.contains("\nCustomer: Acme Corp\nProject: Data Lake\nSOW Link: "));

    advance(&sandbox, &DealBuilder::new(4), &DealBuilder::new(5)).await;
    let sent = sandbox.fakes.messaging.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[2].channel_id, "D-U-APN");
    assert_eq!(
        sent[2].text,
        "Please complete the APN Opportunity google sheet: https://partners.example.com/opp/42. \
         Link to the SOW is here: https://docs.example.com/sow/42"
    );
    assert!(sent[3].text.starts_with("@here Please review the included SOW"));
    let review = last_with_action(&sandbox, "send_message_engagement_review");
    assert_eq!(
        review.payload["MessageStatus"],
        format!(
            "Message successfully delivered to #{}",
            sandbox.services.config.engagement_channel
        )
    );

    advance(&sandbox, &DealBuilder::new(5), &DealBuilder::new(6).status("won")).await;
    let sent = sandbox.fakes.messaging.sent();
    assert_eq!(sent.len(), 5);
    let record = sandbox
        .fakes
        .store
        .channels("Acme Corp", "Data Lake")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent[4].channel_id, record.project_channel_id);
    assert!(sent[4].text.contains("Engagement Data Report: "));
    assert_eq!(record.current_stage, "deal_closure");
    assert_eq!(record.deal_status.as_deref(), Some("won"));
    assert_eq!(record.weekly_status_reports.len(), 1);
    assert_eq!(
        record.engagement_data_link.as_deref(),
        sent[4].text.rsplit(' ').next()
    );
    assert_eq!(
        last_with_action(&sandbox, "deal_won").attributes.stage,
        "deal_closure"
    );
}

#[tokio::test]
async fn test_copy_without_folders_reports_folder_missing() {
    let sandbox = sandbox().await;
    let mut payload = Map::new();
    payload.insert("CustomerName".to_string(), json!("Globex"));
    payload.insert("ProjectName".to_string(), json!("Unknown"));
    payload.insert("DealId".to_string(), json!(7));
    payload.insert("Territory".to_string(), json!("USEAST"));
    let notification = Notification::new(
        payload,
        Attributes::new(component::PIPEDRIVE, "updated.deal", "lead_validation"),
    );

    let deliveries = sandbox.inject(notification).await.unwrap();

    assert_eq!(deliveries.len(), 1);
    let response = deliveries[0].outcome.as_ref().unwrap();
    assert_eq!(response.status_code, 500);
    assert_eq!(response.error_type(), Some("FolderNotFoundError"));
    assert_eq!(
        sandbox.trace().last().map(String::as_str),
        Some("gdrive/folder_missing/error")
    );
}

#[tokio::test]
async fn test_missing_template_source_stops_the_copy() {
    let sandbox = sandbox().await;
    sandbox.fakes.drive.mark_missing("tpl-1");

    let body = added_event(&DealBuilder::new(1), &short_name_field(&sandbox));
    let report = sandbox.deliver_webhook(&body).await;

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].outcome.as_ref().unwrap().error_type(),
        Some("FolderNotFoundError")
    );
    assert!(sandbox
        .trace()
        .contains(&"gdrive/folder_missing/error".to_string()));
}

#[tokio::test]
async fn test_failed_copy_is_skipped() {
    let sandbox = sandbox().await;
    sandbox.fakes.drive.mark_broken("tpl-2");

    let body = added_event(&DealBuilder::new(1), &short_name_field(&sandbox));
    let report = sandbox.deliver_webhook(&body).await;

    assert!(report.failed().is_empty(), "{:?}", report.failed());
    let copied = last_with_action(&sandbox, "copy_files");
    let links = copied.payload["CopiedFileLinks"].as_object().unwrap();
    assert!(links.contains_key("AccountPlanLink"));
    assert!(!links.contains_key("RiskLogLink"));
}

#[tokio::test]
async fn test_retryable_handler_failure_is_redelivered() {
    let sandbox = sandbox().await;
    let request = Notification::new(
        Map::new(),
        Attributes::new(component::GDRIVE, "update_templates", "doc_templates"),
    );
    sandbox.bus.publish("gdrive", &request).await.unwrap();
    sandbox.bus.recorded().fail_next(1);

    let deliveries = sandbox.dispatch().await;

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].attempts, 2);
    assert!(deliveries[0].outcome.as_ref().unwrap().is_success());
}

#[tokio::test]
async fn test_redelivery_gives_up_after_three_attempts() {
    let sandbox = sandbox().await;
    let request = Notification::new(
        Map::new(),
        Attributes::new(component::GDRIVE, "update_templates", "doc_templates"),
    );
    sandbox.bus.publish("gdrive", &request).await.unwrap();
    sandbox.bus.recorded().fail_next(5);

    let deliveries = sandbox.dispatch().await;

    assert_eq!(deliveries[0].attempts, 3);
    let err = deliveries[0].outcome.as_ref().unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_won_without_channels_is_terminal() {
    let sandbox = sandbox().await;
    let mut links = Map::new();
    links.insert("EngagementDataPointsLink".to_string(), json!("https://e"));
    links.insert("WeeklyStatusReportLink".to_string(), json!("https://w"));
    let mut payload = Map::new();
    payload.insert("CustomerName".to_string(), json!("Initech"));
    payload.insert("ProjectName".to_string(), json!("Billing"));
    payload.insert("DealId".to_string(), json!(9));
    payload.insert("CopiedFileLinks".to_string(), Value::Object(links));

    let deliveries = sandbox
        .inject(Notification::new(
            payload,
            Attributes::new(component::GDRIVE, "copy_files", "deal_closure"),
        ))
        .await
        .unwrap();

    let won = deliveries
        .iter()
        .find(|d| d.handler.as_str() == "deal_won")
        .unwrap();
    let response = won.outcome.as_ref().unwrap();
    assert_eq!(response.status_code, 500);
    assert_eq!(response.error_type(), Some("MalformedEvent"));
    assert!(sandbox.fakes.messaging.sent().is_empty());
}
