//! Subscription table: which handler runs for which notification

use crate::error::FlowError;
use crate::notify::notification::{component, Attributes};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Every stage handler the pipeline knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    CreateFolders,
    CopyFiles,
    DealUpdate,
    CreateChannel,
    SendMessageToSa,
    SendMessageApn,
    SendMessageEngagementReview,
    DealWon,
    RefreshTemplates,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 9] = [
        HandlerKind::CreateFolders,
        HandlerKind::CopyFiles,
        HandlerKind::DealUpdate,
        HandlerKind::CreateChannel,
        HandlerKind::SendMessageToSa,
        HandlerKind::SendMessageApn,
        HandlerKind::SendMessageEngagementReview,
        HandlerKind::DealWon,
        HandlerKind::RefreshTemplates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::CreateFolders => "create_folders",
            HandlerKind::CopyFiles => "copy_files",
            HandlerKind::DealUpdate => "deal_update",
            HandlerKind::CreateChannel => "create_channel",
            HandlerKind::SendMessageToSa => "send_message_to_sa",
            HandlerKind::SendMessageApn => "send_message_apn",
            HandlerKind::SendMessageEngagementReview => "send_message_engagement_review",
            HandlerKind::DealWon => "deal_won",
            HandlerKind::RefreshTemplates => "refresh_templates",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandlerKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FlowError::malformed(format!("unknown handler '{}'", s)))
    }
}

/// Attribute filter; an empty list matches any value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeFilter {
    pub component: &'static str,
    pub actions: &'static [&'static str],
    pub stages: &'static [&'static str],
}

fn allowed(list: &[&str], value: &str) -> bool {
    list.is_empty() || list.iter().any(|item| *item == value)
}

impl AttributeFilter {
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.component == attributes.component
            && allowed(self.actions, &attributes.action)
            && allowed(self.stages, &attributes.stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub handler: HandlerKind,
    pub filter: AttributeFilter,
}

const fn subscribe(
    handler: HandlerKind,
    component: &'static str,
    actions: &'static [&'static str],
    stages: &'static [&'static str],
) -> Subscription {
    Subscription {
        handler,
        filter: AttributeFilter {
            component,
            actions,
            stages,
        },
    }
}

/// The routing table, in dispatch order
pub const SUBSCRIPTIONS: [Subscription; 10] = [
    subscribe(
        HandlerKind::CreateFolders,
        component::PIPEDRIVE,
        &["added.deal"],
        &["lead_in"],
    ),
    subscribe(
        HandlerKind::CopyFiles,
        component::GDRIVE,
        &["create_folders"],
        &["lead_in"],
    ),
    subscribe(
        HandlerKind::CopyFiles,
        component::PIPEDRIVE,
        &["updated.deal"],
        &[
            "lead_validation",
            "solution_development",
            "proposal_development",
            "deal_closure",
        ],
    ),
    subscribe(
        HandlerKind::DealUpdate,
        component::GDRIVE,
        &["create_folders", "copy_files"],
        &[],
    ),
    subscribe(
        HandlerKind::CreateChannel,
        component::PIPEDRIVE,
        &["added.deal"],
        &["lead_in"],
    ),
    subscribe(
        HandlerKind::SendMessageToSa,
        component::GDRIVE,
        &["copy_files"],
        &["lead_validation", "proposal_development"],
    ),
    subscribe(
        HandlerKind::SendMessageApn,
        component::PIPEDRIVE,
        &["updated.deal"],
        &["negotiation"],
    ),
    subscribe(
        HandlerKind::SendMessageEngagementReview,
        component::PIPEDRIVE,
        &["updated.deal"],
        &["negotiation"],
    ),
    subscribe(
        HandlerKind::DealWon,
        component::GDRIVE,
        &["copy_files"],
        &["deal_closure"],
    ),
    subscribe(
        HandlerKind::RefreshTemplates,
        component::GDRIVE,
        &["update_templates"],
        &["doc_templates"],
    ),
];

/// Handlers subscribed to a notification with these attributes, without duplicates
pub fn subscribers(attributes: &Attributes) -> Vec<HandlerKind> {
    let mut handlers = Vec::new();
    for subscription in SUBSCRIPTIONS.iter() {
        if subscription.filter.matches(attributes) && !handlers.contains(&subscription.handler) {
            handlers.push(subscription.handler);
        }
    }
    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(component: &str, action: &str, stage: &str) -> Attributes {
        Attributes::new(component, action, stage)
    }

    #[test]
    fn test_new_deal_fans_out_to_folders_and_channels() {
        assert_eq!(
            subscribers(&attrs("pipedrive", "added.deal", "lead_in")),
            vec![HandlerKind::CreateFolders, HandlerKind::CreateChannel]
        );
    }

    #[test]
    fn test_negotiation_update_sends_both_messages() {
        assert_eq!(
            subscribers(&attrs("pipedrive", "updated.deal", "negotiation")),
            vec![
                HandlerKind::SendMessageApn,
                HandlerKind::SendMessageEngagementReview
            ]
        );
    }

    #[test]
    fn test_copied_documents_route_by_stage() {
        assert_eq!(
            subscribers(&attrs("gdrive", "copy_files", "lead_validation")),
            vec![HandlerKind::DealUpdate, HandlerKind::SendMessageToSa]
        );
        assert_eq!(
            subscribers(&attrs("gdrive", "copy_files", "deal_closure")),
            vec![HandlerKind::DealUpdate, HandlerKind::DealWon]
        );
        assert_eq!(
            subscribers(&attrs("gdrive", "copy_files", "solution_development")),
            vec![HandlerKind::DealUpdate]
        );
    }

    #[test]
    fn test_result_notifications_without_subscribers() {
        assert!(subscribers(&attrs("pipedrive", "update_deal_fields", "lead_in")).is_empty());
        assert!(subscribers(&attrs("slack", "create_channel", "lead_in")).is_empty());
        assert!(subscribers(&attrs("pipedrive", "updated.deal", "lead_in")).is_empty());
    }

    #[test]
    fn test_handler_names_parse() {
        for kind in HandlerKind::ALL {
            assert_eq!(kind.as_str().parse::<HandlerKind>().unwrap(), kind);
        }
        assert!("drop_tables".parse::<HandlerKind>().is_err());
    }
}
