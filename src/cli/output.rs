//! Output formatting for command results
//!
//! Every command can print JSON (machine-readable) or human-readable text.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::config::FlowConfig;
use crate::error::FlowResult;
use crate::notify::{Delivery, Notification, SUBSCRIPTIONS};
use crate::response::ActivationResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

fn describe_filter(list: &[&str]) -> String {
    if list.is_empty() {
        "*".to_string()
    } else {
        list.join(",")
    }
}

fn outcome_json(outcome: &FlowResult<ActivationResponse>) -> Value {
    match outcome {
        Ok(response) => json!({
            "status_code": response.status_code,
            "body": response.body,
        }),
        Err(e) => json!({
            "retryable": true,
            "error": {"type": e.type_name(), "description": e.to_string()},
        }),
    }
}

fn outcome_line(outcome: &FlowResult<ActivationResponse>) -> String {
    match outcome {
        Ok(response) => match response.error_type() {
            Some(error_type) => format!("{} {}", response.status_code, error_type),
            None => response.status_code.to_string(),
        },
        Err(e) => format!("retryable error: {}", e),
    }
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of one activation
    pub fn format_response(&self, outcome: &FlowResult<ActivationResponse>) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&outcome_json(outcome))
                .context("Failed to serialize response to JSON"),
            OutputFormat::Human => {
                let mut out = format!("Status: {}\n", outcome_line(outcome));
                if let Ok(response) = outcome {
                    let body = serde_json::to_string_pretty(&response.body)
                        .context("Failed to serialize response body")?;
                    writeln!(out, "{}", body)?;
                }
                Ok(out)
            }
        }
    }

    /// Formats a simulation: webhook response, handler activations, published notifications
    pub fn format_simulation(
        &self,
        response: &FlowResult<ActivationResponse>,
        deliveries: &[Delivery],
        published: &[Notification],
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let deliveries: Vec<Value> = deliveries
                    .iter()
                    .map(|d| {
                        json!({
                            "handler": d.handler,
                            "attempts": d.attempts,
                            "outcome": outcome_json(&d.outcome),
                        })
                    })
                    .collect();
                let output = json!({
                    "webhook": outcome_json(response),
                    "deliveries": deliveries,
                    "published": published,
                });
                serde_json::to_string_pretty(&output)
                    .context("Failed to serialize simulation to JSON")
            }
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "Webhook: {}", outcome_line(response))?;
                writeln!(out)?;
                writeln!(out, "Handler activations ({}):", deliveries.len())?;
                for delivery in deliveries {
                    writeln!(
                        out,
                        "  {:<32} {:<48} {}",
                        delivery.handler.as_str(),
                        format!(
                            "{}/{}/{}",
                            delivery.notification.attributes.component,
                            delivery.notification.attributes.action,
                            delivery.notification.attributes.stage
                        ),
                        outcome_line(&delivery.outcome)
                    )?;
                }
                writeln!(out)?;
                writeln!(out, "Published notifications ({}):", published.len())?;
                for (index, notification) in published.iter().enumerate() {
                    writeln!(
                        out,
                        "  {:>2}. {}/{}/{}",
                        index + 1,
                        notification.attributes.component,
                        notification.attributes.action,
                        notification.attributes.stage
                    )?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_routes(&self) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&SUBSCRIPTIONS)
                .context("Failed to serialize routes to JSON"),
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "{:<32} {:<10} {:<28} STAGES", "HANDLER", "COMPONENT", "ACTIONS")?;
                for subscription in SUBSCRIPTIONS.iter() {
                    writeln!(
                        out,
                        "{:<32} {:<10} {:<28} {}",
                        subscription.handler.as_str(),
                        subscription.filter.component,
                        describe_filter(subscription.filter.actions),
                        describe_filter(subscription.filter.stages)
                    )?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_config(&self, config: &FlowConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let sorted: BTreeMap<String, String> = config.to_display_map().into_iter().collect();
                serde_json::to_string_pretty(&sorted).context("Failed to serialize config to JSON")
            }
            OutputFormat::Human => Ok(config.to_string()),
        }
    }
}
