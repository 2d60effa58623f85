//! Command implementations; each returns the process exit code

use crate::cli::commands::{FormatArgs, HandleArgs, SimulateArgs, WebhookArgs};
use crate::cli::output::{OutputFormat, OutputFormatter};
use crate::config::FlowConfig;
use crate::credentials::EnvSecretStore;
use crate::error::FlowResult;
use crate::handlers::{build_handler, run_handler};
use crate::notify::publisher::WireMessage;
use crate::notify::{HttpTopicPublisher, Notification};
use crate::pipeline::{handle_webhook, TransitionEngine};
use crate::response::ActivationResponse;
use crate::sandbox::Sandbox;
use crate::services::Services;
use crate::store::JsonFileStore;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

pub const EXIT_OK: i32 = 0;
/// A retryable failure; the caller should redeliver the same input
pub const EXIT_RETRY: i32 = 1;
/// Bad configuration or unreadable input
pub const EXIT_USAGE: i32 = 2;
/// A terminal failure reported in a non-2xx response
pub const EXIT_FAILED: i32 = 3;

/// Exit code for an activation outcome
pub fn exit_code(outcome: &FlowResult<ActivationResponse>) -> i32 {
    match outcome {
        Ok(response) if response.is_success() => EXIT_OK,
        Ok(_) => EXIT_FAILED,
        Err(_) => EXIT_RETRY,
    }
}

/// Reads a file, or stdin when the path is `-`
pub fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Parses a notification given directly or as a topic envelope
pub fn parse_notification(body: &str) -> Result<Notification> {
    if let Ok(notification) = serde_json::from_str::<Notification>(body) {
        return Ok(notification);
    }
    let wire: WireMessage =
        serde_json::from_str(body).context("Input is neither a notification nor an envelope")?;
    Ok(wire.into_notification()?)
}

fn print(format: OutputFormat, render: impl FnOnce(&OutputFormatter) -> Result<String>) -> bool {
    match render(&OutputFormatter::new(format)) {
        Ok(output) => {
            println!("{}", output.trim_end());
            true
        }
        Err(e) => {
            eprintln!("Error: Failed to format output: {:#}", e);
            false
        }
    }
}

fn load_config(http_topics: bool) -> Option<FlowConfig> {
    let config = FlowConfig::default();
    let checked = config.validate().and_then(|_| {
        if http_topics {
            config.require_http_topics()
        } else {
            Ok(())
        }
    });
    match checked {
        Ok(()) => {
            debug!("{}", config);
            Some(config)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

async fn live_services(config: FlowConfig) -> Result<Services> {
    let publisher = HttpTopicPublisher::with_timeout(config.request_timeout())?;
    let store = Arc::new(JsonFileStore::new(config.store_path.clone()));
    let services = Services::connect(
        config,
        Arc::new(EnvSecretStore::new()),
        Arc::new(publisher),
        store,
    )
    .await?;
    Ok(services)
}

pub async fn handle_webhook_command(args: &WebhookArgs) -> i32 {
    let Some(config) = load_config(true) else {
        return EXIT_USAGE;
    };
    let body = match read_input(&args.input) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_USAGE;
        }
    };
    let services = match live_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to connect services: {:#}", e);
            return EXIT_RETRY;
        }
    };

    let engine = TransitionEngine::from_services(&services);
    let outcome = handle_webhook(&engine, &body).await;
    if !print(args.format.into(), |f| f.format_response(&outcome)) {
        return EXIT_FAILED;
    }
    exit_code(&outcome)
}

pub async fn handle_handler_command(args: &HandleArgs) -> i32 {
    let Some(config) = load_config(true) else {
        return EXIT_USAGE;
    };
    let notification = match read_input(&args.input).and_then(|body| parse_notification(&body)) {
        Ok(notification) => notification,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_USAGE;
        }
    };
    let services = match live_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to connect services: {:#}", e);
            return EXIT_RETRY;
        }
    };

    let handler = build_handler(args.handler, &services);
    let outcome = run_handler(handler.as_ref(), &notification).await;
    if !print(args.format.into(), |f| f.format_response(&outcome)) {
        return EXIT_FAILED;
    }
    exit_code(&outcome)
}

pub async fn handle_simulate_command(args: &SimulateArgs) -> i32 {
    let Some(config) = load_config(false) else {
        return EXIT_USAGE;
    };
    let body = match read_input(&args.input) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_USAGE;
        }
    };

    let sandbox = Sandbox::new(config);
    if let Err(e) = sandbox.refresh_templates().await {
        error!("Failed to load sandbox templates: {}", e);
        return EXIT_FAILED;
    }
    let templates_published = sandbox.published().len();

    let report = sandbox.deliver_webhook(&body).await;
    let published: Vec<Notification> = sandbox
        .published()
        .into_iter()
        .skip(templates_published)
        .collect();

    if !print(args.format.into(), |f| {
        f.format_simulation(&report.response, &report.deliveries, &published)
    }) {
        return EXIT_FAILED;
    }

    match exit_code(&report.response) {
        EXIT_OK if report.failed().is_empty() => EXIT_OK,
        EXIT_OK => EXIT_FAILED,
        code => code,
    }
}

pub fn handle_routes_command(args: &FormatArgs) -> i32 {
    if print(args.format.into(), |f| f.format_routes()) {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}

pub fn handle_config_command(args: &FormatArgs) -> i32 {
    let config = FlowConfig::default();
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return EXIT_USAGE;
    }
    if print(args.format.into(), |f| f.format_config(&config)) {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}
