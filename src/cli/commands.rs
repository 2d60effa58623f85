use crate::notify::HandlerKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Event-driven sales pipeline orchestration
#[derive(Parser, Debug)]
#[command(
    name = "dealflow",
    about = "Event-driven sales pipeline orchestration across CRM, document storage and messaging",
    version,
    long_about = "dealflow turns CRM deal webhooks into stage notifications and runs the \
                  handlers that create folders, copy documents, open channels and send \
                  messages as a deal moves through the pipeline."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Process one CRM webhook delivery",
        long_about = "Runs the stage transition engine on a webhook body and publishes the \
                      resulting notifications to the configured topic endpoints.\n\n\
                      Examples:\n  \
                      dealflow webhook event.json\n  \
                      cat event.json | dealflow webhook -"
    )]
    Webhook(WebhookArgs),

    #[command(
        about = "Run one stage handler on a notification",
        long_about = "Activates a single handler with a notification, given either as \
                      {\"payload\": ..., \"attributes\": ...} or as a topic envelope \
                      {\"message\": \"...\", \"attributes\": {...}}.\n\n\
                      Examples:\n  \
                      dealflow handle copy-files notification.json"
    )]
    Handle(HandleArgs),

    #[command(
        about = "Play a webhook through the whole pipeline against fakes",
        long_about = "Runs the engine and every subscribed handler in-process, with \
                      in-memory CRM, document store, messaging and storage.\n\n\
                      Examples:\n  \
                      dealflow simulate event.json\n  \
                      dealflow simulate --format json event.json"
    )]
    Simulate(SimulateArgs),

    #[command(about = "List handler subscriptions")]
    Routes(FormatArgs),

    #[command(about = "Show the effective configuration")]
    Config(FormatArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct WebhookArgs {
    #[arg(value_name = "FILE", help = "Webhook body, or '-' for stdin")]
    pub input: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HandleArgs {
    #[arg(value_name = "HANDLER", value_parser = parse_handler_kind, help = "Handler to run")]
    pub handler: HandlerKind,

    #[arg(value_name = "FILE", help = "Notification, or '-' for stdin")]
    pub input: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(value_name = "FILE", help = "Webhook body, or '-' for stdin")]
    pub input: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct FormatArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

/// Accepts handler names with either dashes or underscores
fn parse_handler_kind(s: &str) -> Result<HandlerKind, String> {
    s.replace('-', "_").parse::<HandlerKind>().map_err(|_| {
        let valid: Vec<&str> = HandlerKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("Invalid handler: {}. Valid options: {}", s, valid.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_webhook_from_stdin() {
        let args = CliArgs::parse_from(["dealflow", "webhook", "-"]);
        match args.command {
            Commands::Webhook(webhook_args) => {
                assert_eq!(webhook_args.input, PathBuf::from("-"));
                assert_eq!(webhook_args.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Webhook command"),
        }
    }

    #[test]
    fn test_handle_accepts_dashed_names() {
        let args = CliArgs::parse_from(["dealflow", "handle", "copy-files", "n.json"]);
        match args.command {
            Commands::Handle(handle_args) => {
                assert_eq!(handle_args.handler, HandlerKind::CopyFiles);
            }
            _ => panic!("Expected Handle command"),
        }
    }

    #[test]
    fn test_handle_rejects_unknown_handler() {
        let result = CliArgs::try_parse_from(["dealflow", "handle", "archive", "n.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_simulate_with_json_output() {
        let args = CliArgs::parse_from(["dealflow", "simulate", "--format", "json", "e.json"]);
        match args.command {
            Commands::Simulate(simulate_args) => {
                assert_eq!(simulate_args.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["dealflow", "-v", "--json-logs", "routes"]);
        assert!(args.verbose);
        assert!(args.json_logs);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["dealflow", "--log-level", "warn", "config"]);
        assert_eq!(args.log_level, Some("warn".to_string()));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["dealflow", "-q", "-v", "routes"]).is_err());
    }
}
