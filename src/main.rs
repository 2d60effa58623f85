use dealflow::cli::commands::{CliArgs, Commands};
use dealflow::cli::handlers::{
    handle_config_command, handle_handler_command, handle_routes_command, handle_simulate_command,
    handle_webhook_command,
};
use dealflow::util::logging::{init_logging, json_from_env, parse_level, LoggingConfig};
use dealflow::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("dealflow v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Webhook(webhook_args) => handle_webhook_command(webhook_args).await,
        Commands::Handle(handle_args) => handle_handler_command(handle_args).await,
        Commands::Simulate(simulate_args) => handle_simulate_command(simulate_args).await,
        Commands::Routes(format_args) => handle_routes_command(format_args),
        Commands::Config(format_args) => handle_config_command(format_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("DEALFLOW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    init_logging(LoggingConfig {
        level,
        use_json: args.json_logs || json_from_env(),
        ..Default::default()
    });
}
