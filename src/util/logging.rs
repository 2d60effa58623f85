//! Structured logging for dealflow
//!
//! Logs go to stderr so command output on stdout stays machine-readable. Console
//! output is the default; JSON lines suit log collectors.
//!
//! # Example
//!
//! ```no_run
//! use dealflow::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!(deal_id = 42, "Processing deal");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Third-party targets kept at warn unless `RUST_LOG` says otherwise
const NOISY_TARGETS: [&str; 3] = ["h2", "hyper", "reqwest"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for the `dealflow` target
    pub level: Level,

    /// Emit one JSON object per event
    pub use_json: bool,

    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with source locations, for deployed activations
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
        }
    }

    /// The `dealflow=<level>` directive, plus quiet defaults for HTTP internals
    /// when `rust_log_set` is false
    pub fn directives(&self, rust_log_set: bool) -> Vec<String> {
        let mut directives = vec![format!("dealflow={}", self.level)];
        if !rust_log_set {
            directives.extend(NOISY_TARGETS.iter().map(|target| format!("{}=warn", target)));
        }
        directives
    }
}

/// Parses a level name, case-insensitively; unknown names fall back to INFO
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        for directive in config.directives(env::var("RUST_LOG").is_ok()) {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => eprintln!("Ignoring log directive '{}': {}", directive, e),
            }
        }

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes from `DEALFLOW_LOG_LEVEL`, `DEALFLOW_LOG_JSON` and `RUST_LOG`
pub fn init_from_env() {
    let level_str = env::var("DEALFLOW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_logging(LoggingConfig {
        level: parse_level(&level_str),
        use_json: json_from_env(),
        ..Default::default()
    });
}

/// Whether `DEALFLOW_LOG_JSON` asks for JSON output
pub fn json_from_env() -> bool {
    env::var("DEALFLOW_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false)
}
