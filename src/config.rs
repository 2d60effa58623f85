//! Configuration management for dealflow
//!
//! Settings load from environment variables with defaults. Secrets are never read
//! here; the config only names them, and a [`SecretStore`](crate::credentials::SecretStore)
//! resolves them when a component needs one.
//!
//! # Environment Variables
//!
//! ## Topics
//! - `DEALFLOW_PIPEDRIVE_TOPIC`: CRM event topic - default: "pipedrive"
//! - `DEALFLOW_GDRIVE_TOPIC`: document-store result topic - default: "gdrive"
//! - `DEALFLOW_SLACK_TOPIC`: messaging result topic - default: "slack"
//!
//! With the HTTP publisher each topic is the URL notifications are POSTed to.
//!
//! ## Secret names
//! - `DEALFLOW_PIPEDRIVE_TOKEN_SECRET` - default: "/dealflow/pipedrive/api-token"
//! - `DEALFLOW_SLACK_TOKEN_SECRET` - default: "/dealflow/slack/api-token"
//! - `DEALFLOW_SLACK_BOT_TOKEN_SECRET` - default: "/dealflow/slack/bot-token"
//! - `DEALFLOW_GDRIVE_TOKEN_SECRET` - default: "/dealflow/gdrive/access-token"
//! - `DEALFLOW_RESOURCE_REQUEST_SECRET` - default: "/dealflow/gdrive/resource-request-link"
//!
//! ## Pipeline
//! - `DEALFLOW_SHORT_NAME_FIELD`: CRM key of the short-name custom field
//! - `DEALFLOW_GDRIVE_PARENT_FOLDER_ID`: folder holding every customer folder
//! - `DEALFLOW_GDRIVE_TEMPLATE_FOLDER_ID`: folder holding the document templates
//! - `DEALFLOW_SA_EMAIL_WEST`, `DEALFLOW_SA_EMAIL_EAST`: solution architects by territory
//! - `DEALFLOW_APN_EMAIL`: partner-network contact
//! - `DEALFLOW_ENGAGEMENT_CHANNEL` - default: "sales-engagement-review"
//! - `DEALFLOW_STORE_PATH`: JSON store file - default: system temp dir + "dealflow-store.json"
//!
//! ## Runtime
//! - `DEALFLOW_PIPEDRIVE_API_BASE`, `DEALFLOW_PIPEDRIVE_COMPANY_BASE`,
//!   `DEALFLOW_GDRIVE_API_BASE`, `DEALFLOW_SLACK_API_BASE`: endpoint overrides
//! - `DEALFLOW_REQUEST_TIMEOUT`: timeout in seconds - default: "30"
//! - `DEALFLOW_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use dealflow::FlowConfig;
//!
//! let config = FlowConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use crate::clients::{crm, drive, messaging};
use crate::notify::component;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHORT_NAME_FIELD: &str = "b3ac74b4fdba3bb5fe7277f0a75d17da65ee759b";
const DEFAULT_ENGAGEMENT_CHANNEL: &str = "sales-engagement-review";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// A setting required by the selected command is unset
    #[error("Missing setting {variable}: {reason}")]
    MissingSetting { variable: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub pipedrive_topic: String,
    pub gdrive_topic: String,
    pub slack_topic: String,

    pub pipedrive_token_secret: String,
    pub slack_token_secret: String,
    pub slack_bot_token_secret: String,
    pub gdrive_token_secret: String,
    pub resource_request_secret: String,

    /// CRM key of the custom field carrying the project short name
    pub short_name_field: String,
    pub gdrive_parent_folder_id: String,
    pub gdrive_template_folder_id: String,
    pub sa_email_west: String,
    pub sa_email_east: String,
    pub apn_email: String,
    pub engagement_channel: String,
    pub store_path: PathBuf,

    pub pipedrive_api_base: String,
    pub pipedrive_company_base: Option<String>,
    pub gdrive_api_base: String,
    pub slack_api_base: String,

    pub request_timeout_secs: u64,
    pub log_level: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Default for FlowConfig {
    /// Loads `DEALFLOW_*` environment variables, falling back to defaults
    fn default() -> Self {
        let request_timeout_secs = env::var("DEALFLOW_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let store_path = env::var("DEALFLOW_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("dealflow-store.json"));

        Self {
            pipedrive_topic: var_or("DEALFLOW_PIPEDRIVE_TOPIC", component::PIPEDRIVE),
            gdrive_topic: var_or("DEALFLOW_GDRIVE_TOPIC", component::GDRIVE),
            slack_topic: var_or("DEALFLOW_SLACK_TOPIC", component::SLACK),

            pipedrive_token_secret: var_or(
                "DEALFLOW_PIPEDRIVE_TOKEN_SECRET",
                "/dealflow/pipedrive/api-token",
            ),
            slack_token_secret: var_or("DEALFLOW_SLACK_TOKEN_SECRET", "/dealflow/slack/api-token"),
            slack_bot_token_secret: var_or(
                "DEALFLOW_SLACK_BOT_TOKEN_SECRET",
                "/dealflow/slack/bot-token",
            ),
            gdrive_token_secret: var_or(
                "DEALFLOW_GDRIVE_TOKEN_SECRET",
                "/dealflow/gdrive/access-token",
            ),
            resource_request_secret: var_or(
                "DEALFLOW_RESOURCE_REQUEST_SECRET",
                "/dealflow/gdrive/resource-request-link",
            ),

            short_name_field: var_or("DEALFLOW_SHORT_NAME_FIELD", DEFAULT_SHORT_NAME_FIELD),
            gdrive_parent_folder_id: var_or("DEALFLOW_GDRIVE_PARENT_FOLDER_ID", ""),
            gdrive_template_folder_id: var_or("DEALFLOW_GDRIVE_TEMPLATE_FOLDER_ID", ""),
            sa_email_west: var_or("DEALFLOW_SA_EMAIL_WEST", ""),
            sa_email_east: var_or("DEALFLOW_SA_EMAIL_EAST", ""),
            apn_email: var_or("DEALFLOW_APN_EMAIL", ""),
            engagement_channel: var_or("DEALFLOW_ENGAGEMENT_CHANNEL", DEFAULT_ENGAGEMENT_CHANNEL),
            store_path,

            pipedrive_api_base: var_or("DEALFLOW_PIPEDRIVE_API_BASE", crm::DEFAULT_API_BASE),
            pipedrive_company_base: env::var("DEALFLOW_PIPEDRIVE_COMPANY_BASE").ok(),
            gdrive_api_base: var_or("DEALFLOW_GDRIVE_API_BASE", drive::DEFAULT_API_BASE),
            slack_api_base: var_or("DEALFLOW_SLACK_API_BASE", messaging::DEFAULT_API_BASE),

            request_timeout_secs,
            log_level: var_or("DEALFLOW_LOG_LEVEL", DEFAULT_LOG_LEVEL).to_lowercase(),
        }
    }
}

impl FlowConfig {
    /// Validates the configuration
    ///
    /// Handler-specific settings (folder ids, contact emails) are checked by
    /// [`FlowConfig::require`] when a command needs them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        for (name, topic) in [
            ("pipedrive", &self.pipedrive_topic),
            ("gdrive", &self.gdrive_topic),
            ("slack", &self.slack_topic),
        ] {
            if topic.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "The {} topic cannot be empty",
                    name
                )));
            }
        }

        if self.short_name_field.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Short name field key cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Fails when a setting a command depends on is empty
    pub fn require(&self, variable: &str, value: &str, reason: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingSetting {
                variable: variable.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    /// Topics must be URLs when notifications go over HTTP
    pub fn require_http_topics(&self) -> Result<(), ConfigError> {
        for (variable, topic) in [
            ("DEALFLOW_PIPEDRIVE_TOPIC", &self.pipedrive_topic),
            ("DEALFLOW_GDRIVE_TOPIC", &self.gdrive_topic),
            ("DEALFLOW_SLACK_TOPIC", &self.slack_topic),
        ] {
            if !(topic.starts_with("http://") || topic.starts_with("https://")) {
                return Err(ConfigError::MissingSetting {
                    variable: variable.to_string(),
                    reason: format!("'{}' is not an http(s) URL", topic),
                });
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("pipedrive_topic".to_string(), self.pipedrive_topic.clone());
        map.insert("gdrive_topic".to_string(), self.gdrive_topic.clone());
        map.insert("slack_topic".to_string(), self.slack_topic.clone());
        map.insert("short_name_field".to_string(), self.short_name_field.clone());
        map.insert(
            "store_path".to_string(),
            self.store_path.display().to_string(),
        );
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());
        map
    }
}

impl fmt::Display for FlowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dealflow Configuration:")?;
        writeln!(f, "  Pipedrive Topic: {}", self.pipedrive_topic)?;
        writeln!(f, "  GDrive Topic: {}", self.gdrive_topic)?;
        writeln!(f, "  Slack Topic: {}", self.slack_topic)?;
        writeln!(f, "  Short Name Field: {}", self.short_name_field)?;
        writeln!(f, "  Parent Folder: {}", self.gdrive_parent_folder_id)?;
        writeln!(f, "  Template Folder: {}", self.gdrive_template_folder_id)?;
        writeln!(f, "  Engagement Channel: #{}", self.engagement_channel)?;
        writeln!(f, "  Store: {}", self.store_path.display())?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::unset("DEALFLOW_PIPEDRIVE_TOPIC"),
            EnvGuard::unset("DEALFLOW_SHORT_NAME_FIELD"),
            EnvGuard::unset("DEALFLOW_REQUEST_TIMEOUT"),
            EnvGuard::set("DEALFLOW_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        ];

        let config = FlowConfig::default();

        assert_eq!(config.pipedrive_topic, "pipedrive");
        assert_eq!(config.short_name_field, DEFAULT_SHORT_NAME_FIELD);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("DEALFLOW_GDRIVE_TOPIC", "https://bus.example.com/gdrive"),
            EnvGuard::set("DEALFLOW_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("DEALFLOW_REQUEST_TIMEOUT", "60"),
            EnvGuard::set("DEALFLOW_STORE_PATH", "/var/lib/dealflow/store.json"),
            EnvGuard::set("DEALFLOW_APN_EMAIL", "apn@example.com"),
        ];

        let config = FlowConfig::default();

        assert_eq!(config.gdrive_topic, "https://bus.example.com/gdrive");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(
            config.store_path,
            PathBuf::from("/var/lib/dealflow/store.json")
        );
        assert_eq!(config.apn_email, "apn@example.com");
    }

    #[test]
    #[serial]
    fn test_configuration_validation_invalid_timeout() {
        let mut config = FlowConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_configuration_validation_invalid_log_level() {
        let mut config = FlowConfig::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_http_topics_required_for_http_publisher() {
        let mut config = FlowConfig::default();
        config.pipedrive_topic = "pipedrive".to_string();
        assert!(matches!(
            config.require_http_topics(),
            Err(ConfigError::MissingSetting { .. })
        ));

        config.pipedrive_topic = "https://bus.example.com/pipedrive".to_string();
        config.gdrive_topic = "https://bus.example.com/gdrive".to_string();
        config.slack_topic = "http://localhost:9000/slack".to_string();
        assert!(config.require_http_topics().is_ok());
    }

    #[test]
    #[serial]
    fn test_require_empty_setting() {
        let config = FlowConfig::default();
        assert!(config.require("DEALFLOW_APN_EMAIL", "", "needed").is_err());
        assert!(config.require("DEALFLOW_APN_EMAIL", "a@b.c", "needed").is_ok());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let config = FlowConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("Dealflow Configuration:"));
        assert!(display.contains("Pipedrive Topic:"));
        assert_eq!(config.to_display_map()["log_level"], config.log_level);
    }
}
