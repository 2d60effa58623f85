//! Secret lookup for API tokens and shared links

use crate::error::{FlowError, FlowResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use tracing::debug;

/// Resolves secrets by hierarchical name, e.g. `/dealflow/pipedrive/api-token`
///
/// A missing or unreadable secret is a retryable [`FlowError::Credential`].
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret(&self, name: &str) -> FlowResult<String>;
}

/// Reads secrets from environment variables
///
/// `/dealflow/pipedrive/api-token` is looked up as `DEALFLOW_SECRET_PIPEDRIVE_API_TOKEN`:
/// a leading `dealflow` segment is dropped, the rest is upper-cased and every
/// non-alphanumeric run becomes `_`.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::with_prefix("DEALFLOW_SECRET_")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_name(&self, name: &str) -> String {
        let trimmed = name.trim_start_matches('/');
        let trimmed = trimmed
            .strip_prefix("dealflow/")
            .unwrap_or(trimmed);

        let mut var = self.prefix.clone();
        let mut last_was_sep = var.ends_with('_');
        for c in trimmed.chars() {
            if c.is_ascii_alphanumeric() {
                var.push(c.to_ascii_uppercase());
                last_was_sep = false;
            } else if !last_was_sep {
                var.push('_');
                last_was_sep = true;
            }
        }
        var.trim_end_matches('_').to_string()
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn secret(&self, name: &str) -> FlowResult<String> {
        let var = self.variable_name(name);
        debug!("Resolving secret {} from {}", name, var);

        match env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) => Err(FlowError::Credential {
                name: name.to_string(),
                message: format!("{} is empty", var),
            }),
            Err(_) => Err(FlowError::Credential {
                name: name.to_string(),
                message: format!("{} is not set", var),
            }),
        }
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn secret(&self, name: &str) -> FlowResult<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::Credential {
                name: name.to_string(),
                message: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_variable_names() {
        let store = EnvSecretStore::new();
        assert_eq!(
            store.variable_name("/dealflow/pipedrive/api-token"),
            "DEALFLOW_SECRET_PIPEDRIVE_API_TOKEN"
        );
        assert_eq!(
            store.variable_name("/Slack/Labs/slack_bot_token"),
            "DEALFLOW_SECRET_SLACK_LABS_SLACK_BOT_TOKEN"
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_env_lookup() {
        env::set_var("DEALFLOW_SECRET_GDRIVE_ACCESS_TOKEN", "ya29.token");
        env::remove_var("DEALFLOW_SECRET_SLACK_API_TOKEN");

        let store = EnvSecretStore::new();
        assert_eq!(
            store.secret("/dealflow/gdrive/access-token").await.unwrap(),
            "ya29.token"
        );

        let err = store.secret("/dealflow/slack/api-token").await.unwrap_err();
        assert!(err.is_retryable());

        env::remove_var("DEALFLOW_SECRET_GDRIVE_ACCESS_TOKEN");
    }

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticSecretStore::new().with_secret("a", "1");
        assert_eq!(store.secret("a").await.unwrap(), "1");
        assert!(matches!(
            store.secret("b").await,
            Err(FlowError::Credential { .. })
        ));
    }
}
