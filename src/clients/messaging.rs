//! Messaging client: channels, user lookup and message posting

use crate::clients::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::error::{FlowError, FlowResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "slack";

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn list_channels(&self) -> FlowResult<Vec<Channel>>;

    async fn create_channel(&self, name: &str) -> FlowResult<Channel>;

    /// User id for an email address
    async fn lookup_user_by_email(&self, email: &str) -> FlowResult<String>;

    /// Opens (or reuses) a direct-message conversation, returning its channel id
    async fn open_direct_message(&self, user_id: &str) -> FlowResult<String>;

    async fn post_message(&self, channel_id: &str, text: &str) -> FlowResult<()>;
}

/// Channel names may only hold lowercase alphanumerics and dashes
pub fn sanitize_channel_name(name: &str) -> String {
    name.replace(' ', "-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

pub async fn find_channel(
    client: &dyn MessagingClient,
    name: &str,
) -> FlowResult<Option<Channel>> {
    Ok(client
        .list_channels()
        .await?
        .into_iter()
        .find(|channel| channel.name == name))
}

/// Existing channel with this name, or a newly created one
pub async fn ensure_channel(client: &dyn MessagingClient, name: &str) -> FlowResult<Channel> {
    if let Some(existing) = find_channel(client, name).await? {
        debug!("Channel '{}' already exists as {}", name, existing.id);
        return Ok(existing);
    }
    info!("Creating channel '{}'", name);
    client.create_channel(name).await
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct ChannelEnvelope {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: UserId,
}

#[derive(Debug, Deserialize)]
struct UserId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConversationEnvelope {
    channel: ConversationId,
}

#[derive(Debug, Deserialize)]
struct ConversationId {
    id: String,
}

/// Slack Web API client for a single token
pub struct SlackClient {
    api_base: String,
    token: String,
    http_client: Client,
    timeout: Duration,
}

impl SlackClient {
    pub fn new(token: String) -> FlowResult<Self> {
        Self::with_endpoint(
            DEFAULT_API_BASE.to_string(),
            token,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_endpoint(api_base: String, token: String, timeout: Duration) -> FlowResult<Self> {
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            http_client: http::build_client(SERVICE, timeout)?,
            timeout,
        })
    }

    /// Calls a Web API method, rejecting `ok: false` answers
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> FlowResult<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, self.timeout, e))?;
        let response = http::check_status(SERVICE, response).await?;
        let body: Value = http::read_json(SERVICE, response).await?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            let detail = body
                .get("detail")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(FlowError::ApiRejected {
                service: format!("{} {}", SERVICE, method),
                error,
                detail,
            });
        }

        serde_json::from_value(body).map_err(|e| FlowError::ExternalApi {
            service: SERVICE.to_string(),
            message: format!("{} response: {}", method, e),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

#[async_trait]
impl MessagingClient for SlackClient {
    async fn list_channels(&self) -> FlowResult<Vec<Channel>> {
        let method = "conversations.list";
        let request = self
            .http_client
            .get(self.method_url(method))
            .query(&[("types", "public_channel"), ("exclude_archived", "true")]);
        let list: ChannelList = self.call(method, request).await?;
        Ok(list.channels)
    }

    async fn create_channel(&self, name: &str) -> FlowResult<Channel> {
        let method = "conversations.create";
        let request = self
            .http_client
            .post(self.method_url(method))
            .json(&json!({ "name": name }));
        let created: ChannelEnvelope = self.call(method, request).await?;
        info!("Created channel {} ({})", created.channel.name, created.channel.id);
        Ok(created.channel)
    }

    async fn lookup_user_by_email(&self, email: &str) -> FlowResult<String> {
        let method = "users.lookupByEmail";
        let request = self
            .http_client
            .get(self.method_url(method))
            .query(&[("email", email)]);
        let found: UserEnvelope = self.call(method, request).await?;
        Ok(found.user.id)
    }

    async fn open_direct_message(&self, user_id: &str) -> FlowResult<String> {
        let method = "conversations.open";
        let request = self
            .http_client
            .post(self.method_url(method))
            .json(&json!({ "users": user_id }));
        let opened: ConversationEnvelope = self.call(method, request).await?;
        Ok(opened.channel.id)
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> FlowResult<()> {
        let method = "chat.postMessage";
        let request = self
            .http_client
            .post(self.method_url(method))
            .json(&json!({ "channel": channel_id, "text": text }));
        let _: Value = self.call(method, request).await?;
        debug!("Posted message to {}", channel_id);
        Ok(())
    }
}
