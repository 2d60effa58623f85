//! CRM client: company domain, deal-field schema and deal field updates

use crate::clients::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::credentials::SecretStore;
use crate::error::{FlowError, FlowResult};
use crate::pipeline::fields::FieldDefinition;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "pipedrive";

pub const DEFAULT_API_BASE: &str = "https://api.pipedrive.com";

/// API token plus the company domain its requests are scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmCredentials {
    pub token: String,
    pub domain: String,
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Company domain of the token's owner
    async fn company_domain(&self, token: &str) -> FlowResult<String>;

    async fn deal_fields(&self, credentials: &CrmCredentials) -> FlowResult<Vec<FieldDefinition>>;

    async fn update_deal_field(
        &self,
        credentials: &CrmCredentials,
        deal_id: i64,
        field_key: &str,
        value: &Value,
    ) -> FlowResult<()>;
}

/// Fetches the token from the secret store and resolves its company domain
pub async fn resolve_credentials(
    secrets: &dyn SecretStore,
    crm: &dyn CrmClient,
    token_secret: &str,
) -> FlowResult<CrmCredentials> {
    let token = secrets.secret(token_secret).await?;
    let domain = crm.company_domain(&token).await?;
    debug!("Resolved CRM company domain {}", domain);
    Ok(CrmCredentials { token, domain })
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_info: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> FlowResult<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(FlowError::ApiRejected {
                service: SERVICE.to_string(),
                error: self.error.unwrap_or_else(|| "no data".to_string()),
                detail: self.error_info,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserData {
    company_domain: String,
}

/// Pipedrive REST client
pub struct PipedriveClient {
    api_base: String,
    /// Replaces `https://<domain>.pipedrive.com` for company-scoped calls
    company_base: Option<String>,
    http_client: Client,
    timeout: Duration,
}

impl PipedriveClient {
    pub fn new() -> FlowResult<Self> {
        Self::with_endpoints(
            DEFAULT_API_BASE.to_string(),
            None,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_endpoints(
        api_base: String,
        company_base: Option<String>,
        timeout: Duration,
    ) -> FlowResult<Self> {
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            company_base: company_base.map(|base| base.trim_end_matches('/').to_string()),
            http_client: http::build_client(SERVICE, timeout)?,
            timeout,
        })
    }

    fn company_url(&self, domain: &str) -> String {
        match &self.company_base {
            Some(base) => base.clone(),
            None => format!("https://{}.pipedrive.com", domain),
        }
    }

    async fn read_envelope<T: DeserializeOwned>(&self, response: reqwest::Response) -> FlowResult<T> {
        let response = http::check_status(SERVICE, response).await?;
        let envelope: Envelope<T> = http::read_json(SERVICE, response).await?;
        envelope.into_data()
    }
}

#[async_trait]
impl CrmClient for PipedriveClient {
    async fn company_domain(&self, token: &str) -> FlowResult<String> {
        let url = format!("{}/v1/users/me", self.api_base);
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_token", token)])
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, self.timeout, e))?;

        let user: UserData = self.read_envelope(response).await?;
        Ok(user.company_domain)
    }

    async fn deal_fields(&self, credentials: &CrmCredentials) -> FlowResult<Vec<FieldDefinition>> {
        let url = format!("{}/v1/dealFields", self.company_url(&credentials.domain));
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_token", credentials.token.as_str())])
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, self.timeout, e))?;

        let fields: Vec<FieldDefinition> = self.read_envelope(response).await?;
        debug!("Fetched {} deal fields", fields.len());
        Ok(fields)
    }

    async fn update_deal_field(
        &self,
        credentials: &CrmCredentials,
        deal_id: i64,
        field_key: &str,
        value: &Value,
    ) -> FlowResult<()> {
        let url = format!(
            "{}/v1/deals/{}",
            self.company_url(&credentials.domain),
            deal_id
        );
        let mut body = serde_json::Map::new();
        body.insert(field_key.to_string(), value.clone());

        let response = self
            .http_client
            .put(&url)
            .query(&[("api_token", credentials.token.as_str())])
            .json(&json!(body))
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, self.timeout, e))?;

        let _: Value = self.read_envelope(response).await?;
        info!("Updated deal {} field {}", deal_id, field_key);
        Ok(())
    }
}
