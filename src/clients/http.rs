//! Shared reqwest plumbing for the outbound HTTP clients

use crate::error::{FlowError, FlowResult};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::error;

/// Default request timeout for external API calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub fn build_client(service: &str, timeout: Duration) -> FlowResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FlowError::ExternalApi {
            service: service.to_string(),
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// Converts a transport failure into a retryable error
pub fn request_error(service: &str, timeout: Duration, e: reqwest::Error) -> FlowError {
    let message = if e.is_timeout() {
        error!("{} request timed out after {:?}", service, timeout);
        format!("timed out after {}s", timeout.as_secs())
    } else if e.is_connect() {
        error!("Cannot connect to {}: {}", service, e);
        format!("Connection failed: {}", e)
    } else {
        error!("{} request error: {}", service, e);
        format!("Request failed: {}", e)
    };

    FlowError::ExternalApi {
        service: service.to_string(),
        message,
    }
}

/// Passes successful responses through, turning any other status into `HttpStatus`
pub async fn check_status(service: &str, response: Response) -> FlowResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("{} returned error status {}: {}", service, status, body);

    Err(FlowError::HttpStatus {
        service: service.to_string(),
        status: status.as_u16(),
        message: body,
    })
}

pub async fn read_json<T: DeserializeOwned>(service: &str, response: Response) -> FlowResult<T> {
    response.json().await.map_err(|e| {
        error!("Failed to parse {} response: {}", service, e);
        FlowError::ExternalApi {
            service: service.to_string(),
            message: format!("JSON parse error: {}", e),
        }
    })
}
