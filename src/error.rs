//! Error taxonomy shared by the transition engine and the stage handlers
//!
//! Every failure is tagged with an [`ErrorClass`]. Retryable errors propagate out of
//! an activation so the invoking scheduler redelivers the event; terminal errors are
//! caught at the boundary and turned into a non-retryable response.

use serde::Serialize;
use thiserror::Error;

/// Whether redelivering the same event can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Transient failure; the activation should be re-run
    Retryable,
    /// Permanent failure; redelivery would fail the same way
    Terminal,
}

/// Errors raised while processing a deal event or a stage notification
#[derive(Debug, Error)]
pub enum FlowError {
    /// A secret could not be resolved from the secret store
    #[error("Credential '{name}' unavailable: {message}")]
    Credential { name: String, message: String },

    /// The request to an external service failed before a response was received
    #[error("{service} request failed: {message}")]
    ExternalApi { service: String, message: String },

    /// An external service answered with a non-success HTTP status
    #[error("{service} returned HTTP {status}: {message}")]
    HttpStatus {
        service: String,
        status: u16,
        message: String,
    },

    /// An external service answered, but with a "not ok" body
    #[error("{service} rejected request: {error}")]
    ApiRejected {
        service: String,
        error: String,
        detail: Option<String>,
    },

    /// A notification could not be sent to its topic
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// The persistence layer failed to read or write a record
    #[error("Persistence error on {table}: {message}")]
    Persistence { table: String, message: String },

    /// The deal moved to an earlier stage than previously observed
    #[error("Current stage {current} is less than previous stage {previous}")]
    RegressiveTransition { previous: i64, current: i64 },

    /// The inbound event or notification is missing expected fields
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The numeric stage id does not map to a pipeline stage
    #[error("Unknown pipeline stage id: {0}")]
    UnknownStage(i64),

    /// The project folder layout has not been created yet
    #[error("Folders missing for {customer} - {project}")]
    FoldersMissing { customer: String, project: String },

    /// No document template is registered for a stage/tag pair
    #[error("No document template tagged '{tag}' for stage {stage}")]
    TemplateMissing { stage: String, tag: String },
}

impl FlowError {
    /// Classifies the error for the redelivery decision
    pub fn class(&self) -> ErrorClass {
        match self {
            FlowError::Credential { .. }
            | FlowError::ExternalApi { .. }
            | FlowError::Publish { .. }
            | FlowError::Persistence { .. } => ErrorClass::Retryable,
            FlowError::HttpStatus { status, .. } => {
                if *status == 404 {
                    ErrorClass::Terminal
                } else {
                    ErrorClass::Retryable
                }
            }
            FlowError::ApiRejected { .. }
            | FlowError::RegressiveTransition { .. }
            | FlowError::MalformedEvent(_)
            | FlowError::UnknownStage(_)
            | FlowError::FoldersMissing { .. }
            | FlowError::TemplateMissing { .. } => ErrorClass::Terminal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// True when an external service reported that the target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowError::HttpStatus { status: 404, .. })
    }

    /// Stable name reported in error response bodies
    pub fn type_name(&self) -> &'static str {
        match self {
            FlowError::Credential { .. } => "CredentialError",
            FlowError::ExternalApi { .. } => "ExternalApiFailed",
            FlowError::HttpStatus { .. } => "HttpStatusError",
            FlowError::ApiRejected { .. } => "ApiRejected",
            FlowError::Publish { .. } => "PublishError",
            FlowError::Persistence { .. } => "PersistenceError",
            FlowError::RegressiveTransition { .. } => "RegressiveStageUpdateError",
            FlowError::MalformedEvent(_) => "MalformedEvent",
            FlowError::UnknownStage(_) => "UnknownStage",
            FlowError::FoldersMissing { .. } => "FolderNotFoundError",
            FlowError::TemplateMissing { .. } => "TemplateMissing",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        FlowError::MalformedEvent(message.into())
    }

    pub(crate) fn persistence(table: &str, message: impl ToString) -> Self {
        FlowError::Persistence {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
