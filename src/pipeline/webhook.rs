//! Webhook boundary: raw body in, activation response out

use crate::error::FlowResult;
use crate::pipeline::deal::DealEvent;
use crate::pipeline::engine::{TransitionEngine, TransitionOutcome};
use crate::response::ActivationResponse;
use serde_json::json;
use tracing::{error, info, warn};

/// Runs the engine on one webhook body
///
/// Returns 200 when notifications were published, 202 for accepted no-ops and for
/// terminal errors (with an error body). Retryable errors are returned as `Err`
/// so the caller redelivers the event.
pub async fn handle_webhook(engine: &TransitionEngine, body: &str) -> FlowResult<ActivationResponse> {
    let event = match DealEvent::parse(body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            let kind = DealEvent::peek_event_type(body).unwrap_or_default();
            info!("Accepted {} event without action", kind);
            return Ok(ActivationResponse::accepted(format!(
                "No actions for {} events",
                kind
            )));
        }
        Err(e) => {
            error!("Rejected webhook body: {}", e);
            return Ok(ActivationResponse::error(202, &e));
        }
    };

    match engine.process(&event).await {
        Ok(TransitionOutcome::Processed { stage, published }) => {
            let ids: Vec<&str> = published.iter().map(|r| r.message_id.as_str()).collect();
            Ok(ActivationResponse::ok(json!({
                "stage": stage,
                "published": ids,
            })))
        }
        Ok(TransitionOutcome::NoAction(reason)) => Ok(ActivationResponse::accepted(reason)),
        Err(e) if e.is_retryable() => {
            warn!("Retryable failure for deal {}: {}", event.current.id, e);
            Err(e)
        }
        Err(e) => {
            error!("Terminal failure for deal {}: {}", event.current.id, e);
            Ok(ActivationResponse::error(202, &e))
        }
    }
}
