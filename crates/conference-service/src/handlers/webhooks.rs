//! Provider webhook handlers.
//!
//! Every delivery is acknowledged with `200 OK` and an empty body, whatever
//! the payload or the outcome; the provider redelivers on anything else.
//! That includes bodies the server refuses to buffer (over the body limit),
//! which are dropped like malformed ones. Processing runs on a spawned task
//! after the acknowledgement.

use crate::errors::IngressError;
use crate::ingress::{parse_message_event, parse_voice_event, InboundEvent};
use crate::observability::metrics::record_webhook_event;
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// POST /message
pub async fn message_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    accept(&state, "message", read_body(body).and_then(|b| parse_message_event(&b)));
    StatusCode::OK
}

/// POST /voice
pub async fn voice_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    accept(&state, "voice", read_body(body).and_then(|b| parse_voice_event(&b)));
    StatusCode::OK
}

fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, IngressError> {
    body.map_err(|e| IngressError::InvalidPayload(format!("unreadable body: {e}")))
}

fn accept(state: &Arc<AppState>, kind: &'static str, parsed: Result<InboundEvent, IngressError>) {
    record_webhook_event(kind, parsed.is_ok());

    match parsed {
        Ok(event) => {
            debug!(target: "cs.ingress", kind, "Webhook event accepted");
            let coordinator = Arc::clone(&state.coordinator);
            tokio::spawn(async move {
                coordinator.handle_event(event).await;
            });
        }
        Err(e) => {
            warn!(target: "cs.ingress", kind, error = %e, "Dropping malformed webhook");
        }
    }
}
