//! Webhook payload parsing.
//!
//! Provider callbacks are decoded exactly once, here, into [`InboundEvent`].
//! Unknown fields are ignored so provider additions never break delivery.

use crate::errors::IngressError;
use serde::Deserialize;

/// An event delivered by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// An SMS arrived at the system number.
    Message { from: String, text: String },
    /// A call arrived at the system number.
    Voice { call_id: String },
}

impl InboundEvent {
    /// Bounded label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Message { .. } => "message",
            InboundEvent::Voice { .. } => "voice",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    from: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct VoicePayload {
    #[serde(rename = "callId")]
    call_id: String,
}

/// Decode a `POST /message` body.
///
/// # Errors
///
/// Returns `IngressError::InvalidPayload` if the body is not JSON or lacks
/// `from` / `text`.
pub fn parse_message_event(body: &[u8]) -> Result<InboundEvent, IngressError> {
    let payload: MessagePayload = serde_json::from_slice(body)
        .map_err(|e| IngressError::InvalidPayload(format!("message: {e}")))?;

    if payload.from.trim().is_empty() {
        return Err(IngressError::InvalidPayload(
            "message: empty from".to_string(),
        ));
    }

    Ok(InboundEvent::Message {
        from: payload.from,
        text: payload.text,
    })
}

/// Decode a `POST /voice` body.
///
/// # Errors
///
/// Returns `IngressError::InvalidPayload` if the body is not JSON or lacks a
/// non-empty `callId`.
pub fn parse_voice_event(body: &[u8]) -> Result<InboundEvent, IngressError> {
    let payload: VoicePayload = serde_json::from_slice(body)
        .map_err(|e| IngressError::InvalidPayload(format!("voice: {e}")))?;

    let call_id = payload.call_id.trim();
    if call_id.is_empty() {
        return Err(IngressError::InvalidPayload(
            "voice: empty callId".to_string(),
        ));
    }

    Ok(InboundEvent::Voice {
        call_id: call_id.to_string(),
    })
}
