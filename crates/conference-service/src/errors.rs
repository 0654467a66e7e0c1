//! Conference service error types.
//!
//! None of these ever reach the provider that delivered a webhook: the
//! ingress layer acknowledges every delivery with 200 and the coordinator logs
//! the failure instead. The variants exist so tests and the command-line
//! variant can tell outcomes apart.

use common::error::PhoneNumberError;
use thiserror::Error;

/// Failure of a single call to the telephony provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never reached the provider (DNS, refused, TLS).
    #[error("Connection failed: {0}")]
    Connect(String),

    /// No response within the configured deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Transport failure after the request may have been sent.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status.
    #[error("Provider returned {status} for {operation}")]
    Status { operation: &'static str, status: u16 },

    /// Response body could not be decoded.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Creation response carried no `Location` header.
    #[error("Missing Location header in {0} response")]
    MissingLocator(&'static str),

    /// Locator had no trailing path segment to use as an identifier.
    #[error("Invalid resource locator: {0}")]
    InvalidLocator(String),
}

impl GatewayError {
    /// Whether a later attempt of the same read could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Connect(_) | GatewayError::Timeout(_) | GatewayError::Network(_) => true,
            GatewayError::Status { status, .. } => *status == 429 || *status >= 500,
            GatewayError::InvalidResponse(_)
            | GatewayError::MissingLocator(_)
            | GatewayError::InvalidLocator(_) => false,
        }
    }

    /// Whether the provider certainly did not act on the request, so a
    /// mutation (text, call, conference change) can be sent again without
    /// risking a duplicate.
    #[must_use]
    pub fn is_safe_to_replay(&self) -> bool {
        match self {
            GatewayError::Connect(_) => true,
            GatewayError::Status { status, .. } => *status == 429 || *status == 503,
            _ => false,
        }
    }

    /// Bounded label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Connect(_) => "connect",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Network(_) => "network",
            GatewayError::Status { .. } => "status",
            GatewayError::InvalidResponse(_) => "invalid_response",
            GatewayError::MissingLocator(_) | GatewayError::InvalidLocator(_) => "locator",
        }
    }
}

/// Outcome of a coordinator operation that did not complete.
///
/// `NotOrganizer`, `SessionInProgress` and `NoActiveSession` are state
/// errors: the event is ignored on purpose and nothing is sent.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Message did not come from the configured organizer.
    #[error("Sender is not the organizer: {0}")]
    NotOrganizer(String),

    /// A session is pending or active; start requests are ignored.
    #[error("A conference session is already in progress")]
    SessionInProgress,

    /// No active session to end or join.
    #[error("No active conference session")]
    NoActiveSession,

    /// Start request named too few or too many participants.
    #[error("Participant count {count} outside allowed range {min}..={max}")]
    ParticipantCount { count: usize, min: usize, max: usize },

    /// Start request contained something that is not a phone number.
    #[error("Invalid participant number: {0}")]
    InvalidNumber(#[from] PhoneNumberError),

    /// Provider reused the id of a conference that already ended.
    #[error("Conference id {0} was already used by an ended session")]
    ConferenceIdReused(String),

    /// The provider call that the operation depends on failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl CoordinatorError {
    /// State errors are silent no-ops at the webhook boundary.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            CoordinatorError::NotOrganizer(_)
                | CoordinatorError::SessionInProgress
                | CoordinatorError::NoActiveSession
        )
    }
}

/// Webhook body that could not be turned into an event.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}
