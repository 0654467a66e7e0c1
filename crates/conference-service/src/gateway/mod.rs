//! Telephony provider gateway.
//!
//! The [`TelephonyGateway`] trait is the only way the coordinator and the
//! command-line variant talk to the provider. It carries no policy: no
//! session state, no participant bounds, no fan-out.
//!
//! # Components
//!
//! - `http` - reqwest implementation against the provider REST API
//! - `mock` - recording in-memory implementation for tests and local runs

pub mod http;
pub mod mock;

pub use http::{GatewaySettings, HttpGateway, RetryPolicy};

use crate::errors::GatewayError;
use common::types::{CallDirection, PhoneNumber};
use serde::{Deserialize, Serialize};

/// Operation names used in logs, metrics labels and errors.
pub mod operation {
    pub const START_CONFERENCE: &str = "start_conference";
    pub const END_CONFERENCE: &str = "end_conference";
    pub const ADD_CALL_TO_CONFERENCE: &str = "add_call_to_conference";
    pub const SEND_TEXT: &str = "send_text";
    pub const LIST_CONFERENCE_MEMBERS: &str = "list_conference_members";
    pub const GET_CALL_INFO: &str = "get_call_info";
    pub const CREATE_CALL: &str = "create_call";
}

/// One member of a conference as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceMember {
    /// Provider id of the membership.
    pub member_id: String,
    /// Id of the call leg attached to the conference.
    pub call_ref: String,
}

/// One call leg as reported by the provider. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLeg {
    pub call_id: String,
    pub direction: CallDirection,
    pub from: String,
    pub to: String,
}

impl CallLeg {
    /// The human participant on this leg.
    ///
    /// The provider always reports the system's own number as the other
    /// endpoint, so an outbound leg's participant is `to` and an inbound
    /// leg's participant is `from`.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the participant endpoint is not a phone
    /// number (e.g. a SIP URI).
    pub fn participant(&self) -> Result<PhoneNumber, common::error::PhoneNumberError> {
        match self.direction {
            CallDirection::Outbound => PhoneNumber::parse(&self.to),
            CallDirection::Inbound => PhoneNumber::parse(&self.from),
        }
    }
}

/// Remote operations offered by the telephony provider.
#[async_trait::async_trait]
pub trait TelephonyGateway: Send + Sync {
    /// Start a conference owned by `from`; returns the new conference id.
    async fn start_conference(&self, from: &PhoneNumber) -> Result<String, GatewayError>;

    /// Move a conference to the completed state, hanging up every member.
    async fn end_conference(&self, conference_id: &str) -> Result<(), GatewayError>;

    /// Attach an existing call to a conference.
    async fn add_call_to_conference(
        &self,
        call_id: &str,
        conference_id: &str,
    ) -> Result<(), GatewayError>;

    /// Send one text message.
    async fn send_text(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<(), GatewayError>;

    /// Members of a conference, in provider order.
    async fn list_conference_members(
        &self,
        conference_id: &str,
    ) -> Result<Vec<ConferenceMember>, GatewayError>;

    /// Direction and endpoints of a call.
    async fn get_call_info(&self, call_ref: &str) -> Result<CallLeg, GatewayError>;

    /// Dial `to` from `from`, optionally pre-bound to a conference; returns the call id.
    async fn create_call(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        conference_id: Option<&str>,
    ) -> Result<String, GatewayError>;
}

/// Extract a resource identifier from a provider locator.
///
/// Creation responses point at the new resource, e.g.
/// `https://api.example.com/v1/users/u-1/conferences/conf-9`; the identifier is
/// the trailing path segment (`conf-9`). A trailing slash, query string and
/// fragment are ignored. Bare identifiers and relative paths are accepted.
///
/// # Errors
///
/// Returns `GatewayError::InvalidLocator` when there is no non-empty trailing
/// path segment (empty input, `/`, or a URL with no path).
pub fn resource_id_from_locator(locator: &str) -> Result<String, GatewayError> {
    let trimmed = locator.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();

    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
        None => without_query,
    };

    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidLocator(locator.to_string()))
}
