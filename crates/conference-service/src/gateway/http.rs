//! Provider REST client.
//!
//! Talks to a Bandwidth (Catapult v1) style API: every resource lives under
//! `{base}/users/{user_id}/...`, creation responses return the new resource's
//! locator in the `Location` header, and requests authenticate with HTTP basic
//! auth (API token / API secret).
//!
//! # Retries
//!
//! Reads are retried on any transient failure. Mutations (texts, calls,
//! conference changes) are retried only when the failure proves the provider
//! did not act on the request, so a flaky network never sends the same text
//! twice. Backoff doubles from `initial_backoff` up to `max_backoff`.

use super::{
    operation, resource_id_from_locator, CallLeg, ConferenceMember, TelephonyGateway,
};
use crate::config::{Config, ProviderCredentials};
use crate::errors::GatewayError;
use crate::observability::metrics::record_gateway_request;
use common::secret::{ExposeSecret, SecretString};
use common::types::{CallDirection, PhoneNumber};
use reqwest::header::LOCATION;
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Default connect timeout for provider requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Initial backoff delay for retry.
const INITIAL_BACKOFF_MS: u64 = 200;

/// Maximum backoff delay.
const MAX_BACKOFF_MS: u64 = 2_000;

/// How often and how patiently a failed call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff policy with the default delays.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }

    /// Single attempt, no retry.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Override the backoff delays.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }
}

/// Everything needed to build an [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub credentials: ProviderCredentials,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl GatewaySettings {
    /// Settings for the webhook server.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            credentials: ProviderCredentials {
                api_base_url: config.api_base_url.clone(),
                user_id: config.user_id.clone(),
                api_token: config.api_token.clone(),
                api_secret: config.api_secret.clone(),
            },
            request_timeout: config.gateway_timeout(),
            retry: RetryPolicy::new(config.gateway_max_attempts),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateConferenceRequest<'a> {
    from: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateConferenceRequest {
    state: &'static str,
}

#[derive(Debug, Serialize)]
struct AddMemberRequest<'a> {
    #[serde(rename = "callId")]
    call_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateCallRequest<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(rename = "conferenceId", skip_serializing_if = "Option::is_none")]
    conference_id: Option<&'a str>,
}

/// Member entry from `GET .../conferences/{id}/members`; `call` is a locator.
#[derive(Debug, Deserialize)]
struct MemberResponse {
    id: String,
    call: String,
}

/// Call detail from `GET .../calls/{id}`.
#[derive(Debug, Deserialize)]
struct CallResponse {
    id: String,
    direction: CallDirection,
    from: String,
    to: String,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP implementation of [`TelephonyGateway`].
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    user_id: String,
    api_token: SecretString,
    api_secret: SecretString,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("api_token", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("retry", &self.retry)
            .finish()
    }
}

impl HttpGateway {
    /// Create a new provider client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Connect` if the HTTP client cannot be built.
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                error!(target: "cs.gateway", error = %e, "Failed to build HTTP client");
                GatewayError::Connect(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: settings
                .credentials
                .api_base_url
                .trim_end_matches('/')
                .to_string(),
            user_id: settings.credentials.user_id,
            api_token: settings.credentials.api_token,
            api_secret: settings.credentials.api_secret,
            retry: settings.retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/{}/{}", self.base_url, self.user_id, path)
    }

    /// Send one request and map transport failures and non-2xx statuses.
    async fn send_once<B>(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(
                self.api_token.expose_secret(),
                Some(self.api_secret.expose_secret()),
            );
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let result = request.send().await;
        let elapsed = started.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                record_gateway_request(operation, false, elapsed);
                return Err(map_transport_error(&e));
            }
        };

        let status = response.status();
        record_gateway_request(operation, status.is_success(), elapsed);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(
                target: "cs.gateway",
                operation,
                status = %status,
                body = %body,
                "Provider rejected request"
            );
            Err(GatewayError::Status {
                operation,
                status: status.as_u16(),
            })
        }
    }

    /// Send with retries according to the policy.
    ///
    /// `idempotent` selects the retry rule: any transient failure for reads,
    /// only provably-unprocessed failures for mutations.
    async fn execute<B>(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        body: Option<&B>,
        idempotent: bool,
    ) -> Result<Response, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let mut attempt = 1;
        let mut backoff = self.retry.initial_backoff;

        loop {
            match self.send_once(operation, method.clone(), url, body).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable = if idempotent {
                        e.is_transient()
                    } else {
                        e.is_safe_to_replay()
                    };

                    if !retryable || attempt >= self.retry.max_attempts {
                        return Err(e);
                    }

                    warn!(
                        target: "cs.gateway",
                        operation,
                        attempt,
                        error = %e,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "Provider call failed, will retry"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    attempt += 1;
                }
            }
        }
    }
}

fn map_transport_error(e: &reqwest::Error) -> GatewayError {
    if e.is_connect() {
        GatewayError::Connect(e.to_string())
    } else if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else {
        GatewayError::Network(e.to_string())
    }
}

/// Identifier of the resource a creation response points at.
fn created_resource_id(
    response: &Response,
    operation: &'static str,
) -> Result<String, GatewayError> {
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or(GatewayError::MissingLocator(operation))?
        .to_str()
        .map_err(|e| GatewayError::InvalidLocator(format!("non-ASCII Location header: {e}")))?;

    resource_id_from_locator(location)
}

#[async_trait::async_trait]
impl TelephonyGateway for HttpGateway {
    #[instrument(skip_all, name = "cs.gateway.start_conference", fields(from = %from))]
    async fn start_conference(&self, from: &PhoneNumber) -> Result<String, GatewayError> {
        let response = self
            .execute(
                operation::START_CONFERENCE,
                Method::POST,
                &self.url("conferences"),
                Some(&CreateConferenceRequest {
                    from: from.as_str(),
                }),
                false,
            )
            .await?;

        created_resource_id(&response, operation::START_CONFERENCE)
    }

    #[instrument(skip_all, name = "cs.gateway.end_conference", fields(conference_id = %conference_id))]
    async fn end_conference(&self, conference_id: &str) -> Result<(), GatewayError> {
        // Completing an already-completed conference is harmless, so this is
        // retried like a read.
        self.execute(
            operation::END_CONFERENCE,
            Method::POST,
            &self.url(&format!("conferences/{conference_id}")),
            Some(&UpdateConferenceRequest { state: "completed" }),
            true,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip_all, name = "cs.gateway.add_call", fields(call_id = %call_id, conference_id = %conference_id))]
    async fn add_call_to_conference(
        &self,
        call_id: &str,
        conference_id: &str,
    ) -> Result<(), GatewayError> {
        self.execute(
            operation::ADD_CALL_TO_CONFERENCE,
            Method::POST,
            &self.url(&format!("conferences/{conference_id}/members")),
            Some(&AddMemberRequest { call_id }),
            false,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip_all, name = "cs.gateway.send_text", fields(to = %to))]
    async fn send_text(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<(), GatewayError> {
        self.execute(
            operation::SEND_TEXT,
            Method::POST,
            &self.url("messages"),
            Some(&SendMessageRequest {
                from: from.as_str(),
                to: to.as_str(),
                text,
            }),
            false,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip_all, name = "cs.gateway.list_members", fields(conference_id = %conference_id))]
    async fn list_conference_members(
        &self,
        conference_id: &str,
    ) -> Result<Vec<ConferenceMember>, GatewayError> {
        let response = self
            .execute::<()>(
                operation::LIST_CONFERENCE_MEMBERS,
                Method::GET,
                &self.url(&format!("conferences/{conference_id}/members")),
                None,
                true,
            )
            .await?;

        let members: Vec<MemberResponse> = response.json().await.map_err(|e| {
            warn!(target: "cs.gateway", error = %e, "Failed to parse member list");
            GatewayError::InvalidResponse(format!("member list: {e}"))
        })?;

        let mut resolved = Vec::with_capacity(members.len());
        for member in members {
            match resource_id_from_locator(&member.call) {
                Ok(call_ref) => resolved.push(ConferenceMember {
                    member_id: member.id,
                    call_ref,
                }),
                Err(e) => warn!(
                    target: "cs.gateway",
                    member_id = %member.id,
                    error = %e,
                    "Skipping member with unusable call locator"
                ),
            }
        }

        Ok(resolved)
    }

    #[instrument(skip_all, name = "cs.gateway.get_call_info", fields(call_ref = %call_ref))]
    async fn get_call_info(&self, call_ref: &str) -> Result<CallLeg, GatewayError> {
        let response = self
            .execute::<()>(
                operation::GET_CALL_INFO,
                Method::GET,
                &self.url(&format!("calls/{call_ref}")),
                None,
                true,
            )
            .await?;

        let call: CallResponse = response.json().await.map_err(|e| {
            warn!(target: "cs.gateway", error = %e, "Failed to parse call detail");
            GatewayError::InvalidResponse(format!("call detail: {e}"))
        })?;

        Ok(CallLeg {
            call_id: call.id,
            direction: call.direction,
            from: call.from,
            to: call.to,
        })
    }

    #[instrument(skip_all, name = "cs.gateway.create_call", fields(to = %to))]
    async fn create_call(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        conference_id: Option<&str>,
    ) -> Result<String, GatewayError> {
        let response = self
            .execute(
                operation::CREATE_CALL,
                Method::POST,
                &self.url("calls"),
                Some(&CreateCallRequest {
                    from: from.as_str(),
                    to: to.as_str(),
                    conference_id,
                }),
                false,
            )
            .await?;

        created_resource_id(&response, operation::CREATE_CALL)
    }
}
