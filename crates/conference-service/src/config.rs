//! Conference service configuration.
//!
//! Configuration is loaded from environment variables. Provider credentials
//! are redacted in Debug output.

use common::error::PhoneNumberError;
use common::secret::SecretString;
use common::types::PhoneNumber;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default webhook server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default provider REST API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.catapult.inetwork.com/v1";

/// Default smallest participant list a start message may carry.
pub const DEFAULT_MIN_PARTICIPANTS: usize = 1;

/// Default largest participant list a start message may carry.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 20;

/// Default number of provider calls issued concurrently during fan-out.
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 8;

/// Default per-request HTTP timeout towards the provider.
pub const DEFAULT_GATEWAY_TIMEOUT_SECONDS: u64 = 10;

/// Default deadline for one gateway operation including retries.
pub const DEFAULT_OPERATION_TIMEOUT_SECONDS: u64 = 30;

/// Default total attempts for a retryable provider call.
pub const DEFAULT_GATEWAY_MAX_ATTEMPTS: u32 = 3;

/// Conference service configuration.
#[derive(Clone)]
pub struct Config {
    /// Webhook server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Provider REST API base URL, without trailing `/users/...`.
    pub api_base_url: String,

    /// Provider account id.
    pub user_id: String,

    /// Provider API token (basic-auth user).
    pub api_token: SecretString,

    /// Provider API secret (basic-auth password).
    pub api_secret: SecretString,

    /// Number the system texts and calls from.
    pub system_number: PhoneNumber,

    /// The only number allowed to start and end conferences.
    pub organizer_number: PhoneNumber,

    /// Smallest accepted participant list.
    pub min_participants: usize,

    /// Largest accepted participant list.
    pub max_participants: usize,

    /// Concurrent provider calls during invite/notify fan-out.
    pub fanout_concurrency: usize,

    /// Per-request HTTP timeout in seconds.
    pub gateway_timeout_seconds: u64,

    /// Deadline for one gateway operation (all attempts) in seconds.
    pub operation_timeout_seconds: u64,

    /// Total attempts for retryable provider calls.
    pub gateway_max_attempts: u32,

    /// Emit JSON-formatted logs.
    pub json_logs: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("api_base_url", &self.api_base_url)
            .field("user_id", &self.user_id)
            .field("api_token", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("system_number", &self.system_number)
            .field("organizer_number", &self.organizer_number)
            .field("min_participants", &self.min_participants)
            .field("max_participants", &self.max_participants)
            .field("fanout_concurrency", &self.fanout_concurrency)
            .field("gateway_timeout_seconds", &self.gateway_timeout_seconds)
            .field("operation_timeout_seconds", &self.operation_timeout_seconds)
            .field("gateway_max_attempts", &self.gateway_max_attempts)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value is invalid.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let credentials = ProviderCredentials::from_vars(vars)?;

        let system_number = phone_number(vars, "CONF_SYSTEM_NUMBER")?;
        let organizer_number = phone_number(vars, "CONF_ORGANIZER_NUMBER")?;

        let bind_address = vars
            .get("CONF_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let min_participants =
            parse_or_default(vars, "CONF_MIN_PARTICIPANTS", DEFAULT_MIN_PARTICIPANTS)?;
        let max_participants =
            parse_or_default(vars, "CONF_MAX_PARTICIPANTS", DEFAULT_MAX_PARTICIPANTS)?;
        if min_participants == 0 || min_participants > max_participants {
            return Err(ConfigError::InvalidValue(format!(
                "participant bounds {min_participants}..={max_participants} are not a valid range"
            )));
        }

        let fanout_concurrency =
            parse_or_default(vars, "CONF_FANOUT_CONCURRENCY", DEFAULT_FANOUT_CONCURRENCY)?;
        if fanout_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "CONF_FANOUT_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let gateway_timeout_seconds = parse_or_default(
            vars,
            "CONF_GATEWAY_TIMEOUT_SECONDS",
            DEFAULT_GATEWAY_TIMEOUT_SECONDS,
        )?;
        let operation_timeout_seconds = parse_or_default(
            vars,
            "CONF_OPERATION_TIMEOUT_SECONDS",
            DEFAULT_OPERATION_TIMEOUT_SECONDS,
        )?;
        if gateway_timeout_seconds == 0 || operation_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "gateway timeouts must be at least 1 second".to_string(),
            ));
        }

        let gateway_max_attempts = parse_or_default(
            vars,
            "CONF_GATEWAY_MAX_ATTEMPTS",
            DEFAULT_GATEWAY_MAX_ATTEMPTS,
        )?;
        if gateway_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "CONF_GATEWAY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let json_logs = parse_or_default(vars, "CONF_LOG_JSON", false)?;

        Ok(Config {
            bind_address,
            api_base_url: credentials.api_base_url,
            user_id: credentials.user_id,
            api_token: credentials.api_token,
            api_secret: credentials.api_secret,
            system_number,
            organizer_number,
            min_participants,
            max_participants,
            fanout_concurrency,
            gateway_timeout_seconds,
            operation_timeout_seconds,
            gateway_max_attempts,
            json_logs,
        })
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_seconds)
    }

    /// Deadline for one gateway operation including retries.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }
}

/// Provider account settings shared by the webhook server and the
/// command-line variant (which takes its system number from argv).
#[derive(Clone)]
pub struct ProviderCredentials {
    pub api_base_url: String,
    pub user_id: String,
    pub api_token: SecretString,
    pub api_secret: SecretString,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_base_url", &self.api_base_url)
            .field("user_id", &self.user_id)
            .field("api_token", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl ProviderCredentials {
    /// Load provider credentials from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` naming the first missing variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load provider credentials from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` naming the first missing variable.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let user_id = required(vars, "BANDWIDTH_USER_ID")?;
        let api_token = SecretString::from(required(vars, "BANDWIDTH_API_TOKEN")?);
        let api_secret = SecretString::from(required(vars, "BANDWIDTH_API_SECRET")?);

        let api_base_url = vars
            .get("BANDWIDTH_API_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            api_base_url,
            user_id,
            api_token,
            api_secret,
        })
    }
}

/// Present and non-blank, or `MissingEnvVar`.
fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn phone_number(vars: &HashMap<String, String>, key: &str) -> Result<PhoneNumber, ConfigError> {
    let raw = required(vars, key)?;
    PhoneNumber::parse(&raw).map_err(|e: PhoneNumberError| {
        ConfigError::InvalidValue(format!("{key}: {e}"))
    })
}

fn parse_or_default<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{key}={raw}: {e}"))),
    }
}
