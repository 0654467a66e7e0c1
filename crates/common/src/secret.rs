//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types for
//! the telephony provider credentials and anything else that must never show
//! up in logs.
//!
//! `SecretString` prints `[REDACTED]` under `Debug`, so a struct that derives
//! `Debug` around one can go into `{:?}` or a tracing field as-is. The value
//! is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BasicAuth {
//!     api_token: String,
//!     api_secret: SecretString,
//! }
//!
//! let auth = BasicAuth {
//!     api_token: "t-abc".to_string(),
//!     api_secret: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{auth:?}").contains("hunter2"));
//! assert_eq!(auth.api_secret.expose_secret(), "hunter2");
//! ```
//!
//! With secrecy's `serde` feature, `SecretString` fields deserialize straight
//! from config or JSON.

pub use secrecy::{ExposeSecret, SecretString};
