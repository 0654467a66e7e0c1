//! Conference Service Library
//!
//! Text-driven phone conference coordinator. The organizer texts a list of
//! numbers to the system number; the service starts a conference at the
//! telephony provider, texts everyone an invite, admits their inbound calls,
//! and when the organizer texts anything else, ends the conference, forwards
//! that text to everyone who joined and sends the organizer the roster.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/webhooks.rs -> ingress.rs -> coordinator/ -> gateway/
//! ```
//!
//! # Modules
//!
//! - `cli` - Command-line variant (dial everyone, prompt, hang up, text)
//! - `config` - Service configuration from environment
//! - `coordinator` - Session state machine and fan-out
//! - `errors` - Error types
//! - `gateway` - Telephony provider trait, HTTP client and mock
//! - `handlers` - HTTP request handlers
//! - `ingress` - Webhook payload parsing
//! - `notifications` - Outbound text bodies
//! - `observability` - Logging and metrics setup
//! - `routes` - Axum router setup

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod ingress;
pub mod notifications;
pub mod observability;
pub mod routes;
