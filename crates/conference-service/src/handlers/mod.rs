//! HTTP request handlers for the conference service.

pub mod health;
pub mod metrics;
pub mod webhooks;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use webhooks::{message_webhook, voice_webhook};
