//! Observability module: metrics definitions and logging setup.

pub mod metrics;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter for the webhook server when `RUST_LOG` is unset.
///
/// Events carry explicit `cs.*` targets; `cs` matches them all by prefix.
pub const DEFAULT_LOG_FILTER: &str = "cs=debug,conference_service=debug,tower_http=debug";

/// Default log filter for the command-line variant; keeps the prompt readable.
pub const CLI_LOG_FILTER: &str = "cs=warn,conference_service=warn";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; falls back to `default_filter`. Logs go to stderr so
/// the command-line variant's stdout stays clean for prompts.
pub fn init_tracing(default_filter: &str, json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
