//! Conference CLI
//!
//! Dials a group into a conference call, then texts everyone the closing
//! message typed at the prompt.

use clap::Parser;
use conference_service::cli::{self, CliArgs, CliError, USAGE, USAGE_EXIT_CODE};
use conference_service::config::{
    ProviderCredentials, DEFAULT_FANOUT_CONCURRENCY, DEFAULT_GATEWAY_MAX_ATTEMPTS,
    DEFAULT_GATEWAY_TIMEOUT_SECONDS,
};
use conference_service::gateway::{GatewaySettings, HttpGateway, RetryPolicy};
use conference_service::observability::{init_tracing, CLI_LOG_FILTER};
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(CLI_LOG_FILTER, false);

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            eprintln!("{USAGE}");
            return ExitCode::from(USAGE_EXIT_CODE);
        }
    };

    let plan = match cli::plan_from_args(&args.numbers) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            return ExitCode::from(e.exit_code());
        }
    };

    let credentials = match ProviderCredentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!(
                "You need to set the following environment variables: \
                 BANDWIDTH_USER_ID, BANDWIDTH_API_TOKEN, BANDWIDTH_API_SECRET"
            );
            return ExitCode::from(CliError::from(e).exit_code());
        }
    };

    let gateway = match HttpGateway::new(GatewaySettings {
        credentials,
        request_timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECONDS),
        retry: RetryPolicy::new(DEFAULT_GATEWAY_MAX_ATTEMPTS),
    }) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(target: "cs.cli", error = %e, "Failed to create provider client");
            return ExitCode::FAILURE;
        }
    };

    match cli::run_conference(
        &gateway,
        &plan,
        DEFAULT_FANOUT_CONCURRENCY,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "cs.cli", error = %e, "Conference failed");
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
