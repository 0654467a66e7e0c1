//! Command-line variant.
//!
//! Dials every member into a fresh conference, waits for the operator to type
//! a closing text, hangs the conference up and texts everyone:
//!
//! ```text
//! conference-cli <member-1> ... <member-n> <system-number>
//! ```

use crate::config::ConfigError;
use crate::coordinator::fanout::fan_out;
use crate::errors::GatewayError;
use crate::gateway::TelephonyGateway;
use clap::Parser;
use common::types::PhoneNumber;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, instrument, warn};

/// Fewest members a command-line conference may dial.
pub const MIN_CLI_MEMBERS: usize = 3;

/// Most members a command-line conference may dial.
pub const MAX_CLI_MEMBERS: usize = 10;

/// Exit status for usage and credential errors (`-1`).
pub const USAGE_EXIT_CODE: u8 = 255;

pub const USAGE: &str = "\
conference-cli <member-1-number> <member-2-number> ... <member-n-number> <system-phone-number>

Phone numbers must be in +1XXXYYYZZZZ format.

You must list at least 3 and at most 10 member numbers. The <system-phone-number>
is your provider phone number; it starts the conference call and sends the
ending text.

Provider credentials are read from BANDWIDTH_USER_ID, BANDWIDTH_API_TOKEN and
BANDWIDTH_API_SECRET.";

#[derive(Debug, Parser)]
#[command(name = "conference-cli")]
#[command(version, about = "Dial a group into a conference call and text them when it ends")]
pub struct CliArgs {
    /// Member numbers followed by the system number, all in +1XXXYYYZZZZ format
    #[arg(required = true, num_args = 1.., value_name = "NUMBER")]
    pub numbers: Vec<String>,
}

/// Validated command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliPlan {
    pub members: Vec<PhoneNumber>,
    pub system_number: PhoneNumber,
}

/// What a command-line conference did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliSummary {
    pub conference_id: String,
    /// Members whose call was created and attached to the conference.
    pub dialed: Vec<PhoneNumber>,
    pub failed_dials: Vec<PhoneNumber>,
    pub closing_text: String,
    pub failed_texts: Vec<PhoneNumber>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("Missing provider credentials: {0}")]
    Credentials(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) | CliError::Credentials(_) => USAGE_EXIT_CODE,
            CliError::Gateway(_) | CliError::Io(_) => 1,
        }
    }
}

/// Split and validate `<member>... <system>`.
///
/// # Errors
///
/// `CliError::Usage` for a wrong member count or a number outside the
/// `+1XXXYYYZZZZ` plan.
pub fn plan_from_args(numbers: &[String]) -> Result<CliPlan, CliError> {
    let Some((system, members)) = numbers.split_last() else {
        return Err(CliError::Usage("no phone numbers given".to_string()));
    };

    if !(MIN_CLI_MEMBERS..=MAX_CLI_MEMBERS).contains(&members.len()) {
        return Err(CliError::Usage(format!(
            "You must have at least {MIN_CLI_MEMBERS} phone numbers to make a conference call. \
             The maximum number of phone numbers allowed is {MAX_CLI_MEMBERS} (got {}).",
            members.len()
        )));
    }

    let parse = |raw: &String| {
        PhoneNumber::parse_north_american(raw).map_err(|e| CliError::Usage(e.to_string()))
    };

    Ok(CliPlan {
        members: members.iter().map(parse).collect::<Result<_, _>>()?,
        system_number: parse(system)?,
    })
}

/// Run one conference from start to closing text.
///
/// Dial or text failures for individual members are logged and reported in
/// the summary; only a failure to start the conference or to talk to the
/// terminal aborts.
///
/// # Errors
///
/// `CliError::Gateway` if the conference cannot be started, `CliError::Io`
/// if the prompt cannot be written or no closing text can be read. The
/// conference is ended before an input error is returned.
#[instrument(skip_all, name = "cs.cli.run", fields(system = %plan.system_number))]
pub async fn run_conference<R, W>(
    gateway: &dyn TelephonyGateway,
    plan: &CliPlan,
    concurrency: usize,
    mut input: R,
    mut output: W,
) -> Result<CliSummary, CliError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let system = &plan.system_number;
    let conference_id = gateway.start_conference(system).await?;
    info!(target: "cs.cli", conference_id = %conference_id, "Conference created");

    let conference = conference_id.as_str();
    let dials = fan_out(plan.members.clone(), concurrency, |member| async move {
        let call_id = gateway.create_call(system, &member, Some(conference)).await?;
        gateway.add_call_to_conference(&call_id, conference).await
    })
    .await;

    let mut dialed = Vec::new();
    let mut failed_dials = Vec::new();
    for (member, result) in plan.members.iter().zip(dials) {
        match result {
            Ok(()) => dialed.push(member.clone()),
            Err(e) => {
                warn!(target: "cs.cli", member = %member, error = %e, "Failed to dial member");
                failed_dials.push(member.clone());
            }
        }
    }

    output
        .write_all(
            format!(
                "Conference call has been started by {system} to {}\n",
                join(&dialed)
            )
            .as_bytes(),
        )
        .await?;
    output
        .write_all(
            format!(
                "Please type your ending text message and press enter when you are ready to end conference {conference_id}:\n"
            )
            .as_bytes(),
        )
        .await?;
    output.flush().await?;

    let mut line = String::new();
    let read = input.read_line(&mut line).await;

    if let Err(e) = gateway.end_conference(conference).await {
        warn!(target: "cs.cli", conference_id = %conference_id, error = %e, "Failed to end conference");
    }

    if read? == 0 {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "input closed before a closing text was entered",
        )));
    }
    let closing_text = line.trim_end_matches(['\r', '\n']).to_string();
    let text = closing_text.as_str();

    let sends = fan_out(plan.members.clone(), concurrency, |member| async move {
        gateway.send_text(system, &member, text).await
    })
    .await;

    let mut failed_texts = Vec::new();
    for (member, result) in plan.members.iter().zip(sends) {
        if let Err(e) = result {
            warn!(target: "cs.cli", member = %member, error = %e, "Failed to send closing text");
            failed_texts.push(member.clone());
        }
    }

    output
        .write_all(
            format!(
                "Conference {conference_id} has been ended. Group text sent by {system}\nGroup text message: {closing_text}\n"
            )
            .as_bytes(),
        )
        .await?;
    output.flush().await?;

    Ok(CliSummary {
        conference_id,
        dialed,
        failed_dials,
        closing_text,
        failed_texts,
    })
}

fn join(numbers: &[PhoneNumber]) -> String {
    numbers
        .iter()
        .map(PhoneNumber::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::gateway::mock::{GatewayCall, MockGateway};
    use crate::gateway::operation;

    const SYSTEM: &str = "+19195550000";

    fn args(members: usize) -> Vec<String> {
        let mut numbers: Vec<String> = (0..members)
            .map(|i| format!("+1919555{:04}", 1000 + i))
            .collect();
        numbers.push(SYSTEM.to_string());
        numbers
    }

    #[test]
    fn test_plan_accepts_three_to_ten_members() {
        for n in [3, 5, 10] {
            let plan = plan_from_args(&args(n)).unwrap();
            assert_eq!(plan.members.len(), n);
            assert_eq!(plan.system_number.as_str(), SYSTEM);
        }
    }

    #[test]
    fn test_plan_rejects_wrong_member_count() {
        for n in [0, 1, 2, 11] {
            assert!(
                matches!(plan_from_args(&args(n)), Err(CliError::Usage(_))),
                "{n} members should be rejected"
            );
        }
        assert!(matches!(plan_from_args(&[]), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_plan_rejects_non_north_american_numbers() {
        let mut numbers = args(3);
        numbers[1] = "+442071838750".to_string();
        assert!(matches!(plan_from_args(&numbers), Err(CliError::Usage(_))));

        let mut numbers = args(3);
        numbers[3] = "9195550000".to_string();
        assert!(matches!(plan_from_args(&numbers), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_clap_collects_positional_numbers() {
        let parsed = CliArgs::try_parse_from(["conference-cli", "+19195551000", SYSTEM]).unwrap();
        assert_eq!(parsed.numbers, vec!["+19195551000", SYSTEM]);

        assert!(CliArgs::try_parse_from(["conference-cli"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Usage("x".to_string()).exit_code(), USAGE_EXIT_CODE);
        assert_eq!(
            CliError::Credentials(ConfigError::MissingEnvVar("BANDWIDTH_USER_ID".to_string()))
                .exit_code(),
            USAGE_EXIT_CODE
        );
        assert_eq!(
            CliError::Gateway(GatewayError::Timeout("x".to_string())).exit_code(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_conference_dials_prompts_and_texts() {
        let mock = MockGateway::new();
        let plan = plan_from_args(&args(3)).unwrap();
        let mut output = Vec::new();

        let summary = run_conference(&mock, &plan, 2, &b"Thanks for joining\n"[..], &mut output)
            .await
            .unwrap();

        assert_eq!(summary.conference_id, "conf-1");
        assert_eq!(summary.dialed, plan.members);
        assert!(summary.failed_dials.is_empty());
        assert_eq!(summary.closing_text, "Thanks for joining");

        assert_eq!(mock.count(operation::START_CONFERENCE), 1);
        assert_eq!(mock.count(operation::CREATE_CALL), 3);
        assert_eq!(mock.count(operation::ADD_CALL_TO_CONFERENCE), 3);
        assert_eq!(mock.count(operation::END_CONFERENCE), 1);
        for member in &plan.members {
            assert_eq!(mock.texts_to(member), vec!["Thanks for joining".to_string()]);
        }
        assert!(mock.calls().iter().all(|call| match call {
            GatewayCall::CreateCall { conference_id, .. } => conference_id.as_deref() == Some("conf-1"),
            _ => true,
        }));

        // Conference is ended before any closing text goes out
        let calls = mock.calls();
        let end = calls
            .iter()
            .position(|c| c.operation() == operation::END_CONFERENCE)
            .unwrap();
        let first_text = calls
            .iter()
            .position(|c| c.operation() == operation::SEND_TEXT)
            .unwrap();
        assert!(end < first_text);

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("ready to end conference conf-1"));
        assert!(printed.contains("Group text message: Thanks for joining"));
    }

    #[tokio::test]
    async fn test_run_conference_continues_past_failed_member() {
        let mock = MockGateway::new();
        let plan = plan_from_args(&args(3)).unwrap();
        mock.fail_texts_to(&plan.members[0]);

        let summary = run_conference(&mock, &plan, 4, &b"bye\r\n"[..], Vec::new())
            .await
            .unwrap();

        assert_eq!(summary.closing_text, "bye");
        assert_eq!(summary.failed_texts, vec![plan.members[0].clone()]);
        assert_eq!(mock.count(operation::SEND_TEXT), 3);
    }

    #[tokio::test]
    async fn test_run_conference_start_failure_aborts() {
        let mock = MockGateway::new();
        mock.fail_operation(operation::START_CONFERENCE);
        let plan = plan_from_args(&args(3)).unwrap();

        let result = run_conference(&mock, &plan, 4, &b"bye\n"[..], Vec::new()).await;

        assert!(matches!(result, Err(CliError::Gateway(_))));
        assert_eq!(mock.count(operation::CREATE_CALL), 0);
    }

    #[tokio::test]
    async fn test_run_conference_closed_input_still_ends_conference() {
        let mock = MockGateway::new();
        let plan = plan_from_args(&args(3)).unwrap();

        let result = run_conference(&mock, &plan, 4, &b""[..], Vec::new()).await;

        assert!(matches!(result, Err(CliError::Io(_))));
        assert_eq!(mock.count(operation::END_CONFERENCE), 1);
        assert_eq!(mock.count(operation::SEND_TEXT), 0);
    }
}
