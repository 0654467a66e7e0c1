//! Conference lifecycle coordinator.
//!
//! Turns provider events into conference actions:
//!
//! - an organizer text listing numbers starts a conference and invites them
//! - an inbound call joins the active conference
//! - any other organizer text ends the conference, forwards the text to
//!   everyone who joined and sends the organizer the attendee roster
//!
//! The [`SessionStore`] is the only serialization point. Provider I/O always
//! happens after the store's lock is released, and every provider call is
//! bounded by the operation timeout.

pub mod fanout;
pub mod session;

pub use session::{ConferenceSession, SessionState, SessionStore};

use crate::config::Config;
use crate::errors::{CoordinatorError, GatewayError};
use crate::gateway::{operation, TelephonyGateway};
use crate::ingress::InboundEvent;
use crate::notifications;
use crate::observability::metrics::{record_conference, record_fanout_failure};
use common::types::PhoneNumber;
use fanout::fan_out;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Policy knobs for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub system_number: PhoneNumber,
    pub organizer: PhoneNumber,
    pub min_participants: usize,
    pub max_participants: usize,
    pub fanout_concurrency: usize,
    pub operation_timeout: Duration,
}

impl CoordinatorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_number: config.system_number.clone(),
            organizer: config.organizer_number.clone(),
            min_participants: config.min_participants,
            max_participants: config.max_participants,
            fanout_concurrency: config.fanout_concurrency,
            operation_timeout: config.operation_timeout(),
        }
    }
}

/// What a successful start did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub conference_id: String,
    pub invited: Vec<PhoneNumber>,
    /// Invitees whose invite text could not be sent.
    pub failed_invites: Vec<PhoneNumber>,
}

/// What an end did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndReport {
    pub conference_id: String,
    /// Resolved participants, first-join order, without duplicates.
    pub participants: Vec<PhoneNumber>,
    /// Participants whose closing text could not be sent.
    pub failed_notifications: Vec<PhoneNumber>,
    /// Members whose call leg could not be resolved to a number.
    pub unresolved_members: usize,
}

/// How an organizer text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIntent {
    Start,
    Close,
}

/// Classify an organizer text.
///
/// Without a session, a text whose first token looks like a number (leading
/// `+` or digit) is a start request, so a mistyped list still gets an error
/// text; any other text is a late closing message and is dropped. With a
/// session, a text made only of phone numbers is still a start request (and
/// will be refused); anything else closes the conference.
#[must_use]
pub fn classify_message(text: &str, session_present: bool) -> MessageIntent {
    if !session_present {
        let looks_numeric = text
            .split_whitespace()
            .next()
            .and_then(|token| token.chars().next())
            .is_some_and(|c| c == '+' || c.is_ascii_digit());
        return if looks_numeric {
            MessageIntent::Start
        } else {
            MessageIntent::Close
        };
    }

    let mut tokens = text.split_whitespace().peekable();
    if tokens.peek().is_some() && tokens.all(|token| PhoneNumber::parse(token).is_ok()) {
        MessageIntent::Start
    } else {
        MessageIntent::Close
    }
}

/// Owns the session and drives the provider.
pub struct Coordinator {
    gateway: Arc<dyn TelephonyGateway>,
    sessions: SessionStore,
    settings: CoordinatorSettings,
}

impl Coordinator {
    #[must_use]
    pub fn new(gateway: Arc<dyn TelephonyGateway>, settings: CoordinatorSettings) -> Self {
        Self {
            gateway,
            sessions: SessionStore::new(),
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Read-only copy of the current session.
    pub async fn snapshot(&self) -> Option<ConferenceSession> {
        self.sessions.snapshot().await
    }

    /// Bound a provider call by the operation timeout.
    async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        tokio::time::timeout(self.settings.operation_timeout, call)
            .await
            .map_err(|_| {
                GatewayError::Timeout(format!(
                    "{operation} exceeded {}ms",
                    self.settings.operation_timeout.as_millis()
                ))
            })?
    }

    /// Best-effort text from the system number.
    async fn notify(&self, to: &PhoneNumber, text: &str) -> Result<(), GatewayError> {
        let result = self
            .call(
                operation::SEND_TEXT,
                self.gateway.send_text(&self.settings.system_number, to, text),
            )
            .await;

        if let Err(e) = &result {
            warn!(target: "cs.coordinator", to = %to, error = %e, "Failed to send text");
        }
        result
    }

    fn ensure_organizer(&self, from: &str) -> Result<(), CoordinatorError> {
        if from.trim() == self.settings.organizer.as_str() {
            Ok(())
        } else {
            Err(CoordinatorError::NotOrganizer(from.to_string()))
        }
    }

    /// Start a conference from the organizer's list of numbers.
    ///
    /// # Errors
    ///
    /// - `NotOrganizer` / `SessionInProgress`: nothing is sent
    /// - `ParticipantCount` / `InvalidNumber`: one error text to the organizer
    /// - `Gateway`: the provider refused to start; organizer gets an apology
    /// - `ConferenceIdReused`: the provider returned an ended conference's id
    #[instrument(skip_all, name = "cs.coordinator.start")]
    pub async fn handle_organizer_start(
        &self,
        organizer: &str,
        raw_text: &str,
    ) -> Result<StartReport, CoordinatorError> {
        self.ensure_organizer(organizer)?;

        if self.sessions.snapshot().await.is_some() {
            return Err(CoordinatorError::SessionInProgress);
        }

        let tokens: Vec<&str> = raw_text.split_whitespace().collect();
        let (min, max) = (
            self.settings.min_participants,
            self.settings.max_participants,
        );
        if !(min..=max).contains(&tokens.len()) {
            record_conference("rejected");
            let _ = self
                .notify(
                    &self.settings.organizer,
                    &notifications::participant_count_error_text(tokens.len(), min, max),
                )
                .await;
            return Err(CoordinatorError::ParticipantCount {
                count: tokens.len(),
                min,
                max,
            });
        }

        let mut invited: Vec<PhoneNumber> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            match PhoneNumber::parse(token) {
                Ok(number) => {
                    if !invited.contains(&number) {
                        invited.push(number);
                    }
                }
                Err(e) => {
                    record_conference("rejected");
                    let _ = self
                        .notify(
                            &self.settings.organizer,
                            &notifications::invalid_number_text(token),
                        )
                        .await;
                    return Err(CoordinatorError::InvalidNumber(e));
                }
            }
        }

        self.sessions
            .try_reserve(&self.settings.organizer, &invited)
            .await?;

        let conference_id = match self
            .call(
                operation::START_CONFERENCE,
                self.gateway.start_conference(&self.settings.system_number),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.sessions.release_pending().await;
                record_conference("start_failed");
                error!(target: "cs.coordinator", error = %e, "Provider refused to start conference");
                let _ = self
                    .notify(
                        &self.settings.organizer,
                        &notifications::start_failure_text(),
                    )
                    .await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.sessions.activate(&conference_id).await {
            record_conference("start_failed");
            error!(
                target: "cs.coordinator",
                conference_id = %conference_id,
                error = %e,
                "Could not activate conference session"
            );
            let _ = self
                .notify(
                    &self.settings.organizer,
                    &notifications::start_failure_text(),
                )
                .await;
            return Err(e);
        }

        info!(
            target: "cs.coordinator",
            conference_id = %conference_id,
            participants = invited.len(),
            "Conference started"
        );

        let invite = notifications::invite_text(&self.settings.organizer, &self.settings.system_number);
        let invite = invite.as_str();
        let results = fan_out(
            invited.clone(),
            self.settings.fanout_concurrency,
            |to| async move { self.notify(&to, invite).await },
        )
        .await;

        let failed_invites: Vec<PhoneNumber> = invited
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_err())
            .map(|(number, _)| number.clone())
            .collect();
        for _ in &failed_invites {
            record_fanout_failure("invite");
        }

        let _ = self
            .notify(
                &self.settings.organizer,
                &notifications::start_confirmation_text(&invited),
            )
            .await;

        record_conference("started");

        Ok(StartReport {
            conference_id,
            invited,
            failed_invites,
        })
    }

    /// End the active conference and notify everyone who joined.
    ///
    /// Provider failures after the session is taken are logged and skipped;
    /// the session is gone either way.
    ///
    /// # Errors
    ///
    /// `NotOrganizer` or `NoActiveSession`; nothing is sent in either case.
    #[instrument(skip_all, name = "cs.coordinator.end")]
    pub async fn handle_organizer_end(
        &self,
        organizer: &str,
        closing_text: &str,
    ) -> Result<EndReport, CoordinatorError> {
        self.ensure_organizer(organizer)?;

        let session = self.sessions.take_active().await?;
        let conference_id = session.id.ok_or(CoordinatorError::NoActiveSession)?;
        record_conference("ended");

        info!(target: "cs.coordinator", conference_id = %conference_id, "Ending conference");

        if let Err(e) = self
            .call(
                operation::END_CONFERENCE,
                self.gateway.end_conference(&conference_id),
            )
            .await
        {
            warn!(
                target: "cs.coordinator",
                conference_id = %conference_id,
                error = %e,
                "Failed to complete conference at provider"
            );
        }

        let members = match self
            .call(
                operation::LIST_CONFERENCE_MEMBERS,
                self.gateway.list_conference_members(&conference_id),
            )
            .await
        {
            Ok(members) => members,
            Err(e) => {
                warn!(
                    target: "cs.coordinator",
                    conference_id = %conference_id,
                    error = %e,
                    "Failed to list conference members"
                );
                Vec::new()
            }
        };

        let resolved = fan_out(
            members.clone(),
            self.settings.fanout_concurrency,
            |member| async move {
                let leg = self
                    .call(
                        operation::GET_CALL_INFO,
                        self.gateway.get_call_info(&member.call_ref),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                leg.participant().map_err(|e| e.to_string())
            },
        )
        .await;

        let mut participants: Vec<PhoneNumber> = Vec::with_capacity(resolved.len());
        let mut unresolved_members = 0;
        for (member, result) in members.iter().zip(resolved) {
            match result {
                Ok(number) => {
                    if !participants.contains(&number) {
                        participants.push(number);
                    }
                }
                Err(e) => {
                    unresolved_members += 1;
                    record_fanout_failure("resolve");
                    warn!(
                        target: "cs.coordinator",
                        member_id = %member.member_id,
                        call_ref = %member.call_ref,
                        error = %e,
                        "Could not resolve conference member"
                    );
                }
            }
        }

        let closing = notifications::closing_text(closing_text);
        let closing = closing.as_str();
        let results = fan_out(
            participants.clone(),
            self.settings.fanout_concurrency,
            |to| async move { self.notify(&to, closing).await },
        )
        .await;

        let failed_notifications: Vec<PhoneNumber> = participants
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_err())
            .map(|(number, _)| number.clone())
            .collect();
        for _ in &failed_notifications {
            record_fanout_failure("closing");
        }

        let _ = self
            .notify(
                &self.settings.organizer,
                &notifications::roster_text(&participants),
            )
            .await;

        info!(
            target: "cs.coordinator",
            conference_id = %conference_id,
            participants = participants.len(),
            unresolved = unresolved_members,
            "Conference ended"
        );

        Ok(EndReport {
            conference_id,
            participants,
            failed_notifications,
            unresolved_members,
        })
    }

    /// Admit an inbound call into the active conference.
    ///
    /// Returns the conference the call was added to.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` if no conference is active, `Gateway` if the
    /// provider rejected the membership.
    #[instrument(skip_all, name = "cs.coordinator.voice", fields(call_id = %call_id))]
    pub async fn handle_voice_event(&self, call_id: &str) -> Result<String, CoordinatorError> {
        let conference_id = self
            .sessions
            .active_conference_id()
            .await
            .ok_or(CoordinatorError::NoActiveSession)?;

        self.call(
            operation::ADD_CALL_TO_CONFERENCE,
            self.gateway
                .add_call_to_conference(call_id, &conference_id),
        )
        .await?;

        debug!(
            target: "cs.coordinator",
            call_id = %call_id,
            conference_id = %conference_id,
            "Call added to conference"
        );
        Ok(conference_id)
    }

    /// Process one webhook event. Never fails; outcomes are logged.
    #[instrument(skip_all, name = "cs.coordinator.event", fields(kind = event.kind()))]
    pub async fn handle_event(&self, event: InboundEvent) {
        let result = match event {
            InboundEvent::Message { from, text } => {
                if let Err(e) = self.ensure_organizer(&from) {
                    debug!(target: "cs.coordinator", from = %from, "Ignoring message from non-organizer");
                    Err(e)
                } else {
                    let session_present = self.sessions.snapshot().await.is_some();
                    match classify_message(&text, session_present) {
                        MessageIntent::Start => {
                            self.handle_organizer_start(&from, &text).await.map(|_| ())
                        }
                        MessageIntent::Close => {
                            self.handle_organizer_end(&from, &text).await.map(|_| ())
                        }
                    }
                }
            }
            InboundEvent::Voice { call_id } => {
                self.handle_voice_event(&call_id).await.map(|_| ())
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_state_error() => {
                debug!(target: "cs.coordinator", reason = %e, "Event ignored");
            }
            Err(
                e @ (CoordinatorError::ParticipantCount { .. }
                | CoordinatorError::InvalidNumber(_)),
            ) => {
                info!(target: "cs.coordinator", reason = %e, "Start request rejected");
            }
            Err(e) => {
                warn!(target: "cs.coordinator", error = %e, "Event processing failed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::gateway::mock::{GatewayCall, MockGateway};

    const SYSTEM: &str = "+19195550000";
    const ORGANIZER: &str = "+19195550001";

    fn number(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    fn participants(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("+1919555{:04}", 1000 + i)).collect()
    }

    fn settings() -> CoordinatorSettings {
        CoordinatorSettings {
            system_number: number(SYSTEM),
            organizer: number(ORGANIZER),
            min_participants: 1,
            max_participants: 20,
            fanout_concurrency: 4,
            operation_timeout: Duration::from_secs(5),
        }
    }

    fn coordinator() -> (Arc<MockGateway>, Arc<Coordinator>) {
        let mock = Arc::new(MockGateway::new());
        let coordinator = Arc::new(Coordinator::new(mock.clone(), settings()));
        (mock, coordinator)
    }

    async fn started(
        mock: &MockGateway,
        coordinator: &Coordinator,
        numbers: &[String],
    ) -> StartReport {
        let report = coordinator
            .handle_organizer_start(ORGANIZER, &numbers.join(" "))
            .await
            .unwrap();
        assert_eq!(mock.count(operation::START_CONFERENCE), 1);
        report
    }

    #[tokio::test]
    async fn test_start_issues_one_conference_and_n_invites() {
        for n in [1, 2, 7, 20] {
            let (mock, coordinator) = coordinator();
            let numbers = participants(n);

            let report = started(&mock, &coordinator, &numbers).await;

            // n invites + 1 confirmation
            assert_eq!(mock.count(operation::SEND_TEXT), n + 1);
            for raw in &numbers {
                let texts = mock.texts_to(&number(raw));
                assert_eq!(
                    texts,
                    vec![notifications::invite_text(&number(ORGANIZER), &number(SYSTEM))]
                );
            }
            assert_eq!(report.invited.len(), n);
            assert!(report.failed_invites.is_empty());

            let session = coordinator.snapshot().await.unwrap();
            assert_eq!(session.state, SessionState::Active);
            assert_eq!(session.id.as_deref(), Some(report.conference_id.as_str()));
        }
    }

    #[tokio::test]
    async fn test_start_sends_confirmation_to_organizer() {
        let (mock, coordinator) = coordinator();
        let numbers = participants(2);

        let report = started(&mock, &coordinator, &numbers).await;

        assert_eq!(
            mock.texts_to(&number(ORGANIZER)),
            vec![notifications::start_confirmation_text(&report.invited)]
        );
        // Confirmation comes last
        assert!(matches!(
            mock.calls().last(),
            Some(GatewayCall::SendText { to, .. }) if *to == number(ORGANIZER)
        ));
    }

    #[tokio::test]
    async fn test_too_many_numbers_sends_single_error_and_no_start() {
        let (mock, coordinator) = coordinator();
        let numbers = participants(21);

        let result = coordinator
            .handle_organizer_start(ORGANIZER, &numbers.join(" "))
            .await;

        assert!(matches!(
            result,
            Err(CoordinatorError::ParticipantCount {
                count: 21,
                min: 1,
                max: 20
            })
        ));
        assert_eq!(mock.count(operation::START_CONFERENCE), 0);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(
            mock.texts_to(&number(ORGANIZER)),
            vec![notifications::participant_count_error_text(21, 1, 20)]
        );
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_blank_start_is_a_count_error() {
        let (mock, coordinator) = coordinator();

        let result = coordinator.handle_organizer_start(ORGANIZER, "   ").await;

        assert!(matches!(
            result,
            Err(CoordinatorError::ParticipantCount { count: 0, .. })
        ));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_number_sends_single_error() {
        let (mock, coordinator) = coordinator();

        let result = coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000 919-555-1001")
            .await;

        assert!(matches!(result, Err(CoordinatorError::InvalidNumber(_))));
        assert_eq!(mock.count(operation::START_CONFERENCE), 0);
        assert_eq!(
            mock.texts_to(&number(ORGANIZER)),
            vec![notifications::invalid_number_text("919-555-1001")]
        );
    }

    #[tokio::test]
    async fn test_start_from_non_organizer_is_ignored() {
        let (mock, coordinator) = coordinator();

        let result = coordinator
            .handle_organizer_start("+19195559999", "+19195551000")
            .await;

        assert!(matches!(result, Err(CoordinatorError::NotOrganizer(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_start_while_active_is_noop() {
        let (mock, coordinator) = coordinator();
        started(&mock, &coordinator, &participants(2)).await;
        let before = mock.call_count();

        let result = coordinator
            .handle_organizer_start(ORGANIZER, "+19195552000")
            .await;

        assert!(matches!(result, Err(CoordinatorError::SessionInProgress)));
        assert_eq!(mock.call_count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_starts_create_one_session() {
        let (mock, coordinator) = coordinator();
        mock.delay_operation(operation::START_CONFERENCE, Duration::from_millis(100));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .handle_organizer_start(ORGANIZER, "+19195551000")
                    .await
            })
        };
        let second = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .handle_organizer_start(ORGANIZER, "+19195551001")
                    .await
            })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CoordinatorError::SessionInProgress))));
        assert_eq!(mock.count(operation::START_CONFERENCE), 1);
    }

    #[tokio::test]
    async fn test_start_failure_releases_reservation() {
        let (mock, coordinator) = coordinator();
        mock.fail_operation(operation::START_CONFERENCE);

        let result = coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await;

        assert!(matches!(result, Err(CoordinatorError::Gateway(_))));
        assert!(coordinator.snapshot().await.is_none());
        assert_eq!(
            mock.texts_to(&number(ORGANIZER)),
            vec![notifications::start_failure_text()]
        );
        assert!(mock.texts_to(&number("+19195551000")).is_empty());

        // Provider recovers; the organizer can try again
        mock.restore_operation(operation::START_CONFERENCE);
        coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_start_times_out_and_releases() {
        let (mock, coordinator) = coordinator();
        mock.delay_operation(operation::START_CONFERENCE, Duration::from_secs(60));

        let result = coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await;

        assert!(matches!(
            result,
            Err(CoordinatorError::Gateway(GatewayError::Timeout(_)))
        ));
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_invite_does_not_stop_others() {
        let (mock, coordinator) = coordinator();
        let numbers = participants(3);
        let unreachable = number(&numbers[1]);
        mock.fail_texts_to(&unreachable);

        let report = started(&mock, &coordinator, &numbers).await;

        assert_eq!(report.failed_invites, vec![unreachable]);
        assert_eq!(mock.texts_to(&number(&numbers[0])).len(), 1);
        assert_eq!(mock.texts_to(&number(&numbers[2])).len(), 1);
        assert_eq!(
            coordinator.snapshot().await.unwrap().state,
            SessionState::Active
        );
    }

    #[tokio::test]
    async fn test_end_notifies_participants_and_sends_roster() {
        let (mock, coordinator) = coordinator();
        let report = started(&mock, &coordinator, &participants(2)).await;

        let system = number(SYSTEM);
        let alice = number("+19195553001");
        let bob = number("+19195553002");
        for caller in [&alice, &bob] {
            let call_id = mock.register_inbound_call(caller, &system);
            coordinator.handle_voice_event(&call_id).await.unwrap();
        }

        let end = coordinator
            .handle_organizer_end(ORGANIZER, "Thanks everyone")
            .await
            .unwrap();

        assert_eq!(end.conference_id, report.conference_id);
        assert_eq!(end.participants, vec![alice.clone(), bob.clone()]);
        assert_eq!(end.unresolved_members, 0);
        assert_eq!(mock.texts_to(&alice), vec!["Thanks everyone".to_string()]);
        assert_eq!(mock.texts_to(&bob), vec!["Thanks everyone".to_string()]);
        assert_eq!(
            mock.texts_to(&number(ORGANIZER)).last().unwrap(),
            &notifications::roster_text(&[alice, bob])
        );
        assert!(mock.calls().contains(&GatewayCall::EndConference {
            conference_id: report.conference_id.clone()
        }));
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_end_resolves_outbound_legs_by_destination() {
        let (mock, coordinator) = coordinator();
        let report = started(&mock, &coordinator, &participants(1)).await;

        let dialed = number("+19195554000");
        let call_id = mock
            .create_call(&number(SYSTEM), &dialed, Some(&report.conference_id))
            .await
            .unwrap();
        coordinator.handle_voice_event(&call_id).await.unwrap();

        let end = coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        assert_eq!(end.participants, vec![dialed]);
    }

    #[tokio::test]
    async fn test_end_collapses_duplicate_participants() {
        let (mock, coordinator) = coordinator();
        started(&mock, &coordinator, &participants(1)).await;

        let system = number(SYSTEM);
        let caller = number("+19195553001");
        for _ in 0..2 {
            let call_id = mock.register_inbound_call(&caller, &system);
            coordinator.handle_voice_event(&call_id).await.unwrap();
        }

        let end = coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        assert_eq!(end.participants, vec![caller.clone()]);
        assert_eq!(mock.texts_to(&caller).len(), 1);
    }

    #[tokio::test]
    async fn test_end_with_empty_conference_sends_roster_none() {
        let (mock, coordinator) = coordinator();
        started(&mock, &coordinator, &participants(1)).await;

        let end = coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        assert!(end.participants.is_empty());
        assert_eq!(
            mock.texts_to(&number(ORGANIZER)).last().unwrap(),
            "Conference attendees: none"
        );
    }

    #[tokio::test]
    async fn test_end_skips_unresolvable_members() {
        let (mock, coordinator) = coordinator();
        started(&mock, &coordinator, &participants(1)).await;

        let caller = number("+19195553001");
        let known = mock.register_inbound_call(&caller, &number(SYSTEM));
        coordinator.handle_voice_event(&known).await.unwrap();
        // Provider no longer knows this leg
        coordinator.handle_voice_event("call-gone").await.unwrap();

        let end = coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        assert_eq!(end.participants, vec![caller]);
        assert_eq!(end.unresolved_members, 1);
    }

    #[tokio::test]
    async fn test_end_continues_when_provider_end_fails() {
        let (mock, coordinator) = coordinator();
        started(&mock, &coordinator, &participants(1)).await;
        let caller = number("+19195553001");
        let call_id = mock.register_inbound_call(&caller, &number(SYSTEM));
        coordinator.handle_voice_event(&call_id).await.unwrap();
        mock.fail_operation(operation::END_CONFERENCE);

        let end = coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        assert_eq!(end.participants, vec![caller.clone()]);
        assert_eq!(mock.texts_to(&caller), vec!["bye".to_string()]);
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_end_without_session_makes_no_calls() {
        let (mock, coordinator) = coordinator();

        let result = coordinator.handle_organizer_end(ORGANIZER, "bye").await;

        assert!(matches!(result, Err(CoordinatorError::NoActiveSession)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_end_from_non_organizer_is_ignored() {
        let (mock, coordinator) = coordinator();
        started(&mock, &coordinator, &participants(1)).await;
        let before = mock.call_count();

        let result = coordinator
            .handle_organizer_end("+19195559999", "bye")
            .await;

        assert!(matches!(result, Err(CoordinatorError::NotOrganizer(_))));
        assert_eq!(mock.call_count(), before);
        assert!(coordinator.snapshot().await.is_some());
    }

    #[tokio::test]
    async fn test_new_session_after_end_gets_new_id() {
        let (mock, coordinator) = coordinator();
        let first = coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await
            .unwrap();
        coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        let second = coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await
            .unwrap();

        assert_ne!(first.conference_id, second.conference_id);
        assert_eq!(mock.count(operation::START_CONFERENCE), 2);
    }

    #[tokio::test]
    async fn test_provider_reusing_ended_id_is_rejected() {
        let (mock, coordinator) = coordinator();
        mock.script_conference_ids(["conf-same", "conf-same"]);

        coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await
            .unwrap();
        coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        let result = coordinator
            .handle_organizer_start(ORGANIZER, "+19195551000")
            .await;

        assert!(matches!(
            result,
            Err(CoordinatorError::ConferenceIdReused(id)) if id == "conf-same"
        ));
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_voice_events_use_current_id() {
        let (mock, coordinator) = coordinator();
        let report = started(&mock, &coordinator, &participants(1)).await;

        let mut handles = Vec::new();
        for i in 0..5 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.handle_voice_event(&format!("call-in-{i}")).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), report.conference_id);
        }

        let adds: Vec<GatewayCall> = mock
            .calls()
            .into_iter()
            .filter(|c| c.operation() == operation::ADD_CALL_TO_CONFERENCE)
            .collect();
        assert_eq!(adds.len(), 5);
        assert!(adds.iter().all(|c| matches!(
            c,
            GatewayCall::AddCallToConference { conference_id, .. }
                if *conference_id == report.conference_id
        )));

        coordinator
            .handle_organizer_end(ORGANIZER, "bye")
            .await
            .unwrap();

        for i in 0..5 {
            let result = coordinator
                .handle_voice_event(&format!("call-late-{i}"))
                .await;
            assert!(matches!(result, Err(CoordinatorError::NoActiveSession)));
        }
        assert_eq!(mock.count(operation::ADD_CALL_TO_CONFERENCE), 5);
    }

    #[tokio::test]
    async fn test_voice_without_session_is_dropped() {
        let (mock, coordinator) = coordinator();

        let result = coordinator.handle_voice_event("call-1").await;

        assert!(matches!(result, Err(CoordinatorError::NoActiveSession)));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(classify_message("+19195551000", false), MessageIntent::Start);
        assert_eq!(classify_message("  919-555-1000 x", false), MessageIntent::Start);
        assert_eq!(classify_message("+1919 oops", false), MessageIntent::Start);
        assert_eq!(classify_message("Thanks all", false), MessageIntent::Close);
        assert_eq!(classify_message("", false), MessageIntent::Close);

        assert_eq!(classify_message("+19195551000 +19195551001", true), MessageIntent::Start);
        assert_eq!(classify_message("Thanks all", true), MessageIntent::Close);
        assert_eq!(classify_message("+19195551000 thanks", true), MessageIntent::Close);
        assert_eq!(classify_message("   ", true), MessageIntent::Close);
    }

    #[tokio::test]
    async fn test_handle_event_drives_full_lifecycle() {
        let (mock, coordinator) = coordinator();
        let invitee = number("+19195551000");

        coordinator
            .handle_event(InboundEvent::Message {
                from: ORGANIZER.to_string(),
                text: invitee.to_string(),
            })
            .await;
        let conference_id = coordinator.snapshot().await.unwrap().id.unwrap();

        let call_id = mock.register_inbound_call(&invitee, &number(SYSTEM));
        coordinator
            .handle_event(InboundEvent::Voice { call_id })
            .await;
        assert_eq!(mock.members_of(&conference_id).len(), 1);

        // Numbers-only text while active is a refused start, not an end
        coordinator
            .handle_event(InboundEvent::Message {
                from: ORGANIZER.to_string(),
                text: "+19195552000".to_string(),
            })
            .await;
        assert!(coordinator.snapshot().await.is_some());

        coordinator
            .handle_event(InboundEvent::Message {
                from: ORGANIZER.to_string(),
                text: "That's a wrap".to_string(),
            })
            .await;

        assert!(coordinator.snapshot().await.is_none());
        assert_eq!(mock.texts_to(&invitee).last().unwrap(), "That's a wrap");
    }

    #[tokio::test]
    async fn test_redelivered_closing_text_is_silent() {
        let (mock, coordinator) = coordinator();
        let organizer_message = |text: &str| InboundEvent::Message {
            from: ORGANIZER.to_string(),
            text: text.to_string(),
        };

        coordinator
            .handle_event(organizer_message("+19195551000"))
            .await;
        coordinator
            .handle_event(organizer_message("Thanks all"))
            .await;
        assert!(coordinator.snapshot().await.is_none());
        let before = mock.call_count();

        coordinator
            .handle_event(organizer_message("Thanks all"))
            .await;

        assert_eq!(mock.call_count(), before);
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_mistyped_list_without_session_gets_error_text() {
        let (mock, coordinator) = coordinator();

        coordinator
            .handle_event(InboundEvent::Message {
                from: ORGANIZER.to_string(),
                text: "919-555-1000".to_string(),
            })
            .await;

        assert_eq!(
            mock.texts_to(&number(ORGANIZER)),
            vec![notifications::invalid_number_text("919-555-1000")]
        );
    }

    #[tokio::test]
    async fn test_handle_event_completes_on_spawned_task() {
        let (mock, coordinator) = coordinator();
        let invitee = number("+19195551000");

        let start = {
            let coordinator = Arc::clone(&coordinator);
            let text = invitee.to_string();
            tokio::spawn(async move {
                coordinator
                    .handle_event(InboundEvent::Message {
                        from: ORGANIZER.to_string(),
                        text,
                    })
                    .await;
            })
        };
        start.await.unwrap();
        assert_eq!(mock.texts_to(&invitee).len(), 1);

        let end = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .handle_event(InboundEvent::Message {
                        from: ORGANIZER.to_string(),
                        text: "bye".to_string(),
                    })
                    .await;
            })
        };
        end.await.unwrap();
        assert!(coordinator.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_handle_event_ignores_strangers() {
        let (mock, coordinator) = coordinator();

        coordinator
            .handle_event(InboundEvent::Message {
                from: "+19195559999".to_string(),
                text: "+19195551000".to_string(),
            })
            .await;

        assert_eq!(mock.call_count(), 0);
    }
}
