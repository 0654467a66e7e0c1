//! Recording in-memory gateway.
//!
//! Hands out sequential ids, remembers every call it receives, and keeps a
//! tiny model of the provider (conference members, call legs) so that an end
//! of conference can be resolved back to participant numbers. Failures and
//! latency can be injected per operation.

use super::{operation, CallLeg, ConferenceMember, TelephonyGateway};
use crate::errors::GatewayError;
use common::types::{CallDirection, PhoneNumber};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    StartConference {
        from: PhoneNumber,
    },
    EndConference {
        conference_id: String,
    },
    AddCallToConference {
        call_id: String,
        conference_id: String,
    },
    SendText {
        from: PhoneNumber,
        to: PhoneNumber,
        text: String,
    },
    ListConferenceMembers {
        conference_id: String,
    },
    GetCallInfo {
        call_ref: String,
    },
    CreateCall {
        from: PhoneNumber,
        to: PhoneNumber,
        conference_id: Option<String>,
    },
}

impl GatewayCall {
    /// Operation name, matching [`operation`].
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            GatewayCall::StartConference { .. } => operation::START_CONFERENCE,
            GatewayCall::EndConference { .. } => operation::END_CONFERENCE,
            GatewayCall::AddCallToConference { .. } => operation::ADD_CALL_TO_CONFERENCE,
            GatewayCall::SendText { .. } => operation::SEND_TEXT,
            GatewayCall::ListConferenceMembers { .. } => operation::LIST_CONFERENCE_MEMBERS,
            GatewayCall::GetCallInfo { .. } => operation::GET_CALL_INFO,
            GatewayCall::CreateCall { .. } => operation::CREATE_CALL,
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<GatewayCall>,
    members: HashMap<String, Vec<ConferenceMember>>,
    legs: HashMap<String, CallLeg>,
    scripted_conference_ids: VecDeque<String>,
    failing_operations: HashSet<&'static str>,
    failing_recipients: HashSet<PhoneNumber>,
    delays: HashMap<&'static str, Duration>,
}

/// Mock telephony gateway for unit and integration tests.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
    next_conference: AtomicUsize,
    next_call: AtomicUsize,
    next_member: AtomicUsize,
}

impl MockGateway {
    /// Create a mock where every operation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from others.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call of `operation` fail with a 500.
    pub fn fail_operation(&self, operation: &'static str) {
        self.state().failing_operations.insert(operation);
    }

    /// Stop failing `operation`.
    pub fn restore_operation(&self, operation: &'static str) {
        self.state().failing_operations.remove(operation);
    }

    /// Make texts addressed to `number` fail with a 500.
    pub fn fail_texts_to(&self, number: &PhoneNumber) {
        self.state().failing_recipients.insert(number.clone());
    }

    /// Delay every call of `operation` by `delay` before it completes.
    pub fn delay_operation(&self, operation: &'static str, delay: Duration) {
        self.state().delays.insert(operation, delay);
    }

    /// Ids to hand out from `start_conference` before falling back to
    /// generated ones.
    pub fn script_conference_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .scripted_conference_ids
            .extend(ids.into_iter().map(Into::into));
    }

    /// Make `get_call_info` know about a call the mock did not create,
    /// e.g. an inbound call delivered by a voice webhook.
    pub fn register_call_leg(&self, leg: CallLeg) {
        self.state().legs.insert(leg.call_id.clone(), leg);
    }

    /// Register an inbound call from `caller` to `system` and return its id.
    pub fn register_inbound_call(&self, caller: &PhoneNumber, system: &PhoneNumber) -> String {
        let call_id = self.next_call_id();
        self.register_call_leg(CallLeg {
            call_id: call_id.clone(),
            direction: CallDirection::Inbound,
            from: caller.to_string(),
            to: system.to_string(),
        });
        call_id
    }

    /// All recorded calls in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Bodies of all texts sent to `number`, in order.
    #[must_use]
    pub fn texts_to(&self, number: &PhoneNumber) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::SendText { to, text, .. } if to == number => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// All `(recipient, text)` pairs in send order.
    #[must_use]
    pub fn sent_texts(&self) -> Vec<(PhoneNumber, String)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::SendText { to, text, .. } => Some((to.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Current members of a conference.
    #[must_use]
    pub fn members_of(&self, conference_id: &str) -> Vec<ConferenceMember> {
        self.state()
            .members
            .get(conference_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of calls recorded.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    fn next_call_id(&self) -> String {
        format!("call-{}", self.next_call.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Record the call, then apply injected latency and failure.
    async fn enter(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let operation = call.operation();
        let (delay, fail) = {
            let mut state = self.state();
            let fail = state.failing_operations.contains(operation)
                || matches!(&call, GatewayCall::SendText { to, .. } if state.failing_recipients.contains(to));
            state.calls.push(call);
            (state.delays.get(operation).copied(), fail)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(GatewayError::Status {
                operation,
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TelephonyGateway for MockGateway {
    async fn start_conference(&self, from: &PhoneNumber) -> Result<String, GatewayError> {
        self.enter(GatewayCall::StartConference { from: from.clone() })
            .await?;

        let scripted = self.state().scripted_conference_ids.pop_front();
        Ok(scripted.unwrap_or_else(|| {
            format!(
                "conf-{}",
                self.next_conference.fetch_add(1, Ordering::SeqCst) + 1
            )
        }))
    }

    async fn end_conference(&self, conference_id: &str) -> Result<(), GatewayError> {
        self.enter(GatewayCall::EndConference {
            conference_id: conference_id.to_string(),
        })
        .await
    }

    async fn add_call_to_conference(
        &self,
        call_id: &str,
        conference_id: &str,
    ) -> Result<(), GatewayError> {
        self.enter(GatewayCall::AddCallToConference {
            call_id: call_id.to_string(),
            conference_id: conference_id.to_string(),
        })
        .await?;

        let member_id = format!(
            "member-{}",
            self.next_member.fetch_add(1, Ordering::SeqCst) + 1
        );
        self.state()
            .members
            .entry(conference_id.to_string())
            .or_default()
            .push(ConferenceMember {
                member_id,
                call_ref: call_id.to_string(),
            });
        Ok(())
    }

    async fn send_text(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<(), GatewayError> {
        self.enter(GatewayCall::SendText {
            from: from.clone(),
            to: to.clone(),
            text: text.to_string(),
        })
        .await
    }

    async fn list_conference_members(
        &self,
        conference_id: &str,
    ) -> Result<Vec<ConferenceMember>, GatewayError> {
        self.enter(GatewayCall::ListConferenceMembers {
            conference_id: conference_id.to_string(),
        })
        .await?;
        Ok(self.members_of(conference_id))
    }

    async fn get_call_info(&self, call_ref: &str) -> Result<CallLeg, GatewayError> {
        self.enter(GatewayCall::GetCallInfo {
            call_ref: call_ref.to_string(),
        })
        .await?;

        self.state()
            .legs
            .get(call_ref)
            .cloned()
            .ok_or(GatewayError::Status {
                operation: operation::GET_CALL_INFO,
                status: 404,
            })
    }

    async fn create_call(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        conference_id: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.enter(GatewayCall::CreateCall {
            from: from.clone(),
            to: to.clone(),
            conference_id: conference_id.map(str::to_string),
        })
        .await?;

        let call_id = self.next_call_id();
        self.register_call_leg(CallLeg {
            call_id: call_id.clone(),
            direction: CallDirection::Outbound,
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(call_id)
    }
}
