//! The single conference session slot.
//!
//! Every transition happens under one lock and no provider I/O ever runs
//! while it is held: callers reserve or take the session, release the lock,
//! and then talk to the provider.

use crate::errors::CoordinatorError;
use chrono::{DateTime, Utc};
use common::types::PhoneNumber;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Start accepted, provider call in flight, no id yet.
    Pending,
    /// Conference exists at the provider; inbound calls are admitted.
    Active,
    /// Closed. Never stored; only seen on sessions taken out of the store.
    Ended,
}

/// The organizer's conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConferenceSession {
    /// Provider conference id; `None` while pending.
    pub id: Option<String>,
    pub organizer: PhoneNumber,
    pub state: SessionState,
    /// Participants named in the start message, in message order.
    pub invited: Vec<PhoneNumber>,
    pub created_at: DateTime<Utc>,
}

/// How many ended conference ids are remembered for reuse detection.
const ENDED_ID_HISTORY: usize = 64;

#[derive(Debug, Default)]
struct Slot {
    current: Option<ConferenceSession>,
    /// Most recently ended ids, oldest first, at most `ENDED_ID_HISTORY`.
    ended_ids: VecDeque<String>,
}

impl Slot {
    fn remember_ended(&mut self, id: &str) {
        if self.ended_ids.len() >= ENDED_ID_HISTORY {
            self.ended_ids.pop_front();
        }
        self.ended_ids.push_back(id.to_string());
    }

    fn was_ended(&self, id: &str) -> bool {
        self.ended_ids.iter().any(|ended| ended == id)
    }
}

/// Lock-guarded holder of the at-most-one live session.
#[derive(Debug, Default)]
pub struct SessionStore {
    slot: Mutex<Slot>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot with a pending session.
    ///
    /// # Errors
    ///
    /// `SessionInProgress` if a pending or active session exists.
    pub async fn try_reserve(
        &self,
        organizer: &PhoneNumber,
        invited: &[PhoneNumber],
    ) -> Result<(), CoordinatorError> {
        let mut slot = self.slot.lock().await;
        if slot.current.is_some() {
            return Err(CoordinatorError::SessionInProgress);
        }

        slot.current = Some(ConferenceSession {
            id: None,
            organizer: organizer.clone(),
            state: SessionState::Pending,
            invited: invited.to_vec(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Move the pending session to active under `id`.
    ///
    /// # Errors
    ///
    /// `ConferenceIdReused` if `id` belonged to one of the last
    /// `ENDED_ID_HISTORY` ended sessions (the slot is released),
    /// `NoActiveSession` if nothing is pending.
    pub async fn activate(&self, id: &str) -> Result<ConferenceSession, CoordinatorError> {
        let mut slot = self.slot.lock().await;

        if slot.was_ended(id) {
            slot.current = None;
            return Err(CoordinatorError::ConferenceIdReused(id.to_string()));
        }

        match slot.current.as_mut() {
            Some(session) if session.state == SessionState::Pending => {
                session.id = Some(id.to_string());
                session.state = SessionState::Active;
                Ok(session.clone())
            }
            _ => Err(CoordinatorError::NoActiveSession),
        }
    }

    /// Drop a pending reservation after the provider refused to start.
    pub async fn release_pending(&self) {
        let mut slot = self.slot.lock().await;
        if matches!(&slot.current, Some(s) if s.state == SessionState::Pending) {
            slot.current = None;
        }
    }

    /// Id of the active conference, read at the moment of the call.
    pub async fn active_conference_id(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.current
            .as_ref()
            .filter(|s| s.state == SessionState::Active)
            .and_then(|s| s.id.clone())
    }

    /// Remove the active session and mark it ended.
    ///
    /// After this returns, voice events are no longer admitted and a new
    /// start may proceed.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` if the slot is empty or still pending.
    pub async fn take_active(&self) -> Result<ConferenceSession, CoordinatorError> {
        let mut slot = self.slot.lock().await;

        let is_active = matches!(&slot.current, Some(s) if s.state == SessionState::Active);
        if !is_active {
            return Err(CoordinatorError::NoActiveSession);
        }

        let mut session = slot.current.take().ok_or(CoordinatorError::NoActiveSession)?;
        session.state = SessionState::Ended;
        if let Some(id) = &session.id {
            slot.remember_ended(id);
        }
        Ok(session)
    }

    /// Copy of the current session, if any.
    pub async fn snapshot(&self) -> Option<ConferenceSession> {
        self.slot.lock().await.current.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn organizer() -> PhoneNumber {
        PhoneNumber::parse("+19195550001").unwrap()
    }

    fn invited() -> Vec<PhoneNumber> {
        vec![PhoneNumber::parse("+19195551111").unwrap()]
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = SessionStore::new();
        assert!(store.snapshot().await.is_none());

        store.try_reserve(&organizer(), &invited()).await.unwrap();
        let pending = store.snapshot().await.unwrap();
        assert_eq!(pending.state, SessionState::Pending);
        assert!(pending.id.is_none());
        assert!(store.active_conference_id().await.is_none());

        let active = store.activate("conf-1").await.unwrap();
        assert_eq!(active.state, SessionState::Active);
        assert_eq!(active.invited, invited());
        assert_eq!(store.active_conference_id().await.as_deref(), Some("conf-1"));

        let ended = store.take_active().await.unwrap();
        assert_eq!(ended.state, SessionState::Ended);
        assert_eq!(ended.id.as_deref(), Some("conf-1"));
        assert!(store.snapshot().await.is_none());
        assert!(store.active_conference_id().await.is_none());
    }

    #[tokio::test]
    async fn test_only_one_reservation_wins() {
        let store = Arc::new(SessionStore::new());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.try_reserve(&organizer(), &invited()).await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_reserve_rejected_while_active() {
        let store = SessionStore::new();
        store.try_reserve(&organizer(), &invited()).await.unwrap();
        store.activate("conf-1").await.unwrap();

        assert!(matches!(
            store.try_reserve(&organizer(), &invited()).await,
            Err(CoordinatorError::SessionInProgress)
        ));
    }

    #[tokio::test]
    async fn test_release_pending_frees_slot() {
        let store = SessionStore::new();
        store.try_reserve(&organizer(), &invited()).await.unwrap();
        store.release_pending().await;

        assert!(store.snapshot().await.is_none());
        store.try_reserve(&organizer(), &invited()).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_pending_keeps_active_session() {
        let store = SessionStore::new();
        store.try_reserve(&organizer(), &invited()).await.unwrap();
        store.activate("conf-1").await.unwrap();
        store.release_pending().await;

        assert_eq!(store.active_conference_id().await.as_deref(), Some("conf-1"));
    }

    #[tokio::test]
    async fn test_take_requires_active_session() {
        let store = SessionStore::new();
        assert!(matches!(
            store.take_active().await,
            Err(CoordinatorError::NoActiveSession)
        ));

        store.try_reserve(&organizer(), &invited()).await.unwrap();
        assert!(matches!(
            store.take_active().await,
            Err(CoordinatorError::NoActiveSession)
        ));
        // Still pending, untouched
        assert!(store.snapshot().await.is_some());
    }

    #[tokio::test]
    async fn test_ended_id_cannot_be_reactivated() {
        let store = SessionStore::new();
        store.try_reserve(&organizer(), &invited()).await.unwrap();
        store.activate("conf-1").await.unwrap();
        store.take_active().await.unwrap();

        store.try_reserve(&organizer(), &invited()).await.unwrap();
        assert!(matches!(
            store.activate("conf-1").await,
            Err(CoordinatorError::ConferenceIdReused(id)) if id == "conf-1"
        ));
        assert!(store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_ended_id_history_is_bounded() {
        let store = SessionStore::new();
        for i in 0..=ENDED_ID_HISTORY {
            store.try_reserve(&organizer(), &invited()).await.unwrap();
            store.activate(&format!("conf-{i}")).await.unwrap();
            store.take_active().await.unwrap();
        }

        assert_eq!(store.slot.lock().await.ended_ids.len(), ENDED_ID_HISTORY);

        // The oldest id has aged out; the newest is still refused
        store.try_reserve(&organizer(), &invited()).await.unwrap();
        store.activate("conf-0").await.unwrap();
        store.take_active().await.unwrap();

        store.try_reserve(&organizer(), &invited()).await.unwrap();
        let newest = format!("conf-{ENDED_ID_HISTORY}");
        assert!(matches!(
            store.activate(&newest).await,
            Err(CoordinatorError::ConferenceIdReused(id)) if id == newest
        ));
    }
}
