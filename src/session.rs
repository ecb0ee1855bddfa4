use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    error::GenerationError,
    models::{EmailSequence, SessionSnapshot, SessionStatus},
};

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationState {
    Idle,
    Requesting,
    Succeeded(EmailSequence),
    /// Carries the failure banner shown to the user.
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("a sequence is already being generated")]
pub struct Busy;

struct Inner {
    state: GenerationState,
    updated_at: DateTime<Utc>,
}

impl Inner {
    fn transition(&mut self, next: GenerationState) {
        debug!(from = ?status_of(&self.state), to = ?status_of(&next), "session transition");
        self.state = next;
        self.updated_at = Utc::now();
    }
}

/// Single generation slot: at most one request in flight, plus the latest outcome.
pub struct Session {
    inner: Mutex<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Self { inner: Mutex::new(Inner { state: GenerationState::Idle, updated_at: Utc::now() }) }
    }
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The only way to dispatch a generation. A finished outcome is cleared
    /// back to `Idle` before moving to `Requesting`.
    pub fn try_begin(self: &Arc<Self>) -> Result<Ticket, Busy> {
        let mut inner = self.inner.lock();
        match inner.state {
            GenerationState::Requesting => return Err(Busy),
            GenerationState::Succeeded(_) | GenerationState::Failed(_) => {
                inner.transition(GenerationState::Idle);
            }
            GenerationState::Idle => {}
        }
        inner.transition(GenerationState::Requesting);
        Ok(Ticket { session: Arc::clone(self), finished: false })
    }

    pub fn state(&self) -> GenerationState {
        self.inner.lock().state.clone()
    }

    pub fn is_requesting(&self) -> bool {
        matches!(self.inner.lock().state, GenerationState::Requesting)
    }

    pub fn last_sequence(&self) -> Option<EmailSequence> {
        match &self.inner.lock().state {
            GenerationState::Succeeded(seq) => Some(seq.clone()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let (sequence, error) = match &inner.state {
            GenerationState::Succeeded(seq) => (Some(seq.clone()), None),
            GenerationState::Failed(banner) => (None, Some(banner.clone())),
            _ => (None, None),
        };
        SessionSnapshot { status: status_of(&inner.state), sequence, error, updated_at: inner.updated_at }
    }
}

fn status_of(state: &GenerationState) -> SessionStatus {
    match state {
        GenerationState::Idle => SessionStatus::Idle,
        GenerationState::Requesting => SessionStatus::Requesting,
        GenerationState::Succeeded(_) => SessionStatus::Succeeded,
        GenerationState::Failed(_) => SessionStatus::Failed,
    }
}

/// Proof that the holder owns the in-flight slot. Dropping it unfinished
/// (the generation task panicked) frees the slot without recording an outcome.
pub struct Ticket {
    session: Arc<Session>,
    finished: bool,
}

impl Ticket {
    /// Records the outcome and hands the result back to the caller.
    pub fn finish(
        mut self,
        result: Result<EmailSequence, GenerationError>,
    ) -> Result<EmailSequence, GenerationError> {
        let next = match &result {
            Ok(seq) => GenerationState::Succeeded(seq.clone()),
            Err(e) => GenerationState::Failed(e.banner()),
        };
        self.session.inner.lock().transition(next);
        self.finished = true;
        result
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.finished {
            warn!("🛑 Generation ended without an outcome, releasing session");
            self.session.inner.lock().transition(GenerationState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailMessage;

    fn sequence() -> EmailSequence {
        let e = |s: &str| EmailMessage { subject: s.into(), delay: "Send immediately".into(), body: "b".into() };
        EmailSequence { email_1: e("1"), email_2: e("2"), email_3: e("3") }
    }

    #[test]
    fn second_dispatch_while_requesting_is_busy() {
        let session = Session::new();
        let ticket = session.try_begin().unwrap();
        assert!(session.is_requesting());
        assert_eq!(session.try_begin().err(), Some(Busy));
        ticket.finish(Ok(sequence())).unwrap();
        assert!(session.try_begin().is_ok());
    }

    #[test]
    fn success_is_recorded_then_cleared_by_next_dispatch() {
        let session = Session::new();
        session.try_begin().unwrap().finish(Ok(sequence())).unwrap();
        assert_eq!(session.state(), GenerationState::Succeeded(sequence()));
        assert_eq!(session.last_sequence(), Some(sequence()));

        let _ticket = session.try_begin().unwrap();
        assert_eq!(session.state(), GenerationState::Requesting);
        assert!(session.last_sequence().is_none());
    }

    #[test]
    fn failure_stores_banner() {
        let session = Session::new();
        let err = session.try_begin().unwrap().finish(Err(GenerationError::EmptyResponse)).unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));

        let snap = session.snapshot();
        assert!(matches!(snap.status, SessionStatus::Failed));
        assert_eq!(
            snap.error.as_deref(),
            Some("--- AN ERROR OCCURRED ---\nFailed to generate email sequence. Received an empty response from the API.")
        );
        assert!(snap.sequence.is_none());
    }

    #[test]
    fn dropped_ticket_returns_to_idle() {
        let session = Session::new();
        {
            let _ticket = session.try_begin().unwrap();
            assert!(session.is_requesting());
        }
        assert_eq!(session.state(), GenerationState::Idle);
        assert!(session.try_begin().is_ok());
    }

    #[tokio::test]
    async fn panicking_generation_releases_the_slot() {
        let session = Session::new();
        let ticket = session.try_begin().unwrap();
        let task = tokio::spawn(async move {
            let _ticket = ticket;
            panic!("backend blew up");
        });
        assert!(task.await.unwrap_err().is_panic());
        assert_eq!(session.state(), GenerationState::Idle);
    }

    #[test]
    fn snapshot_serializes_lowercase_status() {
        let session = Session::new();
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["status"], "idle");
        assert!(json.get("sequence").is_none());
        assert!(json.get("error").is_none());
    }
}
