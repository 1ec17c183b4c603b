//! Mock gateway for testing

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use stagehand_util::{GuildId, SessionId};

use crate::{GatewayError, GatewayResult, Session, SessionGateway, SessionStatus};

/// In-memory gateway for unit/integration testing.
///
/// Holds a mutable remote-state table and per-operation failure queues: each
/// queued error is returned by exactly one call, so a test can script "two
/// rate limits, then success" without touching the remote state.
pub struct MockGateway {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,

    list_failures: Mutex<VecDeque<GatewayError>>,
    activate_failures: Mutex<VecDeque<GatewayError>>,
    end_failures: Mutex<VecDeque<GatewayError>>,

    list_calls: AtomicU32,
    activate_calls: Mutex<Vec<SessionId>>,
    end_calls: Mutex<Vec<SessionId>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            list_failures: Mutex::new(VecDeque::new()),
            activate_failures: Mutex::new(VecDeque::new()),
            end_failures: Mutex::new(VecDeque::new()),
            list_calls: AtomicU32::new(0),
            activate_calls: Mutex::new(Vec::new()),
            end_calls: Mutex::new(Vec::new()),
        }
    }

    /// Put a session into the remote state, replacing any previous version.
    pub fn put_session(&self, session: Session) {
        self.sessions.lock().unwrap().insert(session.id.clone(), session);
    }

    /// Remove a session from the remote state entirely.
    pub fn remove_session(&self, id: &SessionId) {
        self.sessions.lock().unwrap().remove(id);
    }

    /// Change a session's status in place (simulates an external actor).
    pub fn set_status(&self, id: &SessionId, status: SessionStatus) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(id) {
            s.status = status;
        }
    }

    /// Current remote view of one session.
    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Queue an error for the next list call.
    pub fn fail_next_list(&self, err: GatewayError) {
        self.list_failures.lock().unwrap().push_back(err);
    }

    /// Queue an error for the next activate call.
    pub fn fail_next_activate(&self, err: GatewayError) {
        self.activate_failures.lock().unwrap().push_back(err);
    }

    /// Queue an error for the next end call.
    pub fn fail_next_end(&self, err: GatewayError) {
        self.end_failures.lock().unwrap().push_back(err);
    }

    pub fn list_call_count(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn activate_calls(&self) -> Vec<SessionId> {
        self.activate_calls.lock().unwrap().clone()
    }

    pub fn end_calls(&self) -> Vec<SessionId> {
        self.end_calls.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionGateway for MockGateway {
    async fn list_scheduled_sessions(&self, _guild: &GuildId) -> GatewayResult<Vec<Session>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut sessions: Vec<Session> = self.sessions.lock().unwrap().values().cloned().collect();
        sessions.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(sessions)
    }

    async fn activate_session(&self, _guild: &GuildId, session: &SessionId) -> GatewayResult<()> {
        self.activate_calls.lock().unwrap().push(session.clone());

        if let Some(err) = self.activate_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(session) {
            Some(s) if s.status == SessionStatus::Scheduled => {
                s.status = SessionStatus::Active;
                Ok(())
            }
            // Already transitioned: idempotent success per the trait contract
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound(session.clone())),
        }
    }

    async fn end_session(&self, _guild: &GuildId, session: &SessionId) -> GatewayResult<()> {
        self.end_calls.lock().unwrap().push(session.clone());

        if let Some(err) = self.end_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(session) {
            Some(s) if s.status == SessionStatus::Active => {
                s.status = SessionStatus::Completed;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound(session.clone())),
        }
    }
}
