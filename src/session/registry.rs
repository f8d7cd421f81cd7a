//! Live sessions, keyed by connection

use std::collections::HashMap;

use super::state::SessionState;
use super::types::SessionId;

/// Initial capacity for the session map
const SESSION_INITIAL_CAPACITY: usize = 16;

/// Owned by the engine core; one entry per connected client
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionState>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: HashMap::with_capacity(SESSION_INITIAL_CAPACITY),
        }
    }

    /// Register a fresh session and return its id
    pub fn create(&mut self) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(id, SessionState::new(id));
        log::info!("Session {id} connected ({} live)", self.sessions.len());
        id
    }

    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&SessionState> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut SessionState> {
        self.sessions.get_mut(id)
    }

    /// Drop a session; late completions for it are discarded afterwards
    pub fn dispose(&mut self, id: &SessionId) -> Option<SessionState> {
        let removed = self.sessions.remove(id);
        if let Some(state) = &removed {
            log::info!(
                "Session {id} disposed with {} tasks in flight ({} live)",
                state.in_flight(),
                self.sessions.len()
            );
        }
        removed
    }

    pub fn ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
