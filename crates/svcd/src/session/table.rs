//! In-memory session store.

use std::collections::HashMap;

use svc_core::SessionId;

use super::commands::SessionError;

/// Key/value store belonging to one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    values: HashMap<String, String>,
}

impl Session {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All open sessions, plus the id the next opened session will receive.
///
/// Ids start at [`SessionId::FIRST`], strictly increase, and are never
/// handed out twice, even after the session they named is closed.
#[derive(Debug)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    next_id: Option<SessionId>,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: Some(SessionId::FIRST),
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Opens a new, empty session and returns its id.
    pub fn open(&mut self) -> Result<SessionId, SessionError> {
        let id = self.next_id.ok_or(SessionError::IdsExhausted)?;
        self.next_id = id.next();
        self.sessions.insert(id, Session::default());
        Ok(id)
    }

    /// True if `id` names an open session.
    pub fn resume(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn close(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::SessionNotFound(id))
    }

    pub fn get(&self, id: SessionId, key: &str) -> Result<String, SessionError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(SessionError::SessionNotFound(id))?;

        session
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| SessionError::KeyNotFound {
                session_id: id,
                key: key.to_string(),
            })
    }

    /// Inserts or replaces `key` in session `id`.
    pub fn put(&mut self, id: SessionId, key: String, value: String) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::SessionNotFound(id))?;
        session.values.insert(key, value);
        Ok(())
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }
}
