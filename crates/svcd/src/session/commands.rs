//! Session actor commands and errors.
//!
//! - `SessionCommand`: requests sent to the actor, each with a oneshot reply
//! - `SessionError`: failures of individual session operations

use svc_core::SessionId;
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Session Commands
// ============================================================================

/// Commands sent to the session actor.
///
/// Each command carries a oneshot sender for its result, so callers can
/// await the reply without blocking the actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Allocate the next id and insert an empty session under it.
    Open {
        respond_to: oneshot::Sender<Result<SessionId, SessionError>>,
    },

    /// Check whether a session is open. Never mutates.
    Resume {
        session_id: SessionId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Remove a session.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` if the session is not open
    Close {
        session_id: SessionId,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Read one value from a session.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` if the session is not open
    /// - `SessionError::KeyNotFound` if the key was never stored
    Get {
        session_id: SessionId,
        key: String,
        respond_to: oneshot::Sender<Result<String, SessionError>>,
    },

    /// Insert or replace one value in a session.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` if the session is not open
    Put {
        session_id: SessionId,
        key: String,
        value: String,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },
}

// ============================================================================
// Session Errors
// ============================================================================

/// Errors that can occur during session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session was never opened or has been closed.
    #[error("Unknown session id {0}")]
    SessionNotFound(SessionId),

    /// The session holds no value under this key.
    #[error("Unknown key {key} for session {session_id}")]
    KeyNotFound { session_id: SessionId, key: String },

    /// Every representable id has been handed out.
    #[error("session ids exhausted")]
    IdsExhausted,

    /// The actor shut down before replying.
    #[error("session table unavailable")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::SessionNotFound(SessionId::new(4));
        assert_eq!(err.to_string(), "Unknown session id 4");

        let err = SessionError::KeyNotFound {
            session_id: SessionId::new(2),
            key: "colour".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown key colour for session 2");

        assert_eq!(
            SessionError::ChannelClosed.to_string(),
            "session table unavailable"
        );
    }

    #[tokio::test]
    async fn test_dropped_responder_is_observed() {
        let (tx, rx) = oneshot::channel::<Result<(), SessionError>>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
