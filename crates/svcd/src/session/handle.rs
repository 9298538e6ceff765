//! Client interface for the session actor.
//!
//! Channel failures are mapped to `SessionError::ChannelClosed`.

use tokio::sync::{mpsc, oneshot};

use svc_core::SessionId;

use super::commands::{SessionCommand, SessionError};

/// Cheap-to-clone handle to the session actor, shared by every SD
/// connection task.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<SessionCommand>) -> Self {
        Self { sender }
    }

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// - `SessionError::IdsExhausted` if no ids remain
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn open(&self) -> Result<SessionId, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Open { respond_to: tx }).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Returns true if `session_id` names an open session.
    pub async fn resume(&self, session_id: SessionId) -> Result<bool, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Resume {
            session_id,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Closes a session.
    ///
    /// # Errors
    ///
    /// - `SessionError::SessionNotFound` if the session is not open
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn close(&self, session_id: SessionId) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Close {
            session_id,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - `SessionError::SessionNotFound` if the session is not open
    /// - `SessionError::KeyNotFound` if nothing is stored under `key`
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn get(&self, session_id: SessionId, key: &str) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Get {
            session_id,
            key: key.to_string(),
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// - `SessionError::SessionNotFound` if the session is not open
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn put(
        &self,
        session_id: SessionId,
        key: String,
        value: String,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Put {
            session_id,
            key,
            value,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}
