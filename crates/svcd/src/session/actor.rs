//! Session actor - owns the session table and processes commands.
//!
//! The actor is the only code that touches the table. Commands are handled
//! one at a time, so each operation (including id allocation plus insert on
//! open) is atomic with respect to every other connection.

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::commands::SessionCommand;
use super::table::SessionTable;

/// The session actor.
pub struct SessionActor {
    receiver: mpsc::Receiver<SessionCommand>,
    table: SessionTable,
}

impl SessionActor {
    pub fn new(receiver: mpsc::Receiver<SessionCommand>) -> Self {
        Self {
            receiver,
            table: SessionTable::new(),
        }
    }

    /// Runs the actor loop until every handle has been dropped.
    pub async fn run(mut self) {
        info!("Session actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.table.len(), "Session actor stopped");
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        // Send errors mean the caller went away; nothing to do about it
        match cmd {
            SessionCommand::Open { respond_to } => {
                let result = self.table.open();
                if let Ok(id) = &result {
                    debug!(session_id = %id, "Session opened");
                }
                let _ = respond_to.send(result);
            }
            SessionCommand::Resume {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.table.resume(session_id));
            }
            SessionCommand::Close {
                session_id,
                respond_to,
            } => {
                let result = self.table.close(session_id);
                if result.is_ok() {
                    debug!(session_id = %session_id, "Session closed");
                }
                let _ = respond_to.send(result);
            }
            SessionCommand::Get {
                session_id,
                key,
                respond_to,
            } => {
                let _ = respond_to.send(self.table.get(session_id, &key));
            }
            SessionCommand::Put {
                session_id,
                key,
                value,
                respond_to,
            } => {
                let _ = respond_to.send(self.table.put(session_id, key, value));
            }
        }
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use svc_core::SessionId;
    use tokio::sync::oneshot;

    fn create_actor() -> (mpsc::Sender<SessionCommand>, SessionActor) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        (cmd_tx, SessionActor::new(cmd_rx))
    }

    async fn process_one(actor: &mut SessionActor) {
        if let Some(cmd) = actor.receiver.recv().await {
            actor.handle_command(cmd);
        }
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let (cmd_tx, mut actor) = create_actor();

        let (tx, rx) = oneshot::channel();
        cmd_tx.send(SessionCommand::Open { respond_to: tx }).await.unwrap();
        process_one(&mut actor).await;
        let id = rx.await.unwrap().unwrap();
        assert_eq!(id, SessionId::FIRST);
        assert_eq!(actor.session_count(), 1);

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(SessionCommand::Close {
                session_id: id,
                respond_to: tx,
            })
            .await
            .unwrap();
        process_one(&mut actor).await;
        assert!(rx.await.unwrap().is_ok());
        assert_eq!(actor.session_count(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let (cmd_tx, mut actor) = create_actor();

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(SessionCommand::Get {
                session_id: SessionId::new(3),
                key: "k".to_string(),
                respond_to: tx,
            })
            .await
            .unwrap();
        process_one(&mut actor).await;

        assert_eq!(
            rx.await.unwrap(),
            Err(SessionError::SessionNotFound(SessionId::new(3)))
        );
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_stop_actor() {
        let (cmd_tx, mut actor) = create_actor();

        let (tx, rx) = oneshot::channel();
        drop(rx);
        cmd_tx.send(SessionCommand::Open { respond_to: tx }).await.unwrap();
        process_one(&mut actor).await;

        // The session was still opened
        assert_eq!(actor.session_count(), 1);
    }
}
