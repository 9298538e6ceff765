//! Session table using the actor pattern.
//!
//! Every SD connection task shares one table. The table is owned by a
//! single actor task; connections talk to it through a cloneable
//! [`SessionHandle`], and the actor applies their commands one at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                     ┌─────────────────┐
//! │ SD connection 1 │──┐                  │                 │
//! └─────────────────┘  │ SessionCommand   │  SessionActor   │
//! ┌─────────────────┐  ├─────────────────▶│                 │
//! │ SD connection 2 │──┤  (mpsc channel)  │  SessionTable   │
//! └─────────────────┘  │                  │  id → values    │
//! ┌─────────────────┐  │◀─────────────────│                 │
//! │ SD connection N │──┘  oneshot reply   └─────────────────┘
//! └─────────────────┘
//! ```
//!
//! No command spans network I/O: a connection reads its whole request,
//! sends one command, and writes the reply after the actor has answered.

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;
mod table;

pub use actor::SessionActor;
pub use commands::{SessionCommand, SessionError};
pub use handle::SessionHandle;
pub use table::{Session, SessionTable};

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawns the session actor and returns a handle to it.
///
/// The actor stops once every clone of the handle has been dropped.
pub fn spawn_session_table() -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = SessionActor::new(cmd_rx);
    tokio::spawn(actor.run());

    SessionHandle::new(cmd_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use svc_core::SessionId;

    #[tokio::test]
    async fn test_handle_round_trip() {
        let handle = spawn_session_table();

        let id = handle.open().await.unwrap();
        assert!(handle.resume(id).await.unwrap());

        handle
            .put(id, "greeting".to_string(), "hello\nworld".to_string())
            .await
            .unwrap();
        assert_eq!(handle.get(id, "greeting").await.unwrap(), "hello\nworld");

        handle.close(id).await.unwrap();
        assert!(!handle.resume(id).await.unwrap());
        assert_eq!(
            handle.get(id, "greeting").await,
            Err(SessionError::SessionNotFound(id))
        );
    }

    #[tokio::test]
    async fn test_concurrent_opens_get_unique_ids() {
        let handle = spawn_session_table();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.open().await.unwrap() })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 50);
        assert_eq!(ids.first(), Some(&SessionId::FIRST));
        assert_eq!(ids.last(), Some(&SessionId::new(50)));
    }
}
