//! Session daemon connection service.
//!
//! Each connection is a small state machine:
//!
//! ```text
//!            open / resume(ok)
//!   Unbound ───────────────────▶ Bound(id)
//!      ▲                            │
//!      └────────── close(id) ───────┘
//! ```
//!
//! `get` and `post` need a bound session; `close` works in either state.
//! A request is always read in full (arguments and body) before it is
//! answered, so a refused request never leaves stray bytes on the stream.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use svc_core::SessionId;
use svc_protocol::{SdRequest, SdResponse};

use super::connection::{Connection, ConnectionError};
use super::documents::{self, DocumentError};
use super::ConnectionService;
use crate::session::{SessionError, SessionHandle};

/// Binding of one connection to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdState {
    Unbound,
    Bound(SessionId),
}

/// Serves the SD protocol against a shared session table.
pub struct SdService {
    sessions: SessionHandle,
    document_root: PathBuf,
}

impl SdService {
    /// Creates the service. `/`-prefixed document names are read from
    /// files beneath `document_root`.
    pub fn new(sessions: SessionHandle, document_root: impl Into<PathBuf>) -> Self {
        Self {
            sessions,
            document_root: document_root.into(),
        }
    }

    /// Applies one well-formed request and returns the reply.
    ///
    /// Only a failure of the session table itself is an error; everything
    /// else is answered on the wire.
    pub async fn handle_request(
        &self,
        state: &mut SdState,
        request: SdRequest,
    ) -> Result<SdResponse, ConnectionError> {
        let response = match (request, *state) {
            (SdRequest::Open, SdState::Unbound) => {
                let id = self.sessions.open().await?;
                *state = SdState::Bound(id);
                SdResponse::Accepted(id)
            }
            (SdRequest::Open, SdState::Bound(_)) => SdResponse::error("Session already open!"),

            (SdRequest::Resume(id), SdState::Unbound) => {
                if self.sessions.resume(id).await? {
                    *state = SdState::Bound(id);
                    SdResponse::Accepted(id)
                } else {
                    SdResponse::Rejected("Invalid session id".to_string())
                }
            }
            (SdRequest::Resume(_), SdState::Bound(_)) => {
                SdResponse::error("Session already open, cannot resume!")
            }

            (SdRequest::Close(id), current) => match self.sessions.close(id).await {
                Ok(()) => {
                    if current == SdState::Bound(id) {
                        *state = SdState::Unbound;
                    }
                    SdResponse::Closed(id)
                }
                Err(e) => session_failure(e)?,
            },

            (SdRequest::Get { name }, SdState::Bound(id)) => self.get(id, name).await?,
            (SdRequest::Post { name, body }, SdState::Bound(id)) => {
                self.post(id, name, body).await?
            }
            (SdRequest::Get { .. } | SdRequest::Post { .. }, SdState::Unbound) => {
                SdResponse::error("No open session")
            }

            (SdRequest::Unknown(verb), _) => SdResponse::error(format!("Invalid message {verb}")),
        };

        Ok(response)
    }

    async fn get(&self, id: SessionId, name: String) -> Result<SdResponse, ConnectionError> {
        if name.starts_with('/') || name.is_empty() {
            return Ok(
                match documents::read_document(&self.document_root, &name).await {
                    Ok(body) => SdResponse::Document { name, body },
                    Err(e) => document_failure(e),
                },
            );
        }

        match self.sessions.get(id, &name).await {
            Ok(body) => Ok(SdResponse::Document { name, body }),
            Err(e) => session_failure(e),
        }
    }

    async fn post(
        &self,
        id: SessionId,
        name: String,
        body: String,
    ) -> Result<SdResponse, ConnectionError> {
        if name.is_empty() {
            return Ok(SdResponse::Error(DocumentError::EmptyName.to_string()));
        }
        if name.starts_with('/') {
            return Ok(SdResponse::error(format!("Cannot post to file path {name}")));
        }

        match self.sessions.put(id, name, body).await {
            Ok(()) => Ok(SdResponse::Success),
            Err(e) => session_failure(e),
        }
    }
}

/// Turns a table error into a reply, except when the table itself is gone.
fn session_failure(err: SessionError) -> Result<SdResponse, ConnectionError> {
    match err {
        SessionError::ChannelClosed => Err(ConnectionError::SessionTableUnavailable),
        other => Ok(SdResponse::error(other)),
    }
}

fn document_failure(err: DocumentError) -> SdResponse {
    if let DocumentError::Io { .. } = &err {
        warn!(error = %err, "Document read failed");
    }
    SdResponse::error(err)
}

#[async_trait]
impl ConnectionService for SdService {
    fn name(&self) -> &'static str {
        "sd"
    }

    async fn serve(&self, conn: &mut Connection) -> Result<(), ConnectionError> {
        let connection = conn.number();
        let mut state = SdState::Unbound;

        loop {
            let request = match SdRequest::read_from(conn.reader()).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(connection, "Client disconnected");
                    return Ok(());
                }
                Err(e) if e.is_protocol_violation() => {
                    warn!(connection, error = %e, "Malformed request");
                    SdResponse::error(&e).write_to(conn.writer()).await?;
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };

            debug!(connection, verb = request.verb(), ?state, "Request received");

            // Anything outside the protocol ends the conversation
            let fatal = match &request {
                SdRequest::Unknown(verb) => Some(verb.clone()),
                _ => None,
            };

            let before = state;
            let response = self.handle_request(&mut state, request).await?;
            response.write_to(conn.writer()).await?;

            if state != before {
                info!(connection, from = ?before, to = ?state, "Session binding changed");
            }

            if let Some(verb) = fatal {
                warn!(connection, verb = %verb, "Unknown verb, closing connection");
                return Err(ConnectionError::ProtocolViolation(format!("unknown verb {verb:?}")));
            }
        }
    }
}
