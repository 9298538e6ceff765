//! Error types for the svc clients.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()` or
//! `unreachable!()` in this crate outside tests.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use svc_core::{DomainError, ServiceName, SessionId};
use svc_protocol::{FrameError, PrsCodecError, Status};

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the server.
    ///
    /// Check that the server is running and the address is right.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The registry did not answer in time. UDP gives no delivery
    /// guarantee, so this may also mean the request was lost.
    #[error("No response from registry at {addr} within {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[error("Invalid registry response: {0}")]
    Codec(#[from] PrsCodecError),

    /// The registry answered with a non-success status.
    #[error("Registry refused {service}: {status}")]
    Registry { service: ServiceName, status: Status },

    #[error("Protocol error: {0}")]
    Frame(#[from] FrameError),

    /// The server answered with `error <message>`.
    #[error("Server error: {0}")]
    Server(String),

    /// The server answered `rejected <reason>` to a resume.
    #[error("Session rejected: {0}")]
    Rejected(String),

    /// The server echoed a different session id than the one requested.
    #[error("Server echoed session {actual}, expected {expected}")]
    SessionMismatch {
        expected: SessionId,
        actual: SessionId,
    },

    /// The server sent a well-formed reply that makes no sense here.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] DomainError),
}

impl ClientError {
    /// True if the registry reported the service as not registered.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Registry {
                status: Status::ServiceNotFound,
                ..
            }
        )
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
