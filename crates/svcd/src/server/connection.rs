//! A single accepted client connection.
//!
//! # Panic-Free Guarantees
//!
//! Transport errors are returned to the service, which ends only this
//! connection; teardown failures are logged and otherwise ignored.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

use svc_protocol::FrameError;

use crate::session::SessionError;

/// Buffered read half of a connection.
pub type ConnectionReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Buffered write half of a connection.
pub type ConnectionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Reasons a connection ends other than the peer closing it cleanly.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer sent something the protocol does not allow. It has already
    /// been told so with an `error` reply.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("connection closed in the middle of a request")]
    UnexpectedEof,

    #[error("session table unavailable")]
    SessionTableUnavailable,
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => Self::Io(e),
            FrameError::UnexpectedEof => Self::UnexpectedEof,
            other => Self::ProtocolViolation(other.to_string()),
        }
    }
}

impl From<SessionError> for ConnectionError {
    fn from(_: SessionError) -> Self {
        Self::SessionTableUnavailable
    }
}

/// One client connection: buffered halves plus identity for logging.
pub struct Connection {
    reader: ConnectionReader,
    writer: ConnectionWriter,
    peer: SocketAddr,
    number: u64,
}

impl Connection {
    /// Wraps an accepted TCP stream.
    pub fn new(stream: TcpStream, peer: SocketAddr, number: u64) -> Self {
        let (reader, writer) = stream.into_split();
        Self::from_parts(
            Box::new(BufReader::new(reader)),
            Box::new(BufWriter::new(writer)),
            peer,
            number,
        )
    }

    /// Builds a connection from arbitrary halves.
    pub fn from_parts(
        reader: ConnectionReader,
        writer: ConnectionWriter,
        peer: SocketAddr,
        number: u64,
    ) -> Self {
        Self {
            reader,
            writer,
            peer,
            number,
        }
    }

    pub fn reader(&mut self) -> &mut ConnectionReader {
        &mut self.reader
    }

    pub fn writer(&mut self) -> &mut ConnectionWriter {
        &mut self.writer
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sequence number assigned by the listener, for log correlation.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Tears the connection down: the reader is released first, then the
    /// writer is flushed, shut down and released, which closes the socket.
    pub async fn close(self) {
        let Self {
            reader,
            mut writer,
            number,
            ..
        } = self;

        drop(reader);

        if let Err(e) = writer.shutdown().await {
            debug!(connection = number, error = %e, "Error shutting down writer");
        }
        drop(writer);
    }
}
