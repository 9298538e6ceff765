//! Session daemon client.

use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use svc_core::SessionId;
use svc_protocol::{SdReplyKind, SdRequest, SdResponse};

use crate::error::{ClientError, Result};

/// One connection to a session daemon.
///
/// A session outlives the connection: open it here, drop the client, and
/// resume it later from a new connection.
pub struct SdClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    addr: SocketAddr,
}

impl SdClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;
        let (reader, writer) = stream.into_split();

        debug!(server = %addr, "Connected to session daemon");
        Ok(Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Opens a new session and binds this connection to it.
    pub async fn open(&mut self) -> Result<SessionId> {
        match self.round_trip(&SdRequest::Open, SdReplyKind::Session).await? {
            SdResponse::Accepted(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    /// Binds this connection to an existing session.
    pub async fn resume(&mut self, id: SessionId) -> Result<()> {
        match self.round_trip(&SdRequest::Resume(id), SdReplyKind::Session).await? {
            SdResponse::Accepted(actual) => check_echo(id, actual),
            SdResponse::Rejected(reason) => Err(ClientError::Rejected(reason)),
            other => Err(unexpected(other)),
        }
    }

    /// Closes a session, bound to this connection or not.
    pub async fn close(&mut self, id: SessionId) -> Result<()> {
        match self.round_trip(&SdRequest::Close(id), SdReplyKind::Session).await? {
            SdResponse::Closed(actual) => check_echo(id, actual),
            other => Err(unexpected(other)),
        }
    }

    /// Fetches a session value, or a file when `name` starts with `/`.
    pub async fn get(&mut self, name: &str) -> Result<String> {
        let request = SdRequest::Get {
            name: name.to_string(),
        };
        match self.round_trip(&request, SdReplyKind::Document).await? {
            SdResponse::Document { body, .. } => Ok(body),
            other => Err(unexpected(other)),
        }
    }

    /// Stores a session value.
    pub async fn post(&mut self, name: &str, body: &str) -> Result<()> {
        let request = SdRequest::Post {
            name: name.to_string(),
            body: body.to_string(),
        };
        match self.round_trip(&request, SdReplyKind::Ack).await? {
            SdResponse::Success => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Closes the connection. Any bound session stays open on the server.
    pub async fn disconnect(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn round_trip(&mut self, request: &SdRequest, kind: SdReplyKind) -> Result<SdResponse> {
        request.write_to(&mut self.writer).await?;
        let response = SdResponse::read_from(&mut self.reader, kind).await?;

        debug!(verb = request.verb(), ?response, "Session daemon replied");

        match response {
            SdResponse::Error(message) => Err(ClientError::Server(message)),
            other => Ok(other),
        }
    }
}

fn check_echo(expected: SessionId, actual: SessionId) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ClientError::SessionMismatch { expected, actual })
    }
}

fn unexpected(response: SdResponse) -> ClientError {
    ClientError::UnexpectedReply(format!("{response:?}"))
}
