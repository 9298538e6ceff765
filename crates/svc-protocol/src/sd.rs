//! Session daemon line protocol.
//!
//! ```text
//! open                          → accepted <id>  | error <msg>
//! resume <id>                   → accepted <id>  | rejected <msg> | error <msg>
//! close <id>                    → closed <id>    | error <msg>
//! get <name>                    → success <name> <len> <body> | error <msg>
//! post <name> <len> <body>      → success        | error <msg>
//! ```
//!
//! Every `<field>` is its own line; `<body>` is exactly `<len>` raw bytes.

use std::io;

use svc_core::SessionId;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::frame::{read_body, read_field, read_line, read_parsed, write_body, write_line, FrameError};

pub const VERB_OPEN: &str = "open";
pub const VERB_RESUME: &str = "resume";
pub const VERB_CLOSE: &str = "close";
pub const VERB_GET: &str = "get";
pub const VERB_POST: &str = "post";

pub const REPLY_ACCEPTED: &str = "accepted";
pub const REPLY_REJECTED: &str = "rejected";
pub const REPLY_CLOSED: &str = "closed";
pub const REPLY_SUCCESS: &str = "success";
pub const REPLY_ERROR: &str = "error";

/// A request sent by an SD client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdRequest {
    Open,
    Resume(SessionId),
    Close(SessionId),
    Get { name: String },
    Post { name: String, body: String },
    /// A verb this protocol does not define. Carried so the server can
    /// report it before dropping the connection.
    Unknown(String),
}

impl SdRequest {
    /// Returns the verb that introduces this request.
    pub fn verb(&self) -> &str {
        match self {
            Self::Open => VERB_OPEN,
            Self::Resume(_) => VERB_RESUME,
            Self::Close(_) => VERB_CLOSE,
            Self::Get { .. } => VERB_GET,
            Self::Post { .. } => VERB_POST,
            Self::Unknown(verb) => verb.as_str(),
        }
    }

    /// Reads one complete request, including any arguments and body.
    ///
    /// Returns `Ok(None)` if the peer closed the connection between requests.
    pub async fn read_from<R>(reader: &mut R) -> Result<Option<Self>, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(verb) = read_line(reader).await? else {
            return Ok(None);
        };

        let request = match verb.as_str() {
            VERB_OPEN => Self::Open,
            VERB_RESUME => Self::Resume(read_parsed(reader, "session id").await?),
            VERB_CLOSE => Self::Close(read_parsed(reader, "session id").await?),
            VERB_GET => Self::Get {
                name: read_field(reader).await?,
            },
            VERB_POST => {
                let name = read_field(reader).await?;
                let body = read_body(reader).await?;
                Self::Post { name, body }
            }
            _ => Self::Unknown(verb),
        };

        Ok(Some(request))
    }

    /// Writes the request and flushes.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_line(writer, self.verb()).await?;
        match self {
            Self::Open | Self::Unknown(_) => {}
            Self::Resume(id) | Self::Close(id) => write_line(writer, &id.to_string()).await?,
            Self::Get { name } => write_line(writer, name).await?,
            Self::Post { name, body } => {
                write_line(writer, name).await?;
                write_body(writer, body).await?;
            }
        }
        writer.flush().await
    }
}

/// Which reply shape a client expects; `success` is bare after a post but
/// carries a document after a get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdReplyKind {
    /// Reply to open, resume or close.
    Session,
    /// Reply to get.
    Document,
    /// Reply to post.
    Ack,
}

/// A reply sent by the SD server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdResponse {
    Accepted(SessionId),
    Rejected(String),
    Closed(SessionId),
    Document { name: String, body: String },
    Success,
    Error(String),
}

impl SdResponse {
    /// Creates an error reply from anything displayable.
    pub fn error(message: impl ToString) -> Self {
        Self::Error(message.to_string())
    }

    /// Writes the reply and flushes.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            Self::Accepted(id) => {
                write_line(writer, REPLY_ACCEPTED).await?;
                write_line(writer, &id.to_string()).await?;
            }
            Self::Rejected(reason) => {
                write_line(writer, REPLY_REJECTED).await?;
                write_line(writer, reason).await?;
            }
            Self::Closed(id) => {
                write_line(writer, REPLY_CLOSED).await?;
                write_line(writer, &id.to_string()).await?;
            }
            Self::Document { name, body } => {
                write_line(writer, REPLY_SUCCESS).await?;
                write_line(writer, name).await?;
                write_body(writer, body).await?;
            }
            Self::Success => write_line(writer, REPLY_SUCCESS).await?,
            Self::Error(message) => {
                write_line(writer, REPLY_ERROR).await?;
                write_line(writer, message).await?;
            }
        }
        writer.flush().await
    }

    /// Reads one reply of the expected kind.
    pub async fn read_from<R>(reader: &mut R, kind: SdReplyKind) -> Result<Self, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let verb = read_field(reader).await?;

        match verb.as_str() {
            REPLY_ACCEPTED => Ok(Self::Accepted(read_parsed(reader, "session id").await?)),
            REPLY_CLOSED => Ok(Self::Closed(read_parsed(reader, "session id").await?)),
            REPLY_REJECTED => Ok(Self::Rejected(read_field(reader).await?)),
            REPLY_ERROR => Ok(Self::Error(read_field(reader).await?)),
            REPLY_SUCCESS if kind == SdReplyKind::Document => {
                let name = read_field(reader).await?;
                let body = read_body(reader).await?;
                Ok(Self::Document { name, body })
            }
            REPLY_SUCCESS => Ok(Self::Success),
            _ => Err(FrameError::Malformed {
                field: "reply",
                value: verb,
            }),
        }
    }
}
