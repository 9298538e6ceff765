//! File transfer line protocol.
//!
//! ```text
//! get <directory>  → (<file name> <len> <contents>)* done | error <msg>
//! exit             → (connection closed, no reply)
//! ```

use std::io;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::frame::{read_body, read_field, read_line, write_body, write_line, FrameError};

pub const VERB_GET: &str = "get";
pub const VERB_EXIT: &str = "exit";

pub const REPLY_DONE: &str = "done";
pub const REPLY_ERROR: &str = "error";

/// A request sent by an FT client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtRequest {
    Get { directory: String },
    Exit,
    Unknown(String),
}

impl FtRequest {
    /// Reads one request. `Ok(None)` means the peer closed the connection.
    pub async fn read_from<R>(reader: &mut R) -> Result<Option<Self>, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(verb) = read_line(reader).await? else {
            return Ok(None);
        };

        let request = match verb.as_str() {
            VERB_GET => Self::Get {
                directory: read_field(reader).await?,
            },
            VERB_EXIT => Self::Exit,
            _ => Self::Unknown(verb),
        };

        Ok(Some(request))
    }

    /// Writes the request and flushes.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            Self::Get { directory } => {
                write_line(writer, VERB_GET).await?;
                write_line(writer, directory).await?;
            }
            Self::Exit => write_line(writer, VERB_EXIT).await?,
            Self::Unknown(verb) => write_line(writer, verb).await?,
        }
        writer.flush().await
    }
}

/// One element of the reply stream to a `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtReply {
    File { name: String, contents: String },
    Done,
    Error(String),
}

impl FtReply {
    /// Writes the element. Callers flush once the stream is complete.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            Self::File { name, contents } => {
                write_line(writer, name).await?;
                write_body(writer, contents).await
            }
            Self::Done => write_line(writer, REPLY_DONE).await,
            Self::Error(message) => {
                write_line(writer, REPLY_ERROR).await?;
                write_line(writer, message).await
            }
        }
    }

    /// Reads one element of the reply stream.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let line = read_field(reader).await?;

        match line.as_str() {
            REPLY_DONE => Ok(Self::Done),
            REPLY_ERROR => Ok(Self::Error(read_field(reader).await?)),
            _ => {
                let contents = read_body(reader).await?;
                Ok(Self::File {
                    name: line,
                    contents,
                })
            }
        }
    }
}
