//! File transfer connection service.
//!
//! Stateless: every `get` streams the `.txt` files of one directory beneath
//! the service root, then `done`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use svc_protocol::{FtReply, FtRequest};

use super::connection::{Connection, ConnectionError, ConnectionWriter};
use super::documents;
use super::ConnectionService;

/// Serves directory listings and file contents from `root`.
pub struct FtService {
    root: PathBuf,
}

impl FtService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the reply stream for one `get`.
    async fn send_directory(
        &self,
        writer: &mut ConnectionWriter,
        directory: &str,
        connection: u64,
    ) -> Result<(), ConnectionError> {
        let files = match documents::list_text_files(&self.root, directory).await {
            Ok(files) => files,
            Err(e) => {
                debug!(connection, directory, error = %e, "Directory request refused");
                FtReply::Error(e.to_string()).write_to(writer).await?;
                writer.flush().await?;
                return Ok(());
            }
        };

        let mut sent = 0usize;
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(connection, file = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            FtReply::File { name, contents }.write_to(writer).await?;
            sent += 1;
        }

        FtReply::Done.write_to(writer).await?;
        writer.flush().await?;

        info!(connection, directory, files = sent, "Directory sent");
        Ok(())
    }
}

#[async_trait]
impl ConnectionService for FtService {
    fn name(&self) -> &'static str {
        "ft"
    }

    async fn serve(&self, conn: &mut Connection) -> Result<(), ConnectionError> {
        let connection = conn.number();

        loop {
            let request = match FtRequest::read_from(conn.reader()).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(connection, "Client disconnected");
                    return Ok(());
                }
                Err(e) if e.is_protocol_violation() => {
                    warn!(connection, error = %e, "Malformed request");
                    FtReply::Error(e.to_string()).write_to(conn.writer()).await?;
                    conn.writer().flush().await?;
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };

            match request {
                FtRequest::Get { directory } => {
                    self.send_directory(conn.writer(), &directory, connection)
                        .await?;
                }
                FtRequest::Exit => {
                    debug!(connection, "Client exited");
                    return Ok(());
                }
                FtRequest::Unknown(verb) => {
                    warn!(connection, verb = %verb, "Unknown verb, closing connection");
                    FtReply::Error(format!("Invalid message {verb}"))
                        .write_to(conn.writer())
                        .await?;
                    conn.writer().flush().await?;
                    return Err(ConnectionError::ProtocolViolation(format!(
                        "unknown verb {verb:?}"
                    )));
                }
            }
        }
    }
}
