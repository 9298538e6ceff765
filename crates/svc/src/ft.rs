//! File transfer client.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use svc_protocol::{FtReply, FtRequest};

use crate::error::{ClientError, Result};

/// A file received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub name: String,
    pub contents: String,
}

/// One connection to a file transfer server.
pub struct FtClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl FtClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;
        let (reader, writer) = stream.into_split();

        debug!(server = %addr, "Connected to file server");
        Ok(Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        })
    }

    /// Fetches every `.txt` file in `directory` on the server.
    pub async fn get_directory(&mut self, directory: &str) -> Result<Vec<FetchedFile>> {
        FtRequest::Get {
            directory: directory.to_string(),
        }
        .write_to(&mut self.writer)
        .await?;

        let mut files = Vec::new();
        loop {
            match FtReply::read_from(&mut self.reader).await? {
                FtReply::File { name, contents } => {
                    debug!(file = %name, len = contents.len(), "Received file");
                    files.push(FetchedFile { name, contents });
                }
                FtReply::Done => return Ok(files),
                FtReply::Error(message) => return Err(ClientError::Server(message)),
            }
        }
    }

    /// Says goodbye and closes the connection.
    pub async fn exit(mut self) -> Result<()> {
        FtRequest::Exit.write_to(&mut self.writer).await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Writes `files` into `dir`, creating it if needed. Returns the paths
/// written. Names that are not plain file names are skipped.
pub async fn save_files(dir: &Path, files: &[FetchedFile]) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut written = Vec::new();
    for file in files {
        let plain = Path::new(&file.name)
            .file_name()
            .is_some_and(|n| n == file.name.as_str());
        if !plain {
            warn!(file = %file.name, "Refusing to save file with a path in its name");
            continue;
        }

        let path = dir.join(&file.name);
        tokio::fs::write(&path, &file.contents).await?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_files_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("fetched");
        let files = vec![
            FetchedFile {
                name: "a.txt".to_string(),
                contents: "one\ntwo".to_string(),
            },
            FetchedFile {
                name: "../escape.txt".to_string(),
                contents: "bad".to_string(),
            },
        ];

        let written = save_files(&out, &files).await.unwrap();
        assert_eq!(written, vec![out.join("a.txt")]);
        assert_eq!(std::fs::read_to_string(out.join("a.txt")).unwrap(), "one\ntwo");
        assert!(!tmp.path().join("escape.txt").exists());
    }
}
