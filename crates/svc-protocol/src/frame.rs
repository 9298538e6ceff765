//! Line and body framing shared by the SD and FT protocols.
//!
//! A message is a sequence of `\n`-terminated fields. Content is framed as a
//! decimal byte count on its own line followed by exactly that many bytes,
//! with no terminator. Readers keep reading until the declared count has
//! been consumed, however the transport splits it.

use std::borrow::Cow;
use std::io;
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum length of a single line, excluding the terminator (8 KB).
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Maximum declared content length (16 MB).
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Errors reading a framed message.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed in the middle of a message")]
    UnexpectedEof,

    #[error("line too long (max: {max} bytes)")]
    LineTooLong { max: usize },

    #[error("malformed {field}: {value:?}")]
    Malformed { field: &'static str, value: String },

    #[error("content too large: {len} bytes (max: {max})")]
    BodyTooLarge { len: usize, max: usize },

    #[error("content is not valid UTF-8")]
    InvalidUtf8,
}

impl FrameError {
    /// True if the peer sent something the protocol does not allow, as
    /// opposed to the transport failing underneath it.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::UnexpectedEof)
    }
}

/// Reads one line, without its `\n` (or `\r\n`) terminator.
///
/// Returns `Ok(None)` if the peer closed the stream before sending anything.
/// A final line that ends at EOF without a terminator is returned as-is.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = (MAX_LINE_LEN + 1) as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_LEN {
        return Err(FrameError::LineTooLong { max: MAX_LINE_LEN });
    }

    String::from_utf8(buf).map(Some).map_err(|_| FrameError::InvalidUtf8)
}

/// Reads a line that must be present (the message is not complete without it).
pub async fn read_field<R>(reader: &mut R) -> Result<String, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    read_line(reader).await?.ok_or(FrameError::UnexpectedEof)
}

/// Reads a line and parses it as `T`.
pub async fn read_parsed<R, T>(reader: &mut R, field: &'static str) -> Result<T, FrameError>
where
    R: AsyncBufRead + Unpin,
    T: FromStr,
{
    let line = read_field(reader).await?;
    line.trim()
        .parse()
        .map_err(|_| FrameError::Malformed { field, value: line })
}

/// Reads a length line followed by exactly that many bytes of UTF-8 content.
pub async fn read_body<R>(reader: &mut R) -> Result<String, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let len: usize = read_parsed(reader, "length").await?;
    read_exact_body(reader, len).await
}

/// Reads exactly `len` bytes of UTF-8 content.
pub async fn read_exact_body<R>(reader: &mut R, len: usize) -> Result<String, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    if len > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLarge {
            len,
            max: MAX_BODY_LEN,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::UnexpectedEof
        } else {
            FrameError::Io(e)
        }
    })?;

    String::from_utf8(buf).map_err(|_| FrameError::InvalidUtf8)
}

/// Replaces line terminators so `text` can travel as a single field.
pub fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        Cow::Owned(text.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(text)
    }
}

/// Writes one `\n`-terminated field. Embedded terminators are flattened.
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(single_line(line).as_bytes()).await?;
    writer.write_all(b"\n").await
}

/// Writes a length line followed by the raw content bytes.
pub async fn write_body<W>(writer: &mut W, body: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_line(writer, &body.len().to_string()).await?;
    writer.write_all(body.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, BufReader};

    #[tokio::test]
    async fn test_read_line_strips_terminators() {
        let mut input: &[u8] = b"open\r\nresume\n";
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some("open"));
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some("resume"));
        assert_eq!(read_line(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_line_unterminated_final_line() {
        let mut input: &[u8] = b"exit";
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some("exit"));
    }

    #[tokio::test]
    async fn test_read_line_too_long() {
        let data = vec![b'x'; MAX_LINE_LEN + 10];
        let mut input: &[u8] = &data;
        assert!(matches!(
            read_line(&mut input).await,
            Err(FrameError::LineTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_body_keeps_embedded_newlines() {
        let mut input: &[u8] = b"11\nline1\nline2get\n";
        assert_eq!(read_body(&mut input).await.unwrap(), "line1\nline2");
        // The next field starts right after the declared bytes
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some("get"));
    }

    #[tokio::test]
    async fn test_read_body_across_partial_reads() {
        let (client, server) = duplex(4);
        let mut reader = BufReader::new(server);

        let writer = tokio::spawn(async move {
            let mut client = client;
            for chunk in [&b"1"[..], b"0\nab", b"c\nd", b"efghij"] {
                client.write_all(chunk).await.unwrap();
                client.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        assert_eq!(read_body(&mut reader).await.unwrap(), "abc\ndefghi");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_body_malformed_length() {
        let mut input: &[u8] = b"ten\nabc";
        let err = read_body(&mut input).await.unwrap_err();
        assert!(matches!(err, FrameError::Malformed { field: "length", .. }));
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_read_body_short_content_is_eof() {
        let mut input: &[u8] = b"10\nabc";
        let err = read_body(&mut input).await.unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof));
        assert!(!err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_read_body_rejects_oversized_length() {
        let data = format!("{}\n", MAX_BODY_LEN + 1);
        let mut input: &[u8] = data.as_bytes();
        assert!(matches!(
            read_body(&mut input).await,
            Err(FrameError::BodyTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_body_then_read_back() {
        let mut out = Vec::new();
        write_line(&mut out, "success").await.unwrap();
        write_body(&mut out, "a\nb").await.unwrap();
        assert_eq!(out, b"success\n3\na\nb");
    }

    #[test]
    fn test_single_line_flattens_terminators() {
        assert_eq!(single_line("no\nsuch\r\nkey"), "no such  key");
        assert!(matches!(single_line("plain"), Cow::Borrowed(_)));
    }
}
