//! Integration tests for the session daemon over real TCP connections.
//!
//! Sessions live in the daemon, not in the connection: most of these tests
//! open a session on one connection and pick it up from another.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use svc_client::{ClientError, SdClient};
use svc_core::SessionId;
use svcd::server::{SdService, TcpServer};
use svcd::session::spawn_session_table;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Longest a raw read waits for the server
const READ_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestDaemon {
    addr: SocketAddr,
    cancel_token: CancellationToken,
    docs: TempDir,
}

impl TestDaemon {
    async fn spawn() -> Self {
        let docs = tempfile::tempdir().expect("create temp dir");
        let service = SdService::new(spawn_session_table(), docs.path());
        let cancel_token = CancellationToken::new();

        let server = TcpServer::bind("127.0.0.1:0".parse().unwrap(), service, cancel_token.clone())
            .await
            .expect("bind session daemon");
        let addr = server.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            cancel_token,
            docs,
        }
    }

    async fn client(&self) -> SdClient {
        SdClient::connect(self.addr).await.expect("connect")
    }

    async fn raw(&self) -> RawClient {
        RawClient::connect(self.addr).await
    }

    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

/// Line-level access for requests the typed client refuses to send.
struct RawClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("reply in time")
            .expect("read line");
        line.trim_end_matches('\n').to_string()
    }

    /// Asserts the server has closed the connection.
    async fn expect_closed(&mut self) {
        let mut rest = Vec::new();
        let n = timeout(READ_TIMEOUT, self.reader.read_to_end(&mut rest))
            .await
            .expect("close in time")
            .expect("read to end");
        assert_eq!(n, 0, "unexpected trailing bytes: {rest:?}");
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_survives_reconnect() {
    let daemon = TestDaemon::spawn().await;

    let mut first = daemon.client().await;
    let id = first.open().await.unwrap();
    assert_eq!(id, SessionId::FIRST);
    first.post("colour", "green").await.unwrap();
    first.disconnect().await.unwrap();

    let mut second = daemon.client().await;
    second.resume(id).await.unwrap();
    assert_eq!(second.get("colour").await.unwrap(), "green");

    second.close(id).await.unwrap();
    second.disconnect().await.unwrap();

    let mut third = daemon.client().await;
    let err = third.resume(id).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(ref reason) if reason == "Invalid session id"), "got {err}");

    daemon.shutdown();
}

#[tokio::test]
async fn test_concurrent_opens_get_unique_ids() {
    let daemon = TestDaemon::spawn().await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let addr = daemon.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = SdClient::connect(addr).await.unwrap();
            client.open().await.unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        assert!(ids.insert(task.await.unwrap()), "duplicate session id");
    }
    assert_eq!(ids.len(), 20);

    daemon.shutdown();
}

#[tokio::test]
async fn test_multiline_value_round_trips() {
    let daemon = TestDaemon::spawn().await;
    let body = "first line\nsecond line\n\nlast";

    let mut client = daemon.client().await;
    client.open().await.unwrap();
    client.post("letter", body).await.unwrap();
    assert_eq!(client.get("letter").await.unwrap(), body);

    // Posting again replaces the value
    client.post("letter", "short").await.unwrap();
    assert_eq!(client.get("letter").await.unwrap(), "short");

    daemon.shutdown();
}

#[tokio::test]
async fn test_close_unbinds_only_the_closed_session() {
    let daemon = TestDaemon::spawn().await;

    let mut other = daemon.client().await;
    let other_id = other.open().await.unwrap();

    let mut client = daemon.client().await;
    let id = client.open().await.unwrap();

    // Closing someone else's session keeps this connection bound
    client.close(other_id).await.unwrap();
    client.post("k", "v").await.unwrap();

    client.close(id).await.unwrap();
    let err = client.get("k").await.unwrap_err();
    assert!(matches!(err, ClientError::Server(ref msg) if msg == "No open session"), "got {err}");

    // Now unbound, a fresh open works on the same connection
    let reopened = client.open().await.unwrap();
    assert_ne!(reopened, id);

    daemon.shutdown();
}

#[tokio::test]
async fn test_session_errors_keep_connection_open() {
    let daemon = TestDaemon::spawn().await;
    let mut client = daemon.client().await;

    let err = client.get("anything").await.unwrap_err();
    assert!(matches!(err, ClientError::Server(ref msg) if msg == "No open session"), "got {err}");

    let id = client.open().await.unwrap();

    let err = client.open().await.unwrap_err();
    assert!(matches!(err, ClientError::Server(ref msg) if msg == "Session already open!"), "got {err}");

    let err = client.resume(id).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Server(ref msg) if msg == "Session already open, cannot resume!"),
        "got {err}"
    );

    let err = client.get("missing").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Server(ref msg) if msg == &format!("Unknown key missing for session {id}")),
        "got {err}"
    );

    let err = client.close(SessionId::new(999)).await.unwrap_err();
    assert!(matches!(err, ClientError::Server(ref msg) if msg == "Unknown session id 999"), "got {err}");

    // Still usable
    client.post("k", "v").await.unwrap();
    assert_eq!(client.get("k").await.unwrap(), "v");

    daemon.shutdown();
}

// ============================================================================
// Documents
// ============================================================================

#[tokio::test]
async fn test_get_file_from_document_root() {
    let daemon = TestDaemon::spawn().await;
    std::fs::write(daemon.docs.path().join("index.html"), "<h1>hello</h1>\n").unwrap();

    let mut client = daemon.client().await;
    client.open().await.unwrap();
    assert_eq!(client.get("/index.html").await.unwrap(), "<h1>hello</h1>\n");

    let err = client.get("/missing.html").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Server(ref msg) if msg == "File /missing.html does not exist"),
        "got {err}"
    );

    let err = client.get("/../etc/passwd").await.unwrap_err();
    assert!(matches!(err, ClientError::Server(_)), "got {err}");

    daemon.shutdown();
}

#[tokio::test]
async fn test_post_to_file_path_is_refused() {
    let daemon = TestDaemon::spawn().await;

    let mut client = daemon.client().await;
    client.open().await.unwrap();

    let err = client.post("/index.html", "overwrite").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Server(ref msg) if msg == "Cannot post to file path /index.html"),
        "got {err}"
    );
    assert!(!daemon.docs.path().join("index.html").exists());

    // The body was consumed; the next request parses cleanly
    client.post("ok", "fine").await.unwrap();

    daemon.shutdown();
}

// ============================================================================
// Protocol violations
// ============================================================================

#[tokio::test]
async fn test_unknown_verb_closes_connection() {
    let daemon = TestDaemon::spawn().await;
    let mut raw = daemon.raw().await;

    raw.send(b"delete\n").await;
    assert_eq!(raw.line().await, "error");
    assert_eq!(raw.line().await, "Invalid message delete");
    raw.expect_closed().await;

    daemon.shutdown();
}

#[tokio::test]
async fn test_malformed_length_closes_connection() {
    let daemon = TestDaemon::spawn().await;
    let mut raw = daemon.raw().await;

    raw.send(b"open\n").await;
    assert_eq!(raw.line().await, "accepted");
    assert_eq!(raw.line().await, "1");

    raw.send(b"post\nnotes\nlots\n").await;
    assert_eq!(raw.line().await, "error");
    assert!(raw.line().await.contains("length"));
    raw.expect_closed().await;

    daemon.shutdown();
}

#[tokio::test]
async fn test_raw_wire_format() {
    let daemon = TestDaemon::spawn().await;
    let mut raw = daemon.raw().await;

    raw.send(b"open\npost\nnotes\n6\nhi\nyo\nget\nnotes\n").await;
    assert_eq!(raw.line().await, "accepted");
    assert_eq!(raw.line().await, "1");
    assert_eq!(raw.line().await, "success");
    assert_eq!(raw.line().await, "success");
    assert_eq!(raw.line().await, "notes");
    assert_eq!(raw.line().await, "6");
    assert_eq!(raw.line().await, "hi");
    assert_eq!(raw.line().await, "yo");

    raw.send(b"resume\n1\n").await;
    assert_eq!(raw.line().await, "error");
    assert_eq!(raw.line().await, "Session already open, cannot resume!");

    daemon.shutdown();
}
