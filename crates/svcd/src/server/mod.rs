//! TCP server for the SD and FT services.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns one task per accepted connection, running a [`ConnectionService`]
//! - Stops accepting when its CancellationToken is triggered
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    TcpServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   Connection    │────▶│  SdService      │──▶ SessionHandle
//! │ (task per peer) │     │  or FtService   │──▶ document root
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! In-flight connections are not drained on shutdown; each ends when its
//! client disconnects or the process exits.
//!
//! # Panic-Free Guarantees
//!
//! Accept failures are logged and the listener keeps running. A failing
//! connection ends only its own task.

mod connection;
mod documents;
mod ft;
mod sd;

pub use connection::{Connection, ConnectionError, ConnectionReader, ConnectionWriter};
pub use documents::DocumentError;
pub use ft::FtService;
pub use sd::{SdService, SdState};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Protocol spoken on each accepted connection.
#[async_trait]
pub trait ConnectionService: Send + Sync + 'static {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Serves one connection until the client leaves or the protocol is
    /// violated. The caller tears the connection down afterwards.
    async fn serve(&self, conn: &mut Connection) -> Result<(), ConnectionError>;
}

/// TCP listener dispatching each connection to a service.
pub struct TcpServer<S> {
    listener: TcpListener,
    service: Arc<S>,
    cancel_token: CancellationToken,
    connection_counter: AtomicU64,
}

impl<S: ConnectionService> TcpServer<S> {
    /// Binds the listening socket.
    pub async fn bind(
        addr: SocketAddr,
        service: S,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            service: Arc::new(service),
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(
            service = self.service.name(),
            addr = %self.local_addr()?,
            "Server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(service = self.service.name(), "Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawns the task that serves one connection and then tears it down.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, connection_number: u64) {
        let service = Arc::clone(&self.service);

        tokio::spawn(async move {
            let service_name = service.name();
            debug!(service = service_name, connection = connection_number, peer = %peer, "Client connected");

            let mut conn = Connection::new(stream, peer, connection_number);

            match service.serve(&mut conn).await {
                Ok(()) => {}
                Err(ConnectionError::ProtocolViolation(reason)) => {
                    warn!(
                        service = service_name,
                        connection = connection_number,
                        reason = %reason,
                        "Dropping client after protocol violation"
                    );
                }
                Err(e) => {
                    debug!(
                        service = service_name,
                        connection = connection_number,
                        error = %e,
                        "Connection ended with error"
                    );
                }
            }

            conn.close().await;
            debug!(service = service_name, connection = connection_number, "Client connection closed");
        });
    }
}

/// Errors that stop a TCP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
