//! UDP serving loop for the port registry.
//!
//! Datagrams are handled strictly one at a time: each request is decoded,
//! applied to the registry and answered before the next one is read.

use std::io;
use std::net::SocketAddr;

use chrono::Utc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use svc_protocol::{PrsMessage, PRS_MESSAGE_LEN};

use super::LeaseRegistry;

/// Receive buffer size. One byte larger than a datagram so oversized
/// datagrams are detected rather than silently truncated.
const RECV_BUFFER_LEN: usize = PRS_MESSAGE_LEN + 1;

/// Errors that stop the registry server.
#[derive(Debug, Error)]
pub enum PrsServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Port registry bound to a UDP socket.
pub struct PrsServer {
    socket: UdpSocket,
    registry: LeaseRegistry,
    cancel_token: CancellationToken,
}

impl PrsServer {
    /// Binds the registry socket.
    pub async fn bind(
        addr: SocketAddr,
        registry: LeaseRegistry,
        cancel_token: CancellationToken,
    ) -> Result<Self, PrsServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| PrsServerError::Bind { addr, source })?;

        Ok(Self {
            socket,
            registry,
            cancel_token,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PrsServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn registry(&self) -> &LeaseRegistry {
        &self.registry
    }

    /// Serves requests until a STOP is handled or the token is cancelled.
    ///
    /// Returns the registry in its final state.
    pub async fn run(mut self) -> Result<LeaseRegistry, PrsServerError> {
        info!(
            addr = %self.local_addr()?,
            ports = %self.registry.range(),
            timeout_secs = self.registry.keep_alive_timeout().as_secs(),
            "Port registry listening"
        );

        let mut buf = [0u8; RECV_BUFFER_LEN];

        while !self.registry.is_stopped() {
            let (len, peer) = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Registry shutdown requested");
                    break;
                }

                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP errors from earlier sends surface here; keep serving
                        warn!(error = %e, "Failed to receive datagram");
                        continue;
                    }
                },
            };

            self.handle_datagram(buf.get(..len).unwrap_or(&[]), peer).await;
        }

        info!(leased = self.registry.leased_count(), "Port registry stopped");
        Ok(self.registry)
    }

    async fn handle_datagram(&mut self, data: &[u8], peer: SocketAddr) {
        let request = match PrsMessage::decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(peer = %peer, len = data.len(), error = %e, "Dropping undecodable datagram");
                return;
            }
        };

        debug!(peer = %peer, request = %request, "Received request");
        let response = self.registry.handle_message(&request, Utc::now());

        if let Err(e) = self.socket.send_to(&response.encode(), peer).await {
            error!(peer = %peer, error = %e, "Failed to send response");
        }
    }
}
