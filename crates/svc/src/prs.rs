//! Port registry client.
//!
//! Every operation is one datagram out and one datagram back over a fresh
//! ephemeral socket, bounded by a receive timeout.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use svc_core::ServiceName;
use svc_protocol::{MessageType, PrsMessage, PRS_MESSAGE_LEN};

use crate::error::{ClientError, Result};

/// Default time to wait for a registry response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Finds the port a named service is listening on.
#[async_trait]
pub trait PortLookup: Send + Sync {
    /// Returns the port currently leased to `service`.
    async fn lookup(&self, service: &ServiceName) -> Result<u16>;
}

/// Resolves `service` to a socket address on `host`.
pub async fn resolve_service(
    lookup: &dyn PortLookup,
    host: IpAddr,
    service: &ServiceName,
) -> Result<SocketAddr> {
    let port = lookup.lookup(service).await?;
    Ok(SocketAddr::new(host, port))
}

/// Client for the port registry.
#[derive(Debug, Clone)]
pub struct PrsClient {
    registry: SocketAddr,
    timeout: Duration,
}

impl PrsClient {
    pub fn new(registry: SocketAddr) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets how long to wait for each response.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry_addr(&self) -> SocketAddr {
        self.registry
    }

    /// Sends one request and returns the registry's response, whatever its
    /// status.
    pub async fn send(&self, request: &PrsMessage) -> Result<PrsMessage> {
        let local = match self.registry.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).await?;
        socket
            .connect(self.registry)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.registry,
                source,
            })?;

        debug!(registry = %self.registry, request = %request, "Sending registry request");
        socket.send(&request.encode()).await?;

        let mut buf = [0u8; PRS_MESSAGE_LEN + 1];
        let len = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ClientError::Timeout {
                addr: self.registry,
                timeout: self.timeout,
            })??;

        let response = PrsMessage::decode(buf.get(..len).unwrap_or(&[]))?;
        debug!(registry = %self.registry, response = %response, "Received registry response");

        if response.msg_type != MessageType::Response {
            return Err(ClientError::UnexpectedReply(response.to_string()));
        }
        Ok(response)
    }

    /// Leases a port for `service`.
    pub async fn request_port(&self, service: &ServiceName) -> Result<u16> {
        let response = self
            .send_expecting_success(&PrsMessage::request_port(service.clone()))
            .await?;
        Ok(response.port)
    }

    /// Refreshes the lease `service` holds on `port`.
    pub async fn keep_alive(&self, service: &ServiceName, port: u16) -> Result<()> {
        self.send_expecting_success(&PrsMessage::keep_alive(service.clone(), port))
            .await
            .map(|_| ())
    }

    /// Gives the lease `service` holds on `port` back to the registry.
    pub async fn close_port(&self, service: &ServiceName, port: u16) -> Result<()> {
        self.send_expecting_success(&PrsMessage::close_port(service.clone(), port))
            .await
            .map(|_| ())
    }

    /// Returns the port leased to `service`.
    pub async fn lookup_port(&self, service: &ServiceName) -> Result<u16> {
        let response = self
            .send_expecting_success(&PrsMessage::lookup_port(service.clone()))
            .await?;
        Ok(response.port)
    }

    /// Tells the registry to shut down.
    pub async fn stop(&self) -> Result<()> {
        self.send_expecting_success(&PrsMessage::stop())
            .await
            .map(|_| ())
    }

    async fn send_expecting_success(&self, request: &PrsMessage) -> Result<PrsMessage> {
        let response = self.send(request).await?;
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Registry {
                service: request.service_name.clone(),
                status: response.status,
            })
        }
    }
}

#[async_trait]
impl PortLookup for PrsClient {
    async fn lookup(&self, service: &ServiceName) -> Result<u16> {
        self.lookup_port(service).await
    }
}
