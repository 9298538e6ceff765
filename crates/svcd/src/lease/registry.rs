//! Lease table - owns every port reservation and applies PRS requests to it.
//!
//! # Panic-Free Guarantees
//!
//! Reservations are looked up by iteration or `get`, never by indexing, and
//! elapsed-time arithmetic tolerates clocks that step backwards.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use svc_core::{PortRange, ServiceName};
use svc_protocol::{MessageType, PrsMessage, Status};

// ============================================================================
// Errors
// ============================================================================

/// Failures of individual registry operations. Both are ordinary outcomes
/// reported back to the requester as a response status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("all ports are busy")]
    AllPortsBusy,

    #[error("service not found: {name}")]
    ServiceNotFound { name: ServiceName },
}

impl LeaseError {
    /// Wire status for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::AllPortsBusy => Status::AllPortsBusy,
            Self::ServiceNotFound { .. } => Status::ServiceNotFound,
        }
    }
}

// ============================================================================
// Port Reservation
// ============================================================================

/// A service's hold on a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub service_name: ServiceName,
    pub last_alive: DateTime<Utc>,
}

/// One port of the pool and the lease on it, if any.
///
/// A port is available exactly when it carries no lease, so an available
/// port can never have a service name attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortReservation {
    port: u16,
    lease: Option<Lease>,
}

impl PortReservation {
    fn new(port: u16) -> Self {
        Self { port, lease: None }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_available(&self) -> bool {
        self.lease.is_none()
    }

    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    pub fn service_name(&self) -> Option<&ServiceName> {
        self.lease.as_ref().map(|lease| &lease.service_name)
    }

    /// True if the port is leased and `timeout` or more has passed since
    /// its last keep-alive.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.lease.as_ref().is_some_and(|lease| {
            now.signed_duration_since(lease.last_alive)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= timeout)
        })
    }

    fn is_held_by(&self, service_name: &ServiceName, port: u16) -> bool {
        self.port == port && self.service_name() == Some(service_name)
    }

    fn reserve(&mut self, service_name: ServiceName, now: DateTime<Utc>) {
        self.lease = Some(Lease {
            service_name,
            last_alive: now,
        });
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if let Some(lease) = self.lease.as_mut() {
            lease.last_alive = now;
        }
    }

    fn release(&mut self) -> Option<Lease> {
        self.lease.take()
    }
}

// ============================================================================
// Lease Registry
// ============================================================================

/// Fixed pool of ports leased to named services.
///
/// Owned by a single serving loop; every method takes the current time so
/// that expiry is deterministic under test.
#[derive(Debug, Clone)]
pub struct LeaseRegistry {
    range: PortRange,
    reservations: Vec<PortReservation>,
    keep_alive_timeout: Duration,
    stopped: bool,
}

impl LeaseRegistry {
    /// Creates a registry with every port in `range` available.
    pub fn new(range: PortRange, keep_alive_timeout: Duration) -> Self {
        Self {
            range,
            reservations: range.iter().map(PortReservation::new).collect(),
            keep_alive_timeout,
            stopped: false,
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    /// All reservations in port order.
    pub fn reservations(&self) -> &[PortReservation] {
        &self.reservations
    }

    /// Reservation for `port`, if it is part of the pool.
    pub fn reservation(&self, port: u16) -> Option<&PortReservation> {
        self.range
            .offset_of(port)
            .and_then(|offset| self.reservations.get(offset))
    }

    /// Number of ports currently leased.
    pub fn leased_count(&self) -> usize {
        self.reservations.iter().filter(|r| !r.is_available()).count()
    }

    /// True once a STOP has been handled.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Releases every lease whose keep-alive has lapsed. Returns how many
    /// were released.
    pub fn reclaim_expired(&mut self, now: DateTime<Utc>) -> usize {
        let timeout = self.keep_alive_timeout;
        let mut reclaimed = 0;

        for reservation in &mut self.reservations {
            if reservation.is_expired(now, timeout) {
                if let Some(lease) = reservation.release() {
                    info!(
                        port = reservation.port,
                        service = %lease.service_name,
                        "Lease expired, port reclaimed"
                    );
                    reclaimed += 1;
                }
            }
        }

        reclaimed
    }

    /// Leases the lowest available port to `service_name`.
    ///
    /// Expired leases are reclaimed first, so a lapsed port can be handed
    /// straight to the next requester.
    pub fn request_port(
        &mut self,
        service_name: &ServiceName,
        now: DateTime<Utc>,
    ) -> Result<u16, LeaseError> {
        self.reclaim_expired(now);

        let reservation = self
            .reservations
            .iter_mut()
            .find(|r| r.is_available())
            .ok_or(LeaseError::AllPortsBusy)?;

        reservation.reserve(service_name.clone(), now);
        Ok(reservation.port)
    }

    /// Refreshes the lease `service_name` holds on `port`.
    pub fn keep_alive(
        &mut self,
        service_name: &ServiceName,
        port: u16,
        now: DateTime<Utc>,
    ) -> Result<(), LeaseError> {
        let reservation = self.held_mut(service_name, port)?;
        reservation.touch(now);
        Ok(())
    }

    /// Releases the lease `service_name` holds on `port`.
    pub fn close_port(&mut self, service_name: &ServiceName, port: u16) -> Result<(), LeaseError> {
        let reservation = self.held_mut(service_name, port)?;
        reservation.release();
        Ok(())
    }

    /// Port leased to `service_name`. If the name holds several leases the
    /// lowest port wins.
    pub fn lookup_port(&self, service_name: &ServiceName) -> Result<u16, LeaseError> {
        self.reservations
            .iter()
            .find(|r| r.service_name() == Some(service_name))
            .map(PortReservation::port)
            .ok_or_else(|| LeaseError::ServiceNotFound {
                name: service_name.clone(),
            })
    }

    /// Puts the registry into its terminal stopped state.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Applies one request and builds the response to send back.
    pub fn handle_message(&mut self, msg: &PrsMessage, now: DateTime<Utc>) -> PrsMessage {
        let name = &msg.service_name;

        let response = match msg.msg_type {
            MessageType::RequestPort => match self.request_port(name, now) {
                Ok(port) => PrsMessage::response(name.clone(), port, Status::Success),
                Err(e) => PrsMessage::response(name.clone(), 0, e.status()),
            },
            MessageType::KeepAlive => match self.keep_alive(name, msg.port, now) {
                Ok(()) => PrsMessage::response(name.clone(), msg.port, Status::Success),
                Err(e) => PrsMessage::response(name.clone(), msg.port, e.status()),
            },
            MessageType::ClosePort => match self.close_port(name, msg.port) {
                Ok(()) => PrsMessage::response(name.clone(), msg.port, Status::Success),
                Err(e) => PrsMessage::response(name.clone(), msg.port, e.status()),
            },
            MessageType::LookupPort => match self.lookup_port(name) {
                Ok(port) => PrsMessage::response(name.clone(), port, Status::Success),
                Err(e) => PrsMessage::response(name.clone(), msg.port, e.status()),
            },
            MessageType::Stop => {
                self.stop();
                PrsMessage::response(ServiceName::empty(), 0, Status::Success)
            }
            MessageType::Response => {
                warn!(request = %msg, "Received a RESPONSE as a request");
                PrsMessage::response(name.clone(), msg.port, Status::InvalidArg)
            }
        };

        debug!(request = %msg, response = %response, "Handled registry request");
        response
    }

    fn held_mut(
        &mut self,
        service_name: &ServiceName,
        port: u16,
    ) -> Result<&mut PortReservation, LeaseError> {
        self.range
            .offset_of(port)
            .and_then(|offset| self.reservations.get_mut(offset))
            .filter(|r| r.is_held_by(service_name, port))
            .ok_or_else(|| LeaseError::ServiceNotFound {
                name: service_name.clone(),
            })
    }
}
