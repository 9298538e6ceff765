//! Port registry (PRS).
//!
//! Services lease a port from a fixed pool under a name and keep the lease
//! alive; clients find a service's port by name. Leases that are not kept
//! alive lapse and are reclaimed the next time a port is requested.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  datagram  ┌─────────────┐  handle_message  ┌──────────────────┐
//! │  PRS client │───────────▶│  PrsServer  │─────────────────▶│  LeaseRegistry   │
//! └─────────────┘◀───────────│ (UDP loop)  │◀─────────────────│ Vec<Reservation> │
//!                  response  └─────────────┘     PrsMessage   └──────────────────┘
//! ```
//!
//! The registry is owned outright by the serving loop; there is no
//! concurrent access to guard against.

mod registry;
mod server;

pub use registry::{Lease, LeaseError, LeaseRegistry, PortReservation};
pub use server::{PrsServer, PrsServerError};
