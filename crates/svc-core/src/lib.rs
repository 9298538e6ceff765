//! svc Core - Shared types for the svc services
//!
//! This crate provides the domain types shared between the daemons
//! (`svcd`) and the client library (`svc-client`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use service::{PortRange, ServiceName, MAX_SERVICE_NAME_LEN};
pub use session::SessionId;
