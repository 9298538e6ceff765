//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when constructing domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Service name exceeds the fixed datagram field
    #[error("Service name too long: {len} bytes (max: {max})")]
    ServiceNameTooLong { len: usize, max: usize },

    /// Service name contains bytes that cannot be carried on the wire
    #[error("Invalid service name {name:?}: {reason}")]
    InvalidServiceName { name: String, reason: String },

    /// Port range is empty or inverted
    #[error("Invalid port range {start}..={end}")]
    InvalidPortRange { start: u16, end: u16 },

    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
