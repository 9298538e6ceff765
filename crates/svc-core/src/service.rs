//! Service names and the port pool they lease from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::{DomainError, DomainResult};

/// Maximum length in bytes of a service name on the wire.
pub const MAX_SERVICE_NAME_LEN: usize = 50;

/// Name under which a service advertises itself in the registry.
///
/// Names are ASCII, at most [`MAX_SERVICE_NAME_LEN`] bytes and contain no
/// NUL bytes (the datagram pads the field with NULs). The empty name is
/// valid; it is what STOP requests and their responses carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a validated service name.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();

        if name.len() > MAX_SERVICE_NAME_LEN {
            return Err(DomainError::ServiceNameTooLong {
                len: name.len(),
                max: MAX_SERVICE_NAME_LEN,
            });
        }
        if !name.is_ascii() {
            return Err(DomainError::InvalidServiceName {
                name,
                reason: "must be ASCII".to_string(),
            });
        }
        if name.contains('\0') {
            return Err(DomainError::InvalidServiceName {
                name,
                reason: "must not contain NUL".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// The empty name.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ServiceName {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Contiguous, inclusive range of ports the registry leases from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Creates a range `start..=end`. Fails if `start > end` or `start == 0`.
    pub fn new(start: u16, end: u16) -> DomainResult<Self> {
        if start == 0 || start > end {
            return Err(DomainError::InvalidPortRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Always false; a valid range holds at least one port.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }

    /// Offset of `port` from the start of the range.
    pub fn offset_of(&self, port: u16) -> Option<usize> {
        self.contains(port)
            .then(|| usize::from(port - self.start))
    }

    pub fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_accepts_spaces_and_empty() {
        assert_eq!(ServiceName::new("SD Server").unwrap().as_str(), "SD Server");
        assert!(ServiceName::new("").unwrap().is_empty());
    }

    #[test]
    fn test_service_name_length_limit() {
        assert!(ServiceName::new("x".repeat(MAX_SERVICE_NAME_LEN)).is_ok());

        let err = ServiceName::new("x".repeat(MAX_SERVICE_NAME_LEN + 1)).unwrap_err();
        assert_eq!(
            err,
            DomainError::ServiceNameTooLong {
                len: MAX_SERVICE_NAME_LEN + 1,
                max: MAX_SERVICE_NAME_LEN
            }
        );
    }

    #[test]
    fn test_service_name_rejects_nul_and_non_ascii() {
        assert!(ServiceName::new("a\0b").is_err());
        assert!(ServiceName::new("dienst-ä").is_err());
    }

    #[test]
    fn test_port_range_bounds() {
        let range = PortRange::new(40000, 40099).unwrap();
        assert_eq!(range.len(), 100);
        assert!(range.contains(40000));
        assert!(range.contains(40099));
        assert!(!range.contains(40100));
        assert_eq!(range.offset_of(40005), Some(5));
        assert_eq!(range.offset_of(39999), None);
        assert_eq!(range.iter().next(), Some(40000));
    }

    #[test]
    fn test_port_range_single_port() {
        let range = PortRange::new(5000, 5000).unwrap();
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_port_range_rejects_inverted_and_zero() {
        assert!(PortRange::new(40100, 40000).is_err());
        assert!(PortRange::new(0, 10).is_err());
    }
}
