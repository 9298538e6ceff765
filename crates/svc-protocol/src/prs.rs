//! Port registry datagram.
//!
//! Every PRS message, request or response, is one fixed-size datagram:
//!
//! ```text
//! ┌──────────┬──────────────────────────┬───────────┬────────┐
//! │ type (1) │ service name (50, NUL-   │ port (2,  │ status │
//! │          │ padded ASCII)            │ big-end.) │  (1)   │
//! └──────────┴──────────────────────────┴───────────┴────────┘
//! ```
//!
//! Status is only meaningful on `RESPONSE`; requests carry `SUCCESS`.

use std::fmt;

use svc_core::{DomainError, ServiceName, MAX_SERVICE_NAME_LEN};
use thiserror::Error;

/// Size of every PRS datagram in bytes.
pub const PRS_MESSAGE_LEN: usize = 1 + MAX_SERVICE_NAME_LEN + 2 + 1;

/// Kind of PRS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    RequestPort = 0,
    KeepAlive = 1,
    ClosePort = 2,
    LookupPort = 3,
    Stop = 4,
    Response = 5,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestPort => "REQUEST_PORT",
            Self::KeepAlive => "KEEP_ALIVE",
            Self::ClosePort => "CLOSE_PORT",
            Self::LookupPort => "LOOKUP_PORT",
            Self::Stop => "STOP",
            Self::Response => "RESPONSE",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = PrsCodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RequestPort),
            1 => Ok(Self::KeepAlive),
            2 => Ok(Self::ClosePort),
            3 => Ok(Self::LookupPort),
            4 => Ok(Self::Stop),
            5 => Ok(Self::Response),
            other => Err(PrsCodecError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome carried by a `RESPONSE`.
///
/// The registry itself only produces `Success`, `ServiceNotFound` and
/// `AllPortsBusy`; the remaining codes are part of the wire vocabulary and
/// are decoded so that peers using them are understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Status {
    #[default]
    Success = 0,
    ServiceInUse = 1,
    ServiceNotFound = 2,
    AllPortsBusy = 3,
    InvalidArg = 4,
    UndefinedError = 5,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::ServiceInUse => "SERVICE_IN_USE",
            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::AllPortsBusy => "ALL_PORTS_BUSY",
            Self::InvalidArg => "INVALID_ARG",
            Self::UndefinedError => "UNDEFINED_ERROR",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }
}

impl TryFrom<u8> for Status {
    type Error = PrsCodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::ServiceInUse),
            2 => Ok(Self::ServiceNotFound),
            3 => Ok(Self::AllPortsBusy),
            4 => Ok(Self::InvalidArg),
            5 => Ok(Self::UndefinedError),
            other => Err(PrsCodecError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One PRS datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrsMessage {
    pub msg_type: MessageType,
    pub service_name: ServiceName,
    pub port: u16,
    pub status: Status,
}

impl PrsMessage {
    /// Creates a message with an explicit type, name, port and status.
    pub fn new(msg_type: MessageType, service_name: ServiceName, port: u16, status: Status) -> Self {
        Self {
            msg_type,
            service_name,
            port,
            status,
        }
    }

    /// Creates a request-port message.
    pub fn request_port(service_name: ServiceName) -> Self {
        Self::new(MessageType::RequestPort, service_name, 0, Status::Success)
    }

    /// Creates a keep-alive message for a held reservation.
    pub fn keep_alive(service_name: ServiceName, port: u16) -> Self {
        Self::new(MessageType::KeepAlive, service_name, port, Status::Success)
    }

    /// Creates a close-port message for a held reservation.
    pub fn close_port(service_name: ServiceName, port: u16) -> Self {
        Self::new(MessageType::ClosePort, service_name, port, Status::Success)
    }

    /// Creates a lookup-port message.
    pub fn lookup_port(service_name: ServiceName) -> Self {
        Self::new(MessageType::LookupPort, service_name, 0, Status::Success)
    }

    /// Creates a stop message.
    pub fn stop() -> Self {
        Self::new(MessageType::Stop, ServiceName::empty(), 0, Status::Success)
    }

    /// Creates a response.
    pub fn response(service_name: ServiceName, port: u16, status: Status) -> Self {
        Self::new(MessageType::Response, service_name, port, status)
    }

    /// Encodes the message into its fixed-size datagram.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PRS_MESSAGE_LEN);
        buf.push(self.msg_type as u8);
        buf.extend_from_slice(self.service_name.as_str().as_bytes());
        buf.resize(1 + MAX_SERVICE_NAME_LEN, 0);
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf.push(self.status as u8);
        buf
    }

    /// Decodes a datagram.
    ///
    /// # Errors
    ///
    /// Fails if the datagram is not exactly [`PRS_MESSAGE_LEN`] bytes, or the
    /// type, status or name field cannot be decoded.
    pub fn decode(data: &[u8]) -> Result<Self, PrsCodecError> {
        if data.len() != PRS_MESSAGE_LEN {
            return Err(PrsCodecError::WrongLength {
                len: data.len(),
                expected: PRS_MESSAGE_LEN,
            });
        }

        let (&type_byte, rest) = data
            .split_first()
            .ok_or(PrsCodecError::WrongLength { len: 0, expected: PRS_MESSAGE_LEN })?;
        let (name_field, rest) = rest.split_at(MAX_SERVICE_NAME_LEN);
        let (port_field, rest) = rest.split_at(2);
        let status_byte = rest.first().copied().ok_or(PrsCodecError::WrongLength {
            len: data.len(),
            expected: PRS_MESSAGE_LEN,
        })?;

        let msg_type = MessageType::try_from(type_byte)?;
        let status = Status::try_from(status_byte)?;

        let port_bytes: [u8; 2] = port_field.try_into().map_err(|_| PrsCodecError::WrongLength {
            len: data.len(),
            expected: PRS_MESSAGE_LEN,
        })?;
        let port = u16::from_be_bytes(port_bytes);

        // The name runs up to the first NUL of its padded field
        let name_bytes = name_field.split(|&b| b == 0).next().unwrap_or(&[]);
        let name = std::str::from_utf8(name_bytes).map_err(|_| {
            PrsCodecError::InvalidServiceName(DomainError::InvalidServiceName {
                name: String::from_utf8_lossy(name_bytes).into_owned(),
                reason: "must be ASCII".to_string(),
            })
        })?;
        let service_name = ServiceName::new(name).map_err(PrsCodecError::InvalidServiceName)?;

        Ok(Self {
            msg_type,
            service_name,
            port,
            status,
        })
    }
}

/// Debug rendering used by the reference interoperability tests:
/// `{RESPONSE, SVC1, 40000, SUCCESS}`.
impl fmt::Display for PrsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {}, {}, {}}}",
            self.msg_type, self.service_name, self.port, self.status
        )
    }
}

/// Errors decoding a PRS datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrsCodecError {
    #[error("datagram is {len} bytes (expected {expected})")]
    WrongLength { len: usize, expected: usize },

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("unknown status: {0}")]
    UnknownStatus(u8),

    #[error("invalid service name: {0}")]
    InvalidServiceName(DomainError),
}
