//! svc Protocol - Wire protocols for the svc services
//!
//! This crate provides message types and codecs for:
//! - `prs` - the fixed-size port registry datagram
//! - `sd` - the session daemon line protocol
//! - `ft` - the file transfer line protocol
//!
//! The two TCP protocols share the framing in `frame`: every field is a
//! `\n`-terminated line, and content is sent as a length line followed by
//! exactly that many raw bytes, so content may itself contain newlines.

pub mod frame;
pub mod ft;
pub mod prs;
pub mod sd;

pub use frame::{FrameError, MAX_BODY_LEN, MAX_LINE_LEN};
pub use ft::{FtReply, FtRequest};
pub use prs::{MessageType, PrsCodecError, PrsMessage, Status, PRS_MESSAGE_LEN};
pub use sd::{SdReplyKind, SdRequest, SdResponse};
