//! svc daemons - port registry, session daemon and file transfer server
//!
//! This crate provides the server side of the svc suite:
//! - `lease` - Port registry (PRS): lease table and its UDP serving loop
//! - `session` - Session table actor shared by every SD connection
//! - `server` - TCP listener plus the SD and FT connection services
//! - `advertise` - Registers a TCP service with the PRS and keeps it alive
//! - `config` - Layered configuration (file, environment, CLI)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         svcd                                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌───────────────┐  datagram   ┌────────────────────────┐    │
//! │  │  PrsServer    │────────────▶│   LeaseRegistry        │    │
//! │  │ (UDP, serial) │             │ (ports ↔ service names)│    │
//! │  └───────────────┘             └────────────────────────┘    │
//! │          ▲ request/keep-alive/close                          │
//! │          │                                                   │
//! │  ┌───────┴───────┐  accept()   ┌────────────────────────┐    │
//! │  │  Advertiser   │  TcpServer ▶│ SdService / FtService  │    │
//! │  └───────────────┘             │   (task per client)    │    │
//! │                                └───────────┬────────────┘    │
//! │                                            │ SessionCommand  │
//! │                                            ▼                 │
//! │                                ┌────────────────────────┐    │
//! │                                │  SessionActor          │    │
//! │                                │  (session state owner) │    │
//! │                                └────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate does not call `.unwrap()`, `.expect()`,
//! `panic!()` or `unreachable!()`. Channel closure surfaces as an error
//! value and transport faults end only the connection they occur on.

pub mod advertise;
pub mod cli;
pub mod config;
pub mod lease;
pub mod server;
pub mod session;
