//! svc clients
//!
//! - `prs` - Port registry client and the [`PortLookup`] interface
//! - `sd` - Session daemon client
//! - `ft` - File transfer client
//! - `cli` - The `svc` command-line tool
//!
//! SD and FT servers lease their ports from the registry, so clients
//! normally find them by name:
//!
//! ```rust,ignore
//! let prs = PrsClient::new("127.0.0.1:30000".parse()?);
//! let addr = resolve_service(&prs, host, &ServiceName::new("SD Server")?).await?;
//! let mut sd = SdClient::connect(addr).await?;
//! let id = sd.open().await?;
//! ```

pub mod cli;
pub mod error;
pub mod ft;
pub mod prs;
pub mod sd;

pub use error::{ClientError, Result};
pub use ft::{save_files, FetchedFile, FtClient};
pub use prs::{resolve_service, PortLookup, PrsClient, DEFAULT_TIMEOUT};
pub use sd::SdClient;
