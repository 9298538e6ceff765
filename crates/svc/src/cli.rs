//! `svc` - command-line client for the port registry, session daemon and
//! file transfer server.
//!
//! # Usage
//!
//! ```bash
//! # Registry operations
//! svc prs request "SD Server"
//! svc prs lookup "SD Server"
//! svc prs stop
//!
//! # Open a session and store a value (body from stdin)
//! echo hello | svc sd --open --post greeting
//!
//! # Resume it later from a new connection
//! svc sd --resume 1 --get greeting
//!
//! # Fetch the .txt files of a directory
//! svc ft --dir docs --out ./fetched
//!
//! # Enable debug logging
//! RUST_LOG=svc_client=debug svc prs lookup "FT Server"
//! ```

use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use svc_core::{ServiceName, SessionId};

use crate::{resolve_service, save_files, FtClient, PrsClient, SdClient};

/// svc - client for the port registry, session daemon and file server
#[derive(Parser, Debug)]
#[command(name = "svc", version, about)]
struct Cli {
    /// Address of the port registry
    #[arg(long, global = true, default_value = "127.0.0.1:30000")]
    prs: SocketAddr,

    /// Milliseconds to wait for a registry response
    #[arg(long, global = true, default_value_t = 2000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Talk to the port registry directly
    Prs {
        #[command(subcommand)]
        op: PrsOp,
    },
    /// One round of session daemon requests
    Sd(SdArgs),
    /// Fetch a directory from the file server
    Ft(FtArgs),
}

#[derive(Subcommand, Debug)]
enum PrsOp {
    /// Lease a port for a service
    Request { service: String },
    /// Refresh a held lease
    KeepAlive { service: String, port: u16 },
    /// Give a lease back
    Close { service: String, port: u16 },
    /// Find the port a service is on
    Lookup { service: String },
    /// Shut the registry down
    Stop,
}

/// Where to find a TCP service: an explicit address, or a registry lookup.
#[derive(Args, Debug)]
struct Target {
    /// Connect here instead of asking the registry
    #[arg(long)]
    server: Option<SocketAddr>,

    /// Host the service runs on (defaults to the registry's host)
    #[arg(long)]
    host: Option<IpAddr>,
}

#[derive(Args, Debug)]
struct SdArgs {
    #[command(flatten)]
    target: Target,

    /// Service name to look up in the registry
    #[arg(long, default_value = "SD Server")]
    service: String,

    /// Open a new session
    #[arg(long, conflicts_with = "resume")]
    open: bool,

    /// Resume an existing session
    #[arg(long, value_name = "ID")]
    resume: Option<SessionId>,

    /// Close a session after the other requests
    #[arg(long, value_name = "ID")]
    close: Option<SessionId>,

    /// Print a value (or a `/`-prefixed file) from the session
    #[arg(long, value_name = "NAME", conflicts_with = "post")]
    get: Option<String>,

    /// Store stdin as a value in the session
    #[arg(long, value_name = "NAME")]
    post: Option<String>,
}

#[derive(Args, Debug)]
struct FtArgs {
    #[command(flatten)]
    target: Target,

    /// Service name to look up in the registry
    #[arg(long, default_value = "FT Server")]
    service: String,

    /// Directory to fetch, relative to the server's root
    #[arg(long)]
    dir: String,

    /// Save fetched files here instead of printing them
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Entry point for the `svc` binary.
pub fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

#[tokio::main]
async fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("svc_client=warn".parse()?),
        )
        .init();

    let prs = PrsClient::new(cli.prs).with_timeout(Duration::from_millis(cli.timeout_ms));

    match cli.command {
        Command::Prs { op } => run_prs(&prs, op).await,
        Command::Sd(args) => run_sd(&prs, args).await,
        Command::Ft(args) => run_ft(&prs, args).await,
    }
}

async fn run_prs(prs: &PrsClient, op: PrsOp) -> Result<()> {
    match op {
        PrsOp::Request { service } => {
            let port = prs.request_port(&ServiceName::new(service)?).await?;
            println!("{port}");
        }
        PrsOp::KeepAlive { service, port } => {
            prs.keep_alive(&ServiceName::new(service)?, port).await?;
        }
        PrsOp::Close { service, port } => {
            prs.close_port(&ServiceName::new(service)?, port).await?;
        }
        PrsOp::Lookup { service } => {
            let port = prs.lookup_port(&ServiceName::new(service)?).await?;
            println!("{port}");
        }
        PrsOp::Stop => prs.stop().await?,
    }
    Ok(())
}

async fn locate(prs: &PrsClient, target: &Target, service: &str) -> Result<SocketAddr> {
    if let Some(addr) = target.server {
        return Ok(addr);
    }

    let name = ServiceName::new(service)?;
    let host = target.host.unwrap_or_else(|| prs.registry_addr().ip());
    resolve_service(prs, host, &name)
        .await
        .with_context(|| format!("Failed to locate {service:?} via registry {}", prs.registry_addr()))
}

async fn run_sd(prs: &PrsClient, args: SdArgs) -> Result<()> {
    if !args.open && args.resume.is_none() && args.close.is_none() {
        bail!("Nothing to do: pass --open, --resume or --close");
    }
    if (args.get.is_some() || args.post.is_some()) && !args.open && args.resume.is_none() {
        bail!("--get and --post need a session: pass --open or --resume");
    }

    let addr = locate(prs, &args.target, &args.service).await?;
    let mut client = SdClient::connect(addr).await?;

    if args.open {
        let id = client.open().await?;
        eprintln!("Opened session {id}");
    } else if let Some(id) = args.resume {
        client.resume(id).await?;
    }

    if let Some(name) = &args.get {
        let body = client.get(name).await?;
        print!("{body}");
    }

    if let Some(name) = &args.post {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read value from stdin")?;
        client.post(name, &body).await?;
    }

    if let Some(id) = args.close {
        client.close(id).await?;
        eprintln!("Closed session {id}");
    }

    client.disconnect().await?;
    Ok(())
}

async fn run_ft(prs: &PrsClient, args: FtArgs) -> Result<()> {
    let addr = locate(prs, &args.target, &args.service).await?;
    let mut client = FtClient::connect(addr).await?;

    let files = client.get_directory(&args.dir).await?;
    client.exit().await?;

    match &args.out {
        Some(out) => {
            let written = save_files(out, &files).await?;
            for path in written {
                eprintln!("Saved {}", path.display());
            }
        }
        None => {
            for file in &files {
                println!("== {} ({} bytes)", file.name, file.contents.len());
                println!("{}", file.contents);
            }
        }
    }

    Ok(())
}
