//! `svcd` - runs one of the svc daemons in the foreground.
//!
//! # Usage
//!
//! ```bash
//! # Port registry on the default port with the default client range
//! svcd prs
//!
//! # Registry with a small pool and a short keep-alive timeout
//! svcd prs --port 31000 --start 41000 --end 41009 --timeout 30
//!
//! # Session daemon, advertised to the registry as "SD Server"
//! svcd sd --prs 127.0.0.1:30000 --root ./site
//!
//! # File server
//! svcd ft --root ./shared
//!
//! # Enable debug logging
//! RUST_LOG=svcd=debug svcd sd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, give the leased port back, exit

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use svc_client::PrsClient;
use svc_core::ServiceName;

use crate::advertise::Advertiser;
use crate::config::SuiteConfig;
use crate::lease::{LeaseRegistry, PrsServer};
use crate::server::{ConnectionService, FtService, SdService, TcpServer};
use crate::session::spawn_session_table;

/// svcd - port registry, session daemon and file server
#[derive(Parser, Debug)]
#[command(name = "svcd", version, about)]
struct Args {
    /// Config file (overrides $SVC_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the port registry
    Prs {
        /// UDP port to listen on
        #[arg(short = 'p', long)]
        port: Option<u16>,
        /// First client port
        #[arg(short = 's', long)]
        start: Option<u16>,
        /// Last client port
        #[arg(short = 'e', long)]
        end: Option<u16>,
        /// Keep-alive timeout in seconds
        #[arg(short = 't', long)]
        timeout: Option<u64>,
    },
    /// Run the session daemon
    Sd(ServiceArgs),
    /// Run the file transfer server
    Ft(ServiceArgs),
}

#[derive(clap::Args, Debug)]
struct ServiceArgs {
    /// Registry address
    #[arg(long)]
    prs: Option<SocketAddr>,
    /// Name to advertise under
    #[arg(long)]
    name: Option<String>,
    /// Directory documents are served from
    #[arg(long)]
    root: Option<PathBuf>,
}

/// Entry point for the `svcd` binary.
pub fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SuiteConfig::load_from(path)?,
        None => SuiteConfig::load()?,
    };
    apply_overrides(&mut config, &args.command);

    run(args.command, config)
}

/// Folds command-line flags into the loaded configuration.
fn apply_overrides(config: &mut SuiteConfig, command: &Command) {
    match command {
        Command::Prs {
            port,
            start,
            end,
            timeout,
        } => {
            if let Some(port) = port {
                config.prs.port = *port;
            }
            if let Some(start) = start {
                config.prs.start_port = *start;
            }
            if let Some(end) = end {
                config.prs.end_port = *end;
            }
            if let Some(timeout) = timeout {
                config.prs.keep_alive_timeout_secs = *timeout;
            }
        }
        Command::Sd(service) => {
            apply_service_overrides(config, service);
            if let Some(name) = &service.name {
                config.sd.service_name = name.clone();
            }
            if let Some(root) = &service.root {
                config.sd.document_root = root.clone();
            }
        }
        Command::Ft(service) => {
            apply_service_overrides(config, service);
            if let Some(name) = &service.name {
                config.ft.service_name = name.clone();
            }
            if let Some(root) = &service.root {
                config.ft.root = root.clone();
            }
        }
    }
}

fn apply_service_overrides(config: &mut SuiteConfig, service: &ServiceArgs) {
    if let Some(prs) = service.prs {
        config.advertise.prs_address = prs;
    }
}

#[tokio::main]
async fn run(command: Command, config: SuiteConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("svcd=info".parse()?)
                .add_directive("svc_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "svcd starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    match command {
        Command::Prs { .. } => run_prs(&config, cancel_token).await,
        Command::Sd(_) => {
            let service_name = config.sd.service_name()?;
            let service = SdService::new(spawn_session_table(), config.sd.document_root.clone());
            run_advertised(&config, service_name, service, cancel_token).await
        }
        Command::Ft(_) => {
            let service_name = config.ft.service_name()?;
            let service = FtService::new(config.ft.root.clone());
            run_advertised(&config, service_name, service, cancel_token).await
        }
    }
}

async fn run_prs(config: &SuiteConfig, cancel_token: CancellationToken) -> Result<()> {
    let range = config.prs.validate()?;
    let registry = LeaseRegistry::new(range, config.prs.keep_alive_timeout());

    let addr = SocketAddr::new(config.prs.bind_address, config.prs.port);
    let server = PrsServer::bind(addr, registry, cancel_token).await?;

    let registry = server.run().await?;
    info!(stopped = registry.is_stopped(), "Port registry exited");
    Ok(())
}

/// Leases a port from the registry, serves on it until shutdown, then
/// returns the port.
async fn run_advertised<S: ConnectionService>(
    config: &SuiteConfig,
    service_name: ServiceName,
    service: S,
    cancel_token: CancellationToken,
) -> Result<()> {
    config.advertise.validate()?;

    let client = PrsClient::new(config.advertise.prs_address)
        .with_timeout(config.advertise.request_timeout());
    let advertisement = Advertiser::new(
        client,
        service_name.clone(),
        config.advertise.keep_alive_interval(),
    )
    .register()
    .await
    .with_context(|| {
        format!(
            "Failed to lease a port for {service_name:?} from {}",
            config.advertise.prs_address
        )
    })?;

    let addr = SocketAddr::new(config.advertise.bind_address, advertisement.port());
    let served = match TcpServer::bind(addr, service, cancel_token).await {
        Ok(server) => server.run().await.map_err(anyhow::Error::from),
        Err(e) => Err(e.into()),
    };

    // Give the port back whether or not serving succeeded
    if let Err(e) = advertisement.withdraw().await {
        error!(error = %e, "Failed to return port to registry");
    }

    served?;
    info!(service = %service_name, "svcd stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_prs_flags_override_config() {
        let args = Args::try_parse_from(["svcd", "prs", "-p", "31000", "-s", "41000", "-e", "41009", "-t", "30"])
            .unwrap();
        let mut config = SuiteConfig::default();
        apply_overrides(&mut config, &args.command);

        assert_eq!(config.prs.port, 31000);
        assert_eq!(config.prs.start_port, 41000);
        assert_eq!(config.prs.end_port, 41009);
        assert_eq!(config.prs.keep_alive_timeout_secs, 30);
        assert!(config.prs.validate().is_ok());
    }

    #[test]
    fn test_sd_flags_override_config() {
        let args = Args::try_parse_from([
            "svcd", "sd", "--prs", "10.1.1.1:30001", "--name", "Docs", "--root", "/srv/www",
        ])
        .unwrap();
        let mut config = SuiteConfig::default();
        apply_overrides(&mut config, &args.command);

        assert_eq!(config.advertise.prs_address, "10.1.1.1:30001".parse().unwrap());
        assert_eq!(config.sd.service_name, "Docs");
        assert_eq!(config.sd.document_root, PathBuf::from("/srv/www"));
        // FT settings untouched
        assert_eq!(config.ft.service_name, "FT Server");
    }
}
