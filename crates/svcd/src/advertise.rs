//! Service advertisement through the port registry.
//!
//! A TCP service leases its listening port from the PRS under its service
//! name, refreshes the lease from a background task while it runs, and
//! gives the port back when it shuts down.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use svc_client::{ClientError, PrsClient};
use svc_core::ServiceName;

/// Leases a port for a service.
pub struct Advertiser {
    client: PrsClient,
    service: ServiceName,
    keep_alive_interval: Duration,
}

impl Advertiser {
    pub fn new(client: PrsClient, service: ServiceName, keep_alive_interval: Duration) -> Self {
        Self {
            client,
            service,
            keep_alive_interval,
        }
    }

    /// Requests a port and starts keeping it alive.
    ///
    /// # Errors
    ///
    /// Fails if the registry cannot be reached or has no free port.
    pub async fn register(self) -> Result<Advertisement, ClientError> {
        let port = self.client.request_port(&self.service).await?;
        info!(service = %self.service, port, "Leased port from registry");

        let stop = CancellationToken::new();
        let keep_alive = spawn_keep_alive_task(
            self.client.clone(),
            self.service.clone(),
            port,
            self.keep_alive_interval,
            stop.clone(),
        );

        Ok(Advertisement {
            client: self.client,
            service: self.service,
            port,
            stop,
            keep_alive,
        })
    }
}

/// A held lease, kept alive until withdrawn.
pub struct Advertisement {
    client: PrsClient,
    service: ServiceName,
    port: u16,
    stop: CancellationToken,
    keep_alive: JoinHandle<()>,
}

impl Advertisement {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Stops the keep-alives and returns the port to the registry.
    pub async fn withdraw(self) -> Result<(), ClientError> {
        self.stop.cancel();
        if let Err(e) = self.keep_alive.await {
            warn!(error = %e, "Keep-alive task ended abnormally");
        }

        self.client.close_port(&self.service, self.port).await?;
        info!(service = %self.service, port = self.port, "Returned port to registry");
        Ok(())
    }
}

/// Spawns a task that refreshes the lease every `period` until `stop`.
fn spawn_keep_alive_task(
    client: PrsClient,
    service: ServiceName,
    port: u16,
    period: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    debug!(service = %service, "Keep-alive task stopping");
                    break;
                }

                _ = ticker.tick() => {
                    match client.keep_alive(&service, port).await {
                        Ok(()) => debug!(service = %service, port, "Lease kept alive"),
                        Err(e) if e.is_not_found() => {
                            // The registry reclaimed the port; clients can no longer find us
                            error!(service = %service, port, "Lease lost, registry no longer lists this service");
                        }
                        Err(e) => warn!(service = %service, port, error = %e, "Keep-alive failed"),
                    }
                }
            }
        }
    })
}
