//! A TCP service leasing its port from a live registry.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use svc_client::{resolve_service, PrsClient, SdClient};
use svc_core::{PortRange, ServiceName};
use svcd::advertise::Advertiser;
use svcd::lease::{LeaseRegistry, PrsServer};
use svcd::server::{SdService, TcpServer};
use svcd::session::spawn_session_table;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_service_is_found_through_registry_and_withdraws() {
    let range = PortRange::new(47100, 47119).unwrap();
    let registry = PrsServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        LeaseRegistry::new(range, Duration::from_secs(300)),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let registry_addr = registry.local_addr().unwrap();
    let registry_task = tokio::spawn(registry.run());

    let prs = PrsClient::new(registry_addr).with_timeout(Duration::from_millis(500));
    let service_name = ServiceName::new("SD Server").unwrap();

    let advertisement = Advertiser::new(prs.clone(), service_name.clone(), Duration::from_millis(50))
        .register()
        .await
        .unwrap();
    let port = advertisement.port();
    assert!(range.contains(port));

    let server_token = CancellationToken::new();
    let server = TcpServer::bind(
        (IpAddr::V4(Ipv4Addr::LOCALHOST), port).into(),
        SdService::new(spawn_session_table(), std::env::temp_dir()),
        server_token.clone(),
    )
    .await
    .unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Let a few keep-alives go through
    tokio::time::sleep(Duration::from_millis(150)).await;

    let addr = resolve_service(&prs, IpAddr::V4(Ipv4Addr::LOCALHOST), &service_name)
        .await
        .unwrap();
    assert_eq!(addr.port(), port);

    let mut client = SdClient::connect(addr).await.unwrap();
    client.open().await.unwrap();
    client.disconnect().await.unwrap();

    server_token.cancel();
    advertisement.withdraw().await.unwrap();

    let err = prs.lookup_port(&service_name).await.unwrap_err();
    assert!(err.is_not_found(), "got {err}");

    prs.stop().await.unwrap();
    let final_state = registry_task.await.unwrap().unwrap();
    assert_eq!(final_state.leased_count(), 0);
}
