mod common;

use bytes::Bytes;
use common::*;
use pixgate::server::{self, WorkerServer};
use pixgate::transport::ShutdownCoordinator;
use pixgate::{AnalyzerClient, Channel, FilterClient, ValidationGate};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_one_worker_serves_both_endpoints() {
    let worker = WorkerServer::new();
    server::register_echo_filter(&worker).await;
    server::register_palette_analyzer(&worker, 4).await;

    let filter_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let analyzer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let filter_addr = filter_listener.local_addr().unwrap().to_string();
    let analyzer_addr = analyzer_listener.local_addr().unwrap().to_string();

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let serving = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server::serve_all(
                vec![filter_listener, analyzer_listener],
                Arc::new(worker),
                &shutdown,
            )
            .await
        })
    };

    let raw = Bytes::from(small_png());
    let payload = ValidationGate::new().validate(raw.clone()).unwrap();

    let filtered = FilterClient::new(Channel::new(&filter_addr))
        .apply_filter_stream("img-both", 1, &payload)
        .await
        .unwrap();
    assert_eq!(filtered, raw);

    let palette = AnalyzerClient::new(Channel::new(&analyzer_addr))
        .analyze(&payload)
        .await
        .unwrap();
    assert_eq!(palette.len(), 2);

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
