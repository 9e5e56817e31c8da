pub mod http;
pub mod metrics_endpoint;
pub mod service;

pub use http::HttpGateway;
pub use service::ImageService;

use crate::config::GatewayArgs;
use crate::rpc::messages::MAX_ANALYZE_PAYLOAD;
use crate::transport::ShutdownCoordinator;
use std::sync::Arc;

/// Build the clients once and serve the HTTP gateway until SIGINT/SIGTERM.
pub async fn run_gateway(args: &GatewayArgs) -> anyhow::Result<()> {
    let service = Arc::new(ImageService::from_args(args));
    tracing::info!(
        filter = %args.filter_addr,
        analyzer = %args.analyzer_addr,
        chunk_size = args.chunk_size.get(),
        "worker endpoints configured"
    );
    if args.max_upload_bytes > MAX_ANALYZE_PAYLOAD {
        tracing::warn!(
            max_upload_bytes = args.max_upload_bytes,
            analyze_limit = MAX_ANALYZE_PAYLOAD,
            "uploads above the analysis limit will be rejected by /analyze-colors"
        );
    }

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let shutdown_rx = shutdown.subscribe();
    let signals = shutdown.clone();
    tokio::spawn(async move {
        signals.wait_for_signal().await;
    });

    HttpGateway::new(service)
        .with_max_upload_bytes(args.max_upload_bytes)
        .serve(&args.addr, shutdown_rx)
        .await
}
