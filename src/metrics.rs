use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Which side of the transport this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Gateway,
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Gateway => f.write_str("gateway"),
            Role::Worker => f.write_str("worker"),
        }
    }
}

/// Outcome counters and timings for one operation (an HTTP route or an RPC method).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub calls: u64,
    pub errors: u64,
    pub total_us: u64,
    pub max_us: u64,
}

impl OperationStats {
    fn observe(&mut self, elapsed: Duration, failed: bool) {
        let us = elapsed.as_micros() as u64;
        self.calls += 1;
        self.errors += u64::from(failed);
        self.total_us += us;
        self.max_us = self.max_us.max(us);
    }
}

/// Per-process counters for gateway requests and worker calls.
#[derive(Debug, Default)]
pub struct Metrics {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    /// Image bytes handed to workers
    bytes_sent: AtomicU64,
    /// Image bytes streamed back by workers
    bytes_received: AtomicU64,
    operations: RwLock<HashMap<String, OperationStats>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bytes(&self, sent: usize, received: usize) {
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.bytes_received.fetch_add(received as u64, Ordering::Relaxed);
    }

    fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    async fn record_outcome(&self, operation: &str, elapsed: Duration, failed: bool) {
        let counter = if failed { &self.failed } else { &self.succeeded };
        counter.fetch_add(1, Ordering::Relaxed);

        self.operations
            .write()
            .await
            .entry(operation.to_string())
            .or_default()
            .observe(elapsed, failed);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let operations = self.operations.read().await.clone();
        let (calls, total_us, max_us) = operations.values().fold((0, 0, 0), |acc, op| {
            (acc.0 + op.calls, acc.1 + op.total_us, acc.2.max(op.max_us))
        });

        MetricsSnapshot {
            total_requests: self.started.load(Ordering::Relaxed),
            total_success: self.succeeded.load(Ordering::Relaxed),
            total_errors: self.failed.load(Ordering::Relaxed),
            avg_duration_us: total_us.checked_div(calls).unwrap_or(0),
            max_duration_us: max_us,
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            operations,
        }
    }
}

/// Served as JSON by `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Includes requests still in flight
    pub total_requests: u64,
    pub total_success: u64,
    pub total_errors: u64,
    pub avg_duration_us: u64,
    pub max_duration_us: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub operations: HashMap<String, OperationStats>,
}

/// Times one gateway request or worker call and records how it ended.
pub struct RequestTracer {
    operation: String,
    start: Instant,
    metrics: Arc<Metrics>,
}

impl RequestTracer {
    pub fn new(operation: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        let operation = operation.into();
        debug!(%operation, "started");
        metrics.record_start();

        Self {
            operation,
            start: Instant::now(),
            metrics,
        }
    }

    pub async fn success(self) {
        let elapsed = self.start.elapsed();
        info!(
            operation = %self.operation,
            elapsed_ms = elapsed.as_millis() as u64,
            "completed"
        );
        self.metrics
            .record_outcome(&self.operation, elapsed, false)
            .await;
    }

    pub async fn error(self, error: &str) {
        let elapsed = self.start.elapsed();
        warn!(
            operation = %self.operation,
            elapsed_ms = elapsed.as_millis() as u64,
            error,
            "failed"
        );
        self.metrics
            .record_outcome(&self.operation, elapsed, true)
            .await;
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn log_startup(role: Role, listen: &str) {
    info!(
        %role,
        listen,
        version = env!("CARGO_PKG_VERSION"),
        "pixgate {} starting",
        role
    );
}

pub fn log_shutdown(role: Role, metrics: Option<&MetricsSnapshot>) {
    match metrics {
        Some(snapshot) => info!(
            %role,
            calls = snapshot.total_requests,
            errors = snapshot.total_errors,
            avg_us = snapshot.avg_duration_us,
            "pixgate {} stopped",
            role
        ),
        None => info!(%role, "pixgate {} stopped", role),
    }
}
