use crate::client::{AnalyzerClient, FilterClient};
use crate::config::GatewayArgs;
use crate::error::GatewayError;
use crate::gate::{ImagePayload, ValidationGate};
use crate::metrics::Metrics;
use crate::rpc::messages::{ColorPalette, MAX_ANALYZE_PAYLOAD};
use crate::transport::Channel;
use bytes::Bytes;
use std::sync::Arc;

/// The two gateway operations, built once at startup and shared by every request.
pub struct ImageService {
    gate: Arc<ValidationGate>,
    analyzer: AnalyzerClient,
    filter: FilterClient,
    metrics: Arc<Metrics>,
}

impl ImageService {
    pub fn new(gate: ValidationGate, analyzer: AnalyzerClient, filter: FilterClient) -> Self {
        Self {
            gate: Arc::new(gate),
            analyzer,
            filter,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn from_args(args: &GatewayArgs) -> Self {
        let analyzer = AnalyzerClient::new(Channel::new(&args.analyzer_addr));
        let filter = FilterClient::new(Channel::new(&args.filter_addr))
            .with_chunk_size(args.chunk_size)
            .with_deadline(args.deadline());
        Self::new(ValidationGate::new(), analyzer, filter)
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Run the gate on the blocking pool.
    pub async fn validate(&self, raw: Bytes) -> Result<ImagePayload, GatewayError> {
        let gate = self.gate.clone();
        tokio::task::spawn_blocking(move || gate.validate(raw))
            .await
            .map_err(|e| GatewayError::CorruptImage(format!("image validation aborted: {}", e)))?
    }

    pub async fn analyze_image_colors(&self, raw: Bytes) -> Result<ColorPalette, GatewayError> {
        let payload = self.validate(raw).await?;
        if payload.len() > MAX_ANALYZE_PAYLOAD {
            return Err(GatewayError::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_ANALYZE_PAYLOAD,
            });
        }
        let palette = self.analyzer.analyze(&payload).await?;
        self.metrics.record_bytes(payload.len(), 0);
        Ok(palette)
    }

    /// Filter `raw` through the stream worker. An empty worker reply is reported
    /// as [`GatewayError::EmptyResult`] rather than an empty image.
    pub async fn apply_image_filter(
        &self,
        image_id: &str,
        filter_type: i32,
        raw: Bytes,
    ) -> Result<Bytes, GatewayError> {
        let payload = self.validate(raw).await?;
        let filtered = self
            .filter
            .apply_filter_stream(image_id, filter_type, &payload)
            .await?;
        self.metrics.record_bytes(payload.len(), filtered.len());

        if filtered.is_empty() {
            return Err(GatewayError::EmptyResult);
        }
        Ok(filtered)
    }
}
