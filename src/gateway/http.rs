use crate::error::GatewayError;
use crate::gateway::metrics_endpoint::metrics_router;
use crate::gateway::service::ImageService;
use crate::metrics::RequestTracer;
use crate::rpc::messages::ColorPalette;
use crate::transport::shutdown::wait_for_shutdown;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// HTTP front door for the gateway.
///
/// ```text
/// POST /analyze-colors   multipart: file             -> {"colors": [...]}
/// POST /apply-filter     multipart: file, filterType -> {"imageId": "...", "filtered": "<base64>"}
/// GET  /metrics
/// GET  /health
/// ```
pub struct HttpGateway {
    service: Arc<ImageService>,
    max_upload_bytes: usize,
}

impl HttpGateway {
    pub fn new(service: Arc<ImageService>) -> Self {
        Self {
            service,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Create the axum router
    pub fn router(self) -> Router {
        let metrics = self.service.metrics();
        let limit = self.max_upload_bytes;

        Router::new()
            .route("/analyze-colors", post(analyze_colors))
            .route("/apply-filter", post(apply_filter))
            .with_state(Arc::new(self))
            .merge(metrics_router(metrics))
            .layer(DefaultBodyLimit::max(limit))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` fires.
    pub async fn serve(self, addr: &str, shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("pixgate gateway listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PaletteBody {
    colors: ColorPalette,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterBody {
    image_id: String,
    filtered: String,
}

/// POST /analyze-colors
async fn analyze_colors(
    State(gateway): State<Arc<HttpGateway>>,
    multipart: Multipart,
) -> Result<Json<PaletteBody>, GatewayError> {
    let tracer = RequestTracer::new("analyze_colors", gateway.service.metrics());
    let result = analyze_upload(&gateway.service, multipart).await;

    record(tracer, result)
        .await
        .map(|colors| Json(PaletteBody { colors }))
}

async fn analyze_upload(
    service: &ImageService,
    multipart: Multipart,
) -> Result<ColorPalette, GatewayError> {
    let file = Upload::read(multipart).await?.require_file()?;
    service.analyze_image_colors(file).await
}

/// POST /apply-filter
async fn apply_filter(
    State(gateway): State<Arc<HttpGateway>>,
    multipart: Multipart,
) -> Result<Json<FilterBody>, GatewayError> {
    let tracer = RequestTracer::new("apply_filter", gateway.service.metrics());
    let result = filter_upload(&gateway.service, multipart).await;

    record(tracer, result).await.map(Json)
}

async fn filter_upload(
    service: &ImageService,
    multipart: Multipart,
) -> Result<FilterBody, GatewayError> {
    let mut upload = Upload::read(multipart).await?;
    let file = upload.require_file()?;
    let filter_type = upload.filter_type()?;

    let image_id = Uuid::new_v4().to_string();
    let filtered = service
        .apply_image_filter(&image_id, filter_type, file)
        .await?;

    Ok(FilterBody {
        image_id,
        filtered: general_purpose::STANDARD.encode(&filtered),
    })
}

async fn record<T>(tracer: RequestTracer, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
    match &result {
        Ok(_) => tracer.success().await,
        Err(e) => tracer.error(&e.to_string()).await,
    }
    result
}

/// Fields of a multipart upload the gateway cares about.
#[derive(Debug, Default)]
struct Upload {
    file: Option<Bytes>,
    filter_type: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, GatewayError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| GatewayError::InvalidInput(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
                    upload.file = Some(data);
                }
                "filterType" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
                    upload.filter_type = Some(text);
                }
                _ => {}
            }
        }

        Ok(upload)
    }

    fn require_file(&mut self) -> Result<Bytes, GatewayError> {
        self.file
            .take()
            .ok_or_else(|| GatewayError::InvalidInput("an image file is required".into()))
    }

    fn filter_type(&self) -> Result<i32, GatewayError> {
        let raw = self
            .filter_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::InvalidInput("filterType is required".into()))?;

        raw.parse()
            .map_err(|_| GatewayError::InvalidInput(format!("filterType must be an integer, got {:?}", raw)))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidInput(_)
            | GatewayError::UnsupportedFormat(_)
            | GatewayError::CorruptImage(_) => StatusCode::BAD_REQUEST,
            GatewayError::Compression(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Transport(_) | GatewayError::EmptyResult => StatusCode::BAD_GATEWAY,
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
