use std::time::Duration;
use thiserror::Error;

/// Failures of the framed RPC channel between the gateway and a worker.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// The peer terminated the call with a status.
    #[error("remote status {code}: {message}")]
    Remote { code: i64, message: String },

    /// The connection ended without a `close` or `status` envelope.
    #[error("stream ended unexpectedly")]
    UnexpectedEof,

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The payload would need more frames than `chunk_number` can count.
    #[error("payload needs {0} chunks, more than a stream can number")]
    TooManyChunks(usize),
}

/// Everything a gateway operation can fail with.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported image format: {0}; only PNG and JPEG are accepted")]
    UnsupportedFormat(String),

    #[error("invalid or corrupt image: {0}")]
    CorruptImage(String),

    #[error("failed to compress image: {0}")]
    Compression(String),

    /// The validated image cannot be carried by a single analysis request.
    #[error("image of {size} bytes exceeds the {limit} byte analysis limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("worker returned an empty result")]
    EmptyResult,
}

impl GatewayError {
    /// Gate rejections happen before any network call is made.
    pub fn is_gate_error(&self) -> bool {
        matches!(
            self,
            GatewayError::UnsupportedFormat(_)
                | GatewayError::CorruptImage(_)
                | GatewayError::Compression(_)
                | GatewayError::PayloadTooLarge { .. }
        )
    }
}
