// Validation gate
pub mod gate;

// Chunk frames, wire envelopes, reassembly
pub mod rpc;

// Framed TCP transport
pub mod transport;

// Worker clients and the duplex stream session
pub mod client;

// Worker-side call handling
pub mod server;

// HTTP front door
#[cfg(feature = "http")]
pub mod gateway;

pub mod config;
pub mod error;
pub mod metrics;

pub use client::{AnalyzerClient, FilterClient, SessionState, StreamSession};
pub use error::{GatewayError, TransportError};
pub use gate::{ImagePayload, PayloadFormat, ValidationGate};
pub use metrics::Metrics;
pub use rpc::{ChunkEncoder, ChunkFrame, ColorPalette, Reassembler};
pub use server::WorkerServer;
pub use transport::Channel;
