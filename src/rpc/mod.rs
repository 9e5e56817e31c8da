pub mod chunk;
pub mod messages;
pub mod reassembly;
pub mod wire;

pub use chunk::{ChunkEncoder, ChunkFrame, DEFAULT_CHUNK_SIZE, MAX_CHUNKS, encode};
pub use messages::{AnalyzeRequest, AnalyzeResponse, ColorPalette};
pub use reassembly::Reassembler;
pub use wire::{ANALYZE_COLORS, APPLY_FILTER_STREAM, CallHeader, Envelope, RpcStatus};
