pub mod analyzer;
pub mod cli;
pub mod filter;

pub use analyzer::AnalyzerClient;
pub use cli::{ClientArgs, run_client};
pub use filter::{FilterClient, SessionState, StreamSession};
