pub mod services;
pub mod worker;

pub use services::{register_echo_filter, register_palette_analyzer};
pub use worker::{WorkerServer, run_worker, serve, serve_all};
