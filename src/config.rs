use clap::Args;
use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_GATEWAY_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_FILTER_ADDR: &str = "127.0.0.1:50052";
pub const DEFAULT_ANALYZER_ADDR: &str = "127.0.0.1:5281";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Gateway settings. Every flag can also come from the environment.
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Address the HTTP gateway listens on
    #[arg(short, long, env = "GATEWAY_ADDR", default_value = DEFAULT_GATEWAY_ADDR)]
    pub addr: String,

    /// Filter worker (ApplyFilterStream)
    #[arg(long, env = "IMAGE_FILTER_ADDRESS", default_value = DEFAULT_FILTER_ADDR)]
    pub filter_addr: String,

    /// Color analyzer worker (AnalyzeColors)
    #[arg(long, env = "COLOR_ANALYZER_ADDRESS", default_value = DEFAULT_ANALYZER_ADDR)]
    pub analyzer_addr: String,

    /// Bytes per streamed chunk
    #[arg(long, env = "CHUNK_SIZE", default_value_t = crate::rpc::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: NonZeroUsize,

    /// Abort a filter stream after this many seconds (no deadline when unset)
    #[arg(long, env = "FILTER_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Largest accepted upload body
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl GatewayArgs {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for GatewayArgs {
    fn default() -> Self {
        Self {
            addr: DEFAULT_GATEWAY_ADDR.to_string(),
            filter_addr: DEFAULT_FILTER_ADDR.to_string(),
            analyzer_addr: DEFAULT_ANALYZER_ADDR.to_string(),
            chunk_size: crate::rpc::DEFAULT_CHUNK_SIZE,
            deadline_secs: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Development worker settings.
///
/// The worker serves both methods, so by default it listens on the filter and
/// the analyzer address a default gateway dials.
#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Listen addresses (repeat the flag or separate with commas)
    #[arg(
        short,
        long = "addr",
        env = "WORKER_ADDR",
        value_delimiter = ',',
        default_values = [DEFAULT_FILTER_ADDR, DEFAULT_ANALYZER_ADDR]
    )]
    pub addrs: Vec<String>,

    /// Colors returned by AnalyzeColors
    #[arg(long, default_value_t = 8)]
    pub palette_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        gateway: GatewayArgs,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "pixgate",
            "--filter-addr",
            "10.0.0.2:9000",
            "--chunk-size",
            "1024",
            "--deadline-secs",
            "5",
        ]);
        assert_eq!(cli.gateway.filter_addr, "10.0.0.2:9000");
        assert_eq!(cli.gateway.chunk_size.get(), 1024);
        assert_eq!(cli.gateway.deadline(), Some(Duration::from_secs(5)));
    }

    #[derive(Parser)]
    struct WorkerCli {
        #[command(flatten)]
        worker: WorkerArgs,
    }

    #[test]
    fn test_worker_listens_where_gateway_dials() {
        let cli = WorkerCli::parse_from(["pixgate"]);
        let gateway = GatewayArgs::default();
        assert!(cli.worker.addrs.contains(&gateway.filter_addr));
        assert!(cli.worker.addrs.contains(&gateway.analyzer_addr));
    }

    #[test]
    fn test_worker_addr_list() {
        let cli = WorkerCli::parse_from(["pixgate", "--addr", "0.0.0.0:7000,0.0.0.0:7001"]);
        assert_eq!(cli.worker.addrs, vec!["0.0.0.0:7000", "0.0.0.0:7001"]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(Cli::try_parse_from(["pixgate", "--chunk-size", "0"]).is_err());
    }
}
