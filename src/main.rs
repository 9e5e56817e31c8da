use clap::{Parser, Subcommand};
#[cfg(feature = "http")]
use pixgate::config::GatewayArgs;
use pixgate::config::WorkerArgs;
use pixgate::metrics::{self, Role};
use pixgate::{client, server};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pixgate")]
#[command(about = "Image gateway offloading palette analysis and chunked filter streams to workers")]
struct Opts {
    #[command(subcommand)]
    cmd: Mode,
}

/// CLI modes
#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the HTTP gateway
    #[cfg(feature = "http")]
    Gateway {
        #[command(flatten)]
        args: GatewayArgs,
    },

    /// Run a development worker serving the echo filter and the palette analyzer
    Worker {
        #[command(flatten)]
        args: WorkerArgs,
    },

    /// Upload one image to a running gateway
    Client {
        #[command(flatten)]
        client: client::ClientArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    metrics::init_logging();

    let opts = Opts::parse();
    match opts.cmd {
        #[cfg(feature = "http")]
        Mode::Gateway { args } => {
            metrics::log_startup(Role::Gateway, &args.addr);
            pixgate::gateway::run_gateway(&args).await?;
            metrics::log_shutdown(Role::Gateway, None);
        }

        Mode::Worker { args } => {
            run_worker(args).await?;
        }

        Mode::Client { client } => {
            client::run_client(client).await?;
        }
    }
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> anyhow::Result<()> {
    let worker = Arc::new(server::WorkerServer::new());
    server::register_echo_filter(&worker).await;
    server::register_palette_analyzer(&worker, args.palette_size).await;

    metrics::log_startup(Role::Worker, &args.addrs.join(", "));
    server::run_worker(&args.addrs, worker.clone()).await?;

    let snapshot = worker.metrics().snapshot().await;
    metrics::log_shutdown(Role::Worker, Some(&snapshot));
    Ok(())
}
