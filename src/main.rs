use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rookdb::config::Config;
use rookdb::engine::Engine;
use rookdb::server::Server;

/// An embeddable SQL database speaking the PostgreSQL wire protocol.
#[derive(Parser, Debug)]
#[command(name = "rookdb", version, about)]
struct Cli {
    /// Configuration file (key=value lines).
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the data directory.
    #[arg(short, long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "cannot load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    info!(
        port = config.port,
        data_dir = %config.data_dir,
        page_size = config.page_size,
        mode = ?config.mode,
        "starting"
    );

    let engine = match Engine::open(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, data_dir = %config.data_dir, "cannot open database");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(("127.0.0.1", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, port = config.port, "cannot bind");
            return ExitCode::FAILURE;
        }
    };

    let server = Server::new(listener, engine, config.max_connections);
    if let Err(e) = server.serve().await {
        error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }

    info!("shut down cleanly");
    ExitCode::SUCCESS
}
