//! GitLab Proxy Gateway
//!
//! Accepts generic JSON envelopes describing a GitLab REST call, attaches the
//! configured access token and forwards them to the upstream API.
//!
//! ```text
//!     Client ──POST /api/gitlabproxy──▶ http::server ──▶ proxy::Forwarder ──▶ GitLab API
//!            ◀──── status + body ────── http::handlers ◀── reply / error ◀──
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gitlab_proxy::config::loader;
use gitlab_proxy::lifecycle::{signals, Shutdown};
use gitlab_proxy::observability::{logging, metrics};
use gitlab_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "gitlab-proxy", version)]
#[command(about = "Forwarding gateway for the GitLab REST API", long_about = None)]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Interface to bind, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides PORT and the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let dotenv = loader::load_dotenv();
    let mut config = loader::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.listener.host = host;
    }
    if let Some(port) = args.port {
        config.listener.port = port;
    }

    logging::init(&config.observability);
    dotenv.log();

    tracing::info!("gitlab-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.upstream.access_token.is_empty() {
        tracing::warn!("No access token configured; requests are forwarded without credentials");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        upstream = %config.upstream.base_url,
        token_header = %config.upstream.token_header,
        "Configuration loaded"
    );

    // Bind TCP listener
    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
