//! dev-proxy: development server with prefix-based reverse proxying.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ listener ──▶ request id / trace ──▶ proxy middleware
//!                                                           │          │
//!                                              rule matched │          │ no rule
//!                                                           ▼          ▼
//!                                            rewrite + forward    static files
//!                                                           │      (or 404)
//!                                                           ▼
//!                                                  backend (127.0.0.1:8123)
//! ```
//!
//! Startup order: parse CLI → read config → apply CLI overrides → init
//! logging → validate & compile rules → metrics → bind → serve until
//! SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use dev_proxy::config::{parse_config, DevProxyConfig};
use dev_proxy::lifecycle::{wait_for_signal, Shutdown};
use dev_proxy::net::load_tls_config;
use dev_proxy::observability::{logging, metrics};
use dev_proxy::DevServer;

#[derive(Parser)]
#[command(name = "dev-proxy", version)]
#[command(about = "Development server that forwards path prefixes to a local backend", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or JSON when it ends in .json).
    #[arg(short, long, default_value = "dev-proxy.toml")]
    config: PathBuf,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override static_files.dir.
    #[arg(long)]
    static_dir: Option<String>,

    /// Validate the configuration, print it as JSON and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dev-proxy: {e}");
            ExitCode::FAILURE
        }
    }
}

impl Cli {
    /// Command-line values replace the file's before validation.
    fn apply_overrides(&self, config: &mut DevProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(dir) = &self.static_dir {
            config.static_files.dir = Some(dir.clone());
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = parse_config(&cli.config)?;
    cli.apply_overrides(&mut config);

    if cli.check {
        let server = DevServer::new(config)?;
        println!("{}", serde_json::to_string_pretty(server.config())?);
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "dev-proxy starting"
    );

    let server = DevServer::new(config)?;
    let config = server.config().clone();

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_concurrent_requests = config.listener.max_concurrent_requests,
        request_timeout_secs = config.timeouts.request_secs,
        static_dir = config.static_files.dir.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            let tls = load_tls_config(tls).await?;
            server.run_tls(addr, tls, server_shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
