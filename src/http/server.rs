//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: proxy middleware in front of static files
//! - Wire up middleware (request ID, tracing, concurrency limit)
//! - Share one pooled upstream client across all rules
//! - Serve on a plain TCP listener or with TLS, with graceful shutdown

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{middleware, Router};
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::{compile_config, ConfigError, DevProxyConfig, StaticFilesConfig};
use crate::http::proxy::proxy_middleware;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::routing::RuleSet;

/// Application state injected into the proxy middleware.
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RuleSet>,
    pub client: Client<HttpConnector, Body>,
    pub request_timeout: Duration,
    /// Scheme clients reach the dev server with.
    pub scheme: &'static str,
}

/// The development server: proxy rules plus static files.
pub struct DevServer {
    router: Router,
    config: DevProxyConfig,
    rules: Arc<RuleSet>,
}

impl DevServer {
    /// Validate the configuration and build the server.
    ///
    /// Any configuration problem is reported here, before a socket is bound.
    pub fn new(config: DevProxyConfig) -> Result<Self, ConfigError> {
        let rules = Arc::new(compile_config(&config).map_err(ConfigError::Validation)?);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            rules: rules.clone(),
            client,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            scheme: if config.listener.tls.is_some() { "https" } else { "http" },
        };

        for rule in rules.rules() {
            tracing::info!(
                prefix = rule.prefix(),
                target = %rule.target(),
                change_origin = rule.change_origin(),
                ws = rule.ws(),
                "Proxy rule loaded"
            );
        }

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            rules,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &DevProxyConfig, state: AppState) -> Router {
        Self::fallback_router(&config.static_files)
            .layer(middleware::from_fn_with_state(state, proxy_middleware))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_concurrent_requests))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Router for requests the proxy does not intercept.
    fn fallback_router(static_files: &StaticFilesConfig) -> Router {
        let Some(dir) = &static_files.dir else {
            return Router::new().fallback(not_found);
        };

        let serve_dir = ServeDir::new(dir).append_index_html_on_directories(true);
        if static_files.spa_fallback {
            let index = Path::new(dir).join("index.html");
            Router::new().fallback_service(serve_dir.fallback(ServeFile::new(index)))
        } else {
            Router::new().fallback_service(serve_dir)
        }
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, rules = self.rules.len(), "Dev server listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Dev server stopped");
        Ok(())
    }

    /// Run the server with TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);

        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining connections");
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, rules = self.rules.len(), "Dev server listening (TLS)");

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("Dev server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &DevProxyConfig {
        &self.config
    }

    /// The compiled proxy rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
