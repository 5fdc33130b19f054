//! An SSO-aware authorization gateway for Elasticsearch-compatible search
//! backends.
//!
//! The gateway sits between an authenticating SSO proxy and a search
//! backend that has no index-level multi-tenancy of its own. Every request
//! is classified (which indices? which API?), optionally rewritten
//! (catch-alls narrowed to the caller's whitelist), evaluated against
//! per-group rules, and then forwarded or rejected with 401.
//!
//! Identity headers are trusted as-is. Deploy this only behind the SSO
//! proxy, never exposed to clients directly.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use clap::Parser;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

mod auth;
mod authz;
mod classify;
mod config;
mod gateway;
mod observability;
mod proxy;
mod rewrite;
mod trace;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "seawall", version, about = "RBAC gateway for search backends")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

/// Shared state for the single HTTP handler.
///
/// Everything here is read-only after startup; per-request state lives in
/// the handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::GatewayConfig>,
    pub policy: Arc<authz::PolicyStore>,
    pub upstream: Arc<proxy::Upstream>,
}

impl AppState {
    pub fn new(config: config::GatewayConfig) -> Result<Self, proxy::UpstreamError> {
        let upstream = proxy::Upstream::new(&config)?;
        let policy = authz::PolicyStore::new(config.rbac.clone());

        Ok(Self {
            config: Arc::new(config),
            policy: Arc::new(policy),
            upstream: Arc::new(upstream),
        })
    }
}

/// Build the router: one fallback handler for every method and path.
pub fn build_app(config: &config::GatewayConfig, state: AppState) -> Router {
    Router::new()
        .fallback(gateway::filter_request)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match config::GatewayConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "failed to load config from {}: {err}",
                args.config.display()
            );
            std::process::exit(1);
        }
    };

    observability::init_tracing(&config.logging);

    let state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("failed to initialize gateway: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        config_file = %args.config.display(),
        target = %config.target,
        groups = config.rbac.groups.len(),
        "starting gateway"
    );

    let loopback = config
        .listen_interface
        .parse::<std::net::IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false);
    if !loopback {
        tracing::warn!(
            "identity headers are trusted without verification; make sure this \
             address is only reachable through the SSO proxy"
        );
    }

    let app = build_app(&config, state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind to listen address");

    tracing::info!("listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
