//! Tenon API Server
//!
//! The single entry point for all external API requests.
//! Handles:
//! - Authentication, tenant binding, and lifecycle gating
//! - Role and permission checks
//! - Tenant-scoped GRC resources, platform administration, AI assist
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod router;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tenon_common::ai::{self, AiProvider};
use tenon_common::auth::{SecretBox, TokenService};
use tenon_common::cache::Cache;
use tenon_common::config::AppConfig;
use tenon_common::db::{self, DbPool, Repository};
use tenon_common::metrics as app_metrics;
use tokio::signal;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub cache: Option<Arc<Cache>>,
    pub tokens: Arc<TokenService>,
    /// `None` when no encryption passphrase is configured; storing tenant
    /// API keys fails loudly in that state
    pub secrets: Option<Arc<SecretBox>>,
    /// Platform-wide AI provider; tenants may override via their settings
    pub ai: Option<Arc<dyn AiProvider>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config);

    info!("Starting Tenon API server v{}", tenon_common::VERSION);

    // Initialize metrics
    app_metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }

    let config = Arc::new(config);

    // Initialize database connection and bring the control plane up to date
    let db = DbPool::new(&config.database).await?;
    db::run_migrations(&db).await?;

    let repo = Repository::new(db.clone());
    let cache = Cache::from_config(&config.redis).await;

    let jwt_secret = config
        .auth
        .jwt_secret
        .as_deref()
        .context("auth.jwt_secret must be configured")?;
    let tokens = Arc::new(TokenService::new(
        jwt_secret,
        &config.auth.jwt_issuer,
        config.auth.jwt_expiration_secs,
    ));

    let secrets = config
        .crypto
        .encryption_key
        .as_deref()
        .map(|passphrase| Arc::new(SecretBox::from_passphrase(passphrase)));
    if secrets.is_none() {
        warn!("crypto.encryption_key is unset; storing tenant API keys is disabled");
    }

    let ai = ai::provider_from_config(&config.ai);
    if ai.is_none() {
        warn!("No platform AI provider configured; AI endpoints require tenant settings");
    }

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        repo,
        cache,
        tokens,
        secrets,
        ai,
    };

    // Build the router
    let app = router::create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber from observability config
fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Expose Prometheus metrics on a dedicated port
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Suffix("ai_request_duration_seconds".to_string()),
            app_metrics::AI_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            app_metrics::LATENCY_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
