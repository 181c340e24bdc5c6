use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config_manager::{ConfigurationError, SystemConfig};
use persistence_layer::{PersistenceError, PostgresGateway};
use solana_rpc_client::{SolanaRpcClient, SolanaRpcClientConfig, SolanaRpcError};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

mod handlers;
mod middleware;
mod types;

use handlers::*;
use types::*;

/// Application state shared across handlers. `rpc` and `gateway` are cheap
/// to clone (connection pool / reqwest client behind an `Arc` internally);
/// `config` is cloned in whole since handlers read from several sections.
#[derive(Clone)]
pub struct AppState {
    pub config: SystemConfig,
    pub rpc: SolanaRpcClient,
    pub gateway: Arc<PostgresGateway>,
}

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigurationError),
    #[error("rpc error: {0}")]
    Rpc(#[from] SolanaRpcError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("ingestion error: {0}")]
    Ingestion(#[from] ingestion_engine::IngestionError),
    #[error("flow error: {0}")]
    Flow(#[from] analytics_flows::FlowError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            ApiError::Rpc(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            ApiError::Ingestion(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Flow(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(ErrorResponse { error: error_message, timestamp: chrono::Utc::now() });

        (status, body).into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,api_server=debug".into()),
        )
        .init();

    info!("starting wallet analytics API server");

    let config = SystemConfig::load()?;
    info!("configuration loaded");

    let rpc = SolanaRpcClient::new(SolanaRpcClientConfig {
        rpc_url: config.solana.rpc_url.clone(),
        rpc_timeout_seconds: config.solana.rpc_timeout_seconds,
        helius_api_key: config.helius.api_key.clone(),
        helius_base_url: config.helius.base_url.clone(),
        rate_limit_rps: config.solana.rate_limit_rps,
    })?;

    let gateway = Arc::new(PostgresGateway::new(&config.database.postgres_url).await?);
    info!("connected to postgres");

    let app_state = AppState { config: config.clone(), rpc, gateway };

    let app = create_router(app_state);

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    info!(%bind_addr, "binding server");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/wallets/:address/sync", post(sync_wallet_handler))
        .route("/wallets/:address/pnl", get(wallet_pnl_handler))
        .route("/correlation/analyze", post(correlation_analyze_handler))
        .route("/tokens/:mint/first-buyers", get(first_buyers_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()).into_inner())
        .with_state(state)
}
