//! Request/response DTOs for the four HTTP routes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `POST /wallets/:address/sync` body. All fields optional; defaults match
/// `ingestion_engine::SyncOptions`.
#[derive(Debug, Deserialize, Default)]
pub struct SyncRequest {
    pub smart_fetch: Option<bool>,
    pub target_tx_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub wallet_address: String,
    pub transactions_ingested: usize,
    pub swaps_saved: usize,
}

/// `GET /wallets/:address/pnl` response.
#[derive(Debug, Serialize)]
pub struct WalletPnlResponse {
    pub wallet_address: String,
    pub realized_sol: Decimal,
    pub total_volume_sol: Decimal,
    pub dominant_behavior: Option<String>,
}

/// `POST /correlation/analyze` body: the wallets to correlate, each already
/// ingested (no on-demand sync is triggered here).
#[derive(Debug, Deserialize)]
pub struct CorrelationRequest {
    pub wallet_addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CorrelationResponse {
    pub global_stats: CorrelationGlobalStatsDto,
    pub pairs: Vec<CorrelationPairDto>,
    pub clusters: Vec<CorrelationClusterDto>,
}

#[derive(Debug, Serialize)]
pub struct CorrelationGlobalStatsDto {
    pub total_unique_tokens: usize,
    pub popular_mints: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CorrelationPairDto {
    pub wallet_a: String,
    pub wallet_b: String,
    pub score: f64,
    pub shared_non_obvious_tokens: Vec<String>,
    pub synchronized_event_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CorrelationClusterDto {
    pub wallets: Vec<String>,
    pub representative_score: f64,
    pub shared_non_obvious_tokens: Vec<String>,
}

/// `GET /tokens/:mint/first-buyers` query parameters.
#[derive(Debug, Deserialize)]
pub struct FirstBuyersQuery {
    pub max_buyers: Option<usize>,
    pub top_n: Option<usize>,
    pub rank_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FirstBuyersResponse {
    pub mint: String,
    pub buyers: serde_json::Value,
}
