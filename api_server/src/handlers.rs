//! Handlers for the four routes: wallet sync, wallet PnL, correlation
//! analysis, and mint first-buyers. Each delegates to a core component and
//! maps its typed error into `ApiError`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::collections::HashMap;

use analytics_flows::{first_buyers, top_traders, FirstBuyersParams, RankBy};
use ingestion_engine::{sync_wallet, IngestParams, SyncOptions};
use persistence_layer::SwapStore;
use pnl_core::classify_holding_behavior;

use crate::types::*;
use crate::{ApiError, AppState};

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

pub async fn sync_wallet_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(body): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let defaults = SyncOptions::default();
    let options = SyncOptions {
        smart_fetch: body.smart_fetch.unwrap_or(defaults.smart_fetch),
        target_tx_count: body.target_tx_count.unwrap_or(defaults.target_tx_count),
    };
    let params = IngestParams::from_config(&state.config.ingestion);

    let report = sync_wallet(&state.rpc, &state.gateway, &address, &options, &params).await?;

    Ok(Json(SyncResponse {
        wallet_address: address,
        transactions_ingested: report.transactions_ingested,
        swaps_saved: report.swaps_saved,
    }))
}

pub async fn wallet_pnl_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<WalletPnlResponse>, ApiError> {
    let swap_store = SwapStore::new(&state.gateway);
    let records = swap_store.get_by_wallet(&address, None).await?;

    if records.is_empty() {
        return Err(ApiError::NotFound(format!("no swap history for wallet {address}")));
    }

    let by_wallet: HashMap<String, Vec<tx_mapper::SwapAnalysisInput>> =
        std::iter::once((address.clone(), records)).collect();
    let pnl = pnl_core::pnl(&by_wallet).remove(&address).unwrap_or_default();
    let dominant_behavior =
        classify_holding_behavior(&by_wallet).remove(&address).map(|b| format!("{:?}", b.dominant));

    Ok(Json(WalletPnlResponse {
        wallet_address: address,
        realized_sol: pnl.realized_sol,
        total_volume_sol: pnl.total_volume_sol,
        dominant_behavior,
    }))
}

pub async fn correlation_analyze_handler(
    State(state): State<AppState>,
    Json(body): Json<CorrelationRequest>,
) -> Result<Json<CorrelationResponse>, ApiError> {
    if body.wallet_addresses.is_empty() {
        return Err(ApiError::Validation("wallet_addresses must be non-empty".to_string()));
    }

    let swap_store = SwapStore::new(&state.gateway);
    let mut by_wallet = HashMap::with_capacity(body.wallet_addresses.len());
    for address in &body.wallet_addresses {
        let records = swap_store.get_by_wallet(address, None).await?;
        by_wallet.insert(address.clone(), records);
    }

    let report = correlation_analyzer::analyze(&by_wallet, &state.config.correlation);

    Ok(Json(CorrelationResponse {
        global_stats: CorrelationGlobalStatsDto {
            total_unique_tokens: report.global_stats.total_unique_tokens,
            popular_mints: report.global_stats.popular_mints.into_iter().collect(),
        },
        pairs: report
            .pairs
            .into_iter()
            .map(|p| CorrelationPairDto {
                wallet_a: p.wallet_a,
                wallet_b: p.wallet_b,
                score: p.score,
                shared_non_obvious_tokens: p.shared_non_obvious.into_iter().map(|m| m.mint).collect(),
                synchronized_event_count: p.sync_events.len(),
            })
            .collect(),
        clusters: report
            .clusters
            .into_iter()
            .map(|c| CorrelationClusterDto {
                wallets: c.wallets,
                representative_score: c.score,
                shared_non_obvious_tokens: c.shared_tokens,
            })
            .collect(),
    }))
}

pub async fn first_buyers_handler(
    State(state): State<AppState>,
    Path(mint): Path<String>,
    Query(query): Query<FirstBuyersQuery>,
) -> Result<Json<FirstBuyersResponse>, ApiError> {
    let defaults = FirstBuyersParams::default();
    let params =
        FirstBuyersParams { max_buyers: query.max_buyers.unwrap_or(defaults.max_buyers), ..defaults };
    let buyers = first_buyers(&state.rpc, &mint, &params).await?;

    let buyers_json = match query.top_n {
        None => serde_json::to_value(&buyers).map_err(|e| ApiError::Internal(e.to_string()))?,
        Some(top_n) => {
            let rank_by = match query.rank_by.as_deref() {
                Some("realized_pnl") => RankBy::RealizedPnl,
                _ => RankBy::TokenAmount,
            };
            let sync_params = IngestParams::from_config(&state.config.ingestion);
            let traders =
                top_traders(&state.rpc, &state.gateway, &mint, &buyers, top_n, rank_by, &sync_params).await?;
            serde_json::to_value(&traders).map_err(|e| ApiError::Internal(e.to_string()))?
        }
    };

    Ok(Json(FirstBuyersResponse { mint, buyers: buyers_json }))
}
