//! First-buyers and top-traders over a single mint (C10).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};
use tx_mapper::timestamp_to_datetime;

use ingestion_engine::{sync_wallet, IngestParams, IngestionError, SyncOptions};
use persistence_layer::{PersistenceError, PostgresGateway, SwapStore, WalletStore};
use solana_rpc_client::{SolanaRpcClient, SolanaRpcError};

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("rpc error: {0}")]
    Rpc(#[from] SolanaRpcError),
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirstBuyer {
    pub wallet: String,
    pub first_buy_timestamp: i64,
    pub first_buy_signature: String,
    pub token_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct FirstBuyersParams {
    pub max_buyers: usize,
    pub max_signatures: usize,
    pub batch_size: usize,
}

impl Default for FirstBuyersParams {
    fn default() -> Self {
        Self { max_buyers: 50, max_signatures: 5000, batch_size: 100 }
    }
}

/// Pages signatures for `target` (a mint or a pump.fun bonding-curve
/// address), replays them oldest-first, and records the first wallet to
/// receive a positive amount of `target` in each transfer leg until
/// `max_buyers` distinct wallets are found.
pub async fn first_buyers(
    rpc: &SolanaRpcClient,
    target: &str,
    params: &FirstBuyersParams,
) -> Result<Vec<FirstBuyer>, FlowError> {
    let mut signatures = Vec::new();
    let mut before: Option<String> = None;
    loop {
        let page = rpc.get_signatures_page(target, 1000, before.as_deref()).await?;
        if page.is_empty() {
            break;
        }
        before = page.last().map(|s| s.signature.clone());
        let page_len = page.len();
        signatures.extend(page);
        if signatures.len() >= params.max_signatures || page_len < 1000 {
            break;
        }
    }
    signatures.truncate(params.max_signatures);
    signatures.reverse();

    let mut seen: HashSet<String> = HashSet::new();
    let mut buyers = Vec::new();

    for chunk in signatures.chunks(params.batch_size) {
        if buyers.len() >= params.max_buyers {
            break;
        }
        let raw_sigs: Vec<String> = chunk.iter().map(|s| s.signature.clone()).collect();
        let batch = rpc.get_transactions_batch(&raw_sigs).await?;
        let mut ordered = batch.transactions;
        ordered.sort_by_key(|tx| tx.timestamp);

        for tx in &ordered {
            for transfer in &tx.token_transfers {
                if transfer.mint != target {
                    continue;
                }
                if transfer.token_amount <= Decimal::ZERO {
                    continue;
                }
                if transfer.to_user_account == target {
                    continue;
                }
                if seen.insert(transfer.to_user_account.clone()) {
                    buyers.push(FirstBuyer {
                        wallet: transfer.to_user_account.clone(),
                        first_buy_timestamp: tx.timestamp,
                        first_buy_signature: tx.signature.clone(),
                        token_amount: transfer.token_amount,
                    });
                    if buyers.len() >= params.max_buyers {
                        break;
                    }
                }
            }
            if buyers.len() >= params.max_buyers {
                break;
            }
        }
    }

    info!(target, found = buyers.len(), "first-buyers scan complete");
    Ok(buyers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankBy {
    #[default]
    TokenAmount,
    RealizedPnl,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopTrader {
    pub wallet: String,
    pub first_buy_timestamp: i64,
    pub token_amount: Decimal,
    pub realized_pnl_sol: Decimal,
    pub volume_sol: Decimal,
}

/// For each first buyer, ensures a swap history exists (triggering a sync
/// if the wallet has never been ingested), aggregates realized PnL and
/// volume scoped to `mint`, and returns the top `top_n` under `rank_by`.
pub async fn top_traders(
    rpc: &SolanaRpcClient,
    gateway: &PostgresGateway,
    mint: &str,
    buyers: &[FirstBuyer],
    top_n: usize,
    rank_by: RankBy,
    sync_params: &IngestParams,
) -> Result<Vec<TopTrader>, FlowError> {
    let wallet_store = WalletStore::new(gateway);
    let swap_store = SwapStore::new(gateway);

    let mut traders = Vec::with_capacity(buyers.len());
    for buyer in buyers {
        if wallet_store.get(&buyer.wallet).await?.is_none() {
            if let Err(e) = sync_wallet(rpc, gateway, &buyer.wallet, &SyncOptions::default(), sync_params).await {
                warn!(wallet = %buyer.wallet, error = %e, "could not sync buyer before ranking, skipping");
                continue;
            }
        }

        let history = swap_store.get_by_wallet(&buyer.wallet, None).await?;
        let scoped: Vec<tx_mapper::SwapAnalysisInput> = history.into_iter().filter(|r| r.mint == mint).collect();
        let scoped_by_wallet: std::collections::HashMap<String, Vec<tx_mapper::SwapAnalysisInput>> =
            std::iter::once((buyer.wallet.clone(), scoped)).collect();
        let wallet_pnl = pnl_core::pnl(&scoped_by_wallet).remove(&buyer.wallet).unwrap_or_default();

        traders.push(TopTrader {
            wallet: buyer.wallet.clone(),
            first_buy_timestamp: buyer.first_buy_timestamp,
            token_amount: buyer.token_amount,
            realized_pnl_sol: wallet_pnl.realized_sol,
            volume_sol: wallet_pnl.total_volume_sol,
        });
    }

    match rank_by {
        RankBy::TokenAmount => traders.sort_by(|a, b| b.token_amount.cmp(&a.token_amount)),
        RankBy::RealizedPnl => traders.sort_by(|a, b| b.realized_pnl_sol.cmp(&a.realized_pnl_sol)),
    }
    traders.truncate(top_n);
    Ok(traders)
}

pub fn first_buy_date(buyer: &FirstBuyer) -> DateTime<Utc> {
    timestamp_to_datetime(buyer.first_buy_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer(wallet: &str, amount: i64) -> FirstBuyer {
        FirstBuyer {
            wallet: wallet.to_string(),
            first_buy_timestamp: 1000,
            first_buy_signature: "sig".to_string(),
            token_amount: Decimal::from(amount),
        }
    }

    #[test]
    fn rank_by_defaults_to_token_amount() {
        assert_eq!(RankBy::default(), RankBy::TokenAmount);
    }

    #[test]
    fn first_buy_date_converts_from_unix_timestamp() {
        let b = buyer("w1", 10);
        assert_eq!(first_buy_date(&b).timestamp(), 1000);
    }
}
