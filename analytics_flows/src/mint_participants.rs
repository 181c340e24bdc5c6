//! Mint-participants flow (C11): who bought a mint in a trailing window
//! before a cutoff timestamp, enriched with wallet-age and stake signals.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;
use tx_mapper::timestamp_to_datetime;

use solana_rpc_client::{SolanaRpcClient, TokenAccountFilter};

use crate::first_buyers::FlowError;

#[derive(Debug, Clone)]
pub struct MintParticipantsParams {
    pub cutoff_ts: i64,
    pub window_seconds: i64,
    pub candidate_window: usize,
    pub tx_count_limit: usize,
    pub creation_scan: CreationScanMode,
    pub creation_skip_if_token_accounts_over: u64,
}

impl MintParticipantsParams {
    pub fn from_config(cfg: &config_manager::MintParticipantsConfig, cutoff_ts: i64) -> Self {
        Self {
            cutoff_ts,
            window_seconds: cfg.window_seconds,
            candidate_window: cfg.candidate_window,
            tx_count_limit: cfg.tx_count_limit,
            creation_scan: parse_creation_scan_mode(&cfg.creation_scan),
            creation_skip_if_token_accounts_over: cfg.creation_skip_if_token_accounts_over,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationScanMode {
    None,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MintParticipant {
    pub wallet: String,
    pub mint: String,
    pub cutoff_ts: i64,
    pub buy_ts: i64,
    pub signature: String,
    pub token_amount: Decimal,
    pub stake_sol: Decimal,
    pub token_accounts_count: u64,
    pub tx_count_scanned: u64,
    pub wallet_created_at_ts: Option<i64>,
    pub account_age_days: Option<f64>,
    pub creation_scan_mode: CreationScanMode,
}

impl CreationScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationScanMode::None => "none",
            CreationScanMode::Full => "full",
        }
    }
}

/// Scans signatures for `mint`, keeps those at or before `cutoff_ts`,
/// batch-fetches details, and emits one `MintParticipant` per wallet whose
/// first positive receive of `mint` falls inside
/// `[cutoff_ts - window_seconds, cutoff_ts]`.
pub async fn mint_participants(
    rpc: &SolanaRpcClient,
    mint: &str,
    params: &MintParticipantsParams,
) -> Result<Vec<MintParticipant>, FlowError> {
    let mut signatures = Vec::new();
    let mut before: Option<String> = None;
    loop {
        let page = rpc.get_signatures_page(mint, 1000, before.as_deref()).await?;
        if page.is_empty() {
            break;
        }
        before = page.last().map(|s| s.signature.clone());
        let page_len = page.len();
        signatures.extend(page.into_iter().filter(|s| s.block_time.map_or(false, |bt| bt <= params.cutoff_ts)));
        if signatures.len() >= params.candidate_window || page_len < 1000 {
            break;
        }
    }
    signatures.truncate(params.candidate_window);

    let window_start = params.cutoff_ts - params.window_seconds;
    let mut seen_wallets: HashSet<(String, String)> = HashSet::new();
    let mut participants = Vec::new();
    let mut scanned = 0u64;

    for chunk in signatures.chunks(100) {
        let raw_sigs: Vec<String> = chunk.iter().map(|s| s.signature.clone()).collect();
        let batch = rpc.get_transactions_batch(&raw_sigs).await?;
        scanned += batch.transactions.len() as u64;

        for tx in &batch.transactions {
            if tx.timestamp < window_start || tx.timestamp > params.cutoff_ts {
                continue;
            }
            for transfer in &tx.token_transfers {
                if transfer.mint != mint || transfer.token_amount <= Decimal::ZERO {
                    continue;
                }
                if transfer.to_user_account == mint {
                    continue;
                }
                let key = (transfer.to_user_account.clone(), tx.signature.clone());
                if !seen_wallets.insert(key) {
                    continue;
                }

                let token_accounts_count = count_token_accounts(rpc, &transfer.to_user_account, mint).await;
                let stake_sol = tx_mapper::map_transactions(&transfer.to_user_account, std::slice::from_ref(tx))
                    .into_iter()
                    .find(|record| record.mint == mint)
                    .map(|record| record.associated_sol_value)
                    .unwrap_or(Decimal::ZERO);

                participants.push(MintParticipant {
                    wallet: transfer.to_user_account.clone(),
                    mint: mint.to_string(),
                    cutoff_ts: params.cutoff_ts,
                    buy_ts: tx.timestamp,
                    signature: tx.signature.clone(),
                    token_amount: transfer.token_amount,
                    stake_sol,
                    token_accounts_count,
                    tx_count_scanned: scanned,
                    wallet_created_at_ts: None,
                    account_age_days: None,
                    creation_scan_mode: params.creation_scan,
                });
            }
        }
        if scanned as usize >= params.tx_count_limit {
            break;
        }
    }

    if params.creation_scan == CreationScanMode::Full {
        for participant in participants.iter_mut() {
            if participant.token_accounts_count > params.creation_skip_if_token_accounts_over {
                continue;
            }
            if let Some(created_at) = estimate_wallet_creation(rpc, &participant.wallet).await {
                participant.wallet_created_at_ts = Some(created_at);
                let age = (Utc::now() - timestamp_to_datetime(created_at)).num_seconds() as f64 / 86_400.0;
                participant.account_age_days = Some(age);
            }
        }
    }

    info!(mint, found = participants.len(), "mint-participants scan complete");
    Ok(participants)
}

async fn count_token_accounts(rpc: &SolanaRpcClient, owner: &str, mint: &str) -> u64 {
    match rpc
        .get_token_accounts_by_owner(owner, TokenAccountFilter::Mint(mint.to_string()), "jsonParsed")
        .await
    {
        Ok(value) => value
            .get("value")
            .and_then(|v| v.as_array())
            .map(|arr| arr.len() as u64)
            .unwrap_or(0),
        Err(_) => 0,
    }
}

/// Best-effort creation-timestamp estimate: oldest signature for the
/// wallet's own address, per the RPC's natural paging order.
async fn estimate_wallet_creation(rpc: &SolanaRpcClient, wallet: &str) -> Option<i64> {
    let mut before: Option<String> = None;
    let mut oldest = None;
    loop {
        let page = rpc.get_signatures_page(wallet, 1000, before.as_deref()).await.ok()?;
        if page.is_empty() {
            break;
        }
        oldest = page.last().and_then(|s| s.block_time).or(oldest);
        before = page.last().map(|s| s.signature.clone());
        if page.len() < 1000 {
            break;
        }
    }
    oldest
}

pub fn parse_creation_scan_mode(s: &str) -> CreationScanMode {
    match s {
        "full" => CreationScanMode::Full,
        _ => CreationScanMode::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_scan_mode_parses_full_and_defaults_to_none() {
        assert_eq!(parse_creation_scan_mode("full"), CreationScanMode::Full);
        assert_eq!(parse_creation_scan_mode("none"), CreationScanMode::None);
        assert_eq!(parse_creation_scan_mode("garbage"), CreationScanMode::None);
    }

    #[test]
    fn creation_scan_mode_as_str_round_trips() {
        assert_eq!(CreationScanMode::Full.as_str(), "full");
        assert_eq!(CreationScanMode::None.as_str(), "none");
    }
}
