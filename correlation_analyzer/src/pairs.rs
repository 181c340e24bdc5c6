use std::collections::HashMap;
use tx_mapper::{Direction, SwapAnalysisInput};

use crate::stats::GlobalStats;

#[derive(Debug, Clone, PartialEq)]
pub struct SharedMint {
    pub mint: String,
    pub count_a: u32,
    pub count_b: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncEvent {
    pub mint: String,
    pub direction: Direction,
    pub timestamp_a: chrono::DateTime<chrono::Utc>,
    pub timestamp_b: chrono::DateTime<chrono::Utc>,
    pub diff_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct WalletPair {
    pub wallet_a: String,
    pub wallet_b: String,
    pub shared_non_obvious: Vec<SharedMint>,
    pub sync_events: Vec<SyncEvent>,
    pub score: f64,
}

pub struct PairParams {
    pub sync_time_window_seconds: i64,
    pub weight_shared_non_obvious: f64,
    pub weight_sync_events: f64,
    pub min_shared_non_obvious: usize,
    pub min_sync_events: usize,
}

/// Scores every unordered wallet pair with at least one transaction each.
pub fn analyze_pairs(
    transactions_by_wallet: &HashMap<String, Vec<SwapAnalysisInput>>,
    global_stats: &GlobalStats,
    excluded_mints: &std::collections::HashSet<String>,
    params: &PairParams,
) -> Vec<WalletPair> {
    let mut wallets: Vec<&String> = transactions_by_wallet
        .iter()
        .filter(|(_, txs)| !txs.is_empty())
        .map(|(w, _)| w)
        .collect();
    wallets.sort();

    let mut pairs = Vec::new();
    for i in 0..wallets.len() {
        for j in (i + 1)..wallets.len() {
            let wallet_a = wallets[i];
            let wallet_b = wallets[j];
            let txs_a = &transactions_by_wallet[wallet_a];
            let txs_b = &transactions_by_wallet[wallet_b];

            if let Some(pair) = score_pair(wallet_a, txs_a, wallet_b, txs_b, global_stats, excluded_mints, params) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

fn score_pair(
    wallet_a: &str,
    txs_a: &[SwapAnalysisInput],
    wallet_b: &str,
    txs_b: &[SwapAnalysisInput],
    global_stats: &GlobalStats,
    excluded_mints: &std::collections::HashSet<String>,
    params: &PairParams,
) -> Option<WalletPair> {
    let mints_a: std::collections::HashSet<&str> = txs_a.iter().map(|t| t.mint.as_str()).collect();
    let mints_b: std::collections::HashSet<&str> = txs_b.iter().map(|t| t.mint.as_str()).collect();

    let mut shared_non_obvious: Vec<SharedMint> = mints_a
        .intersection(&mints_b)
        .filter(|mint| !global_stats.popular_mints.contains(**mint) && !excluded_mints.contains(**mint))
        .map(|mint| SharedMint {
            mint: mint.to_string(),
            count_a: txs_a.iter().filter(|t| t.mint == *mint).count() as u32,
            count_b: txs_b.iter().filter(|t| t.mint == *mint).count() as u32,
        })
        .collect();
    shared_non_obvious.sort_by(|a, b| a.mint.cmp(&b.mint));

    let mut sync_events = Vec::new();
    for shared in &shared_non_obvious {
        let events_a: Vec<&SwapAnalysisInput> = txs_a.iter().filter(|t| t.mint == shared.mint).collect();
        let events_b: Vec<&SwapAnalysisInput> = txs_b.iter().filter(|t| t.mint == shared.mint).collect();
        for ea in &events_a {
            for eb in &events_b {
                if ea.direction != eb.direction {
                    continue;
                }
                let diff = (ea.timestamp - eb.timestamp).abs();
                if diff <= params.sync_time_window_seconds {
                    sync_events.push(SyncEvent {
                        mint: shared.mint.clone(),
                        direction: ea.direction,
                        timestamp_a: tx_mapper::timestamp_to_datetime(ea.timestamp),
                        timestamp_b: tx_mapper::timestamp_to_datetime(eb.timestamp),
                        diff_seconds: diff,
                    });
                }
            }
        }
    }
    sync_events.sort_by(|a, b| a.diff_seconds.cmp(&b.diff_seconds).then_with(|| a.timestamp_a.cmp(&b.timestamp_a)));

    let raw_score = shared_non_obvious.len() as f64 * params.weight_shared_non_obvious
        + sync_events.len() as f64 * params.weight_sync_events;
    let score = (raw_score * 100.0).round() / 100.0;

    let meets_minimum =
        shared_non_obvious.len() >= params.min_shared_non_obvious || sync_events.len() >= params.min_sync_events;

    if score > 0.0 && meets_minimum {
        Some(WalletPair {
            wallet_a: wallet_a.to_string(),
            wallet_b: wallet_b.to_string(),
            shared_non_obvious,
            sync_events,
            score,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    fn tx(wallet: &str, mint: &str, dir: Direction, ts: i64) -> SwapAnalysisInput {
        SwapAnalysisInput {
            wallet_address: wallet.to_string(),
            signature: format!("sig-{}-{}-{}", wallet, mint, ts),
            mint: mint.to_string(),
            direction: dir,
            amount: Decimal::ONE,
            associated_sol_value: Decimal::ONE,
            timestamp: ts,
            fees_paid_in_sol: None,
        }
    }

    fn params() -> PairParams {
        PairParams {
            sync_time_window_seconds: 60,
            weight_shared_non_obvious: 1.0,
            weight_sync_events: 2.0,
            min_shared_non_obvious: 1,
            min_sync_events: 1,
        }
    }

    #[test]
    fn shared_non_obvious_mint_without_sync_scores_w1() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("w1", "X", Direction::In, 100)]);
        map.insert("w2".to_string(), vec![tx("w2", "X", Direction::In, 9999)]);
        let stats = crate::stats::compute_global_stats(&map, &HashSet::new(), 0.0, 10);
        let pairs = analyze_pairs(&map, &stats, &HashSet::new(), &params());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].shared_non_obvious.len(), 1);
        assert!(pairs[0].sync_events.is_empty());
        assert_eq!(pairs[0].score, 1.0);
    }

    #[test]
    fn synchronized_trade_within_window_is_detected() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("w1", "X", Direction::In, 1000)]);
        map.insert("w2".to_string(), vec![tx("w2", "X", Direction::In, 1005)]);
        let stats = crate::stats::compute_global_stats(&map, &HashSet::new(), 0.0, 10);
        let pairs = analyze_pairs(&map, &stats, &HashSet::new(), &params());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].sync_events.len(), 1);
        assert_eq!(pairs[0].sync_events[0].diff_seconds, 5);
    }

    #[test]
    fn disjoint_wallets_produce_no_pairs() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("w1", "A", Direction::In, 1)]);
        map.insert("w2".to_string(), vec![tx("w2", "C", Direction::In, 3)]);
        let stats = crate::stats::compute_global_stats(&map, &HashSet::new(), 0.0, 10);
        let pairs = analyze_pairs(&map, &stats, &HashSet::new(), &params());
        assert!(pairs.is_empty());
    }

    #[test]
    fn popular_mints_never_count_as_shared_non_obvious() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("w1", "X", Direction::In, 100)]);
        map.insert("w2".to_string(), vec![tx("w2", "X", Direction::In, 200)]);
        let mut stats = crate::stats::compute_global_stats(&map, &HashSet::new(), 0.0, 10);
        stats.popular_mints.insert("X".to_string());
        let pairs = analyze_pairs(&map, &stats, &HashSet::new(), &params());
        assert!(pairs.is_empty());
    }
}
