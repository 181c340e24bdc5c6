//! Wallet correlation analysis: shared non-obvious mints, synchronized
//! trades, and cluster extraction over a batch of wallets' mapped swaps.

pub mod clusters;
pub mod pairs;
pub mod stats;

pub use clusters::{extract_clusters, Cluster};
pub use pairs::{analyze_pairs, PairParams, SharedMint, SyncEvent, WalletPair};
pub use stats::{apply_bot_filter, compute_global_stats, GlobalStats};

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use tx_mapper::SwapAnalysisInput;

#[derive(Debug, Clone)]
pub struct CorrelationReport {
    pub global_stats: GlobalStats,
    pub pairs: Vec<WalletPair>,
    pub clusters: Vec<Cluster>,
}

/// Runs the full pipeline: bot filter, global token stats, pairwise scoring,
/// cluster extraction. Never errors on empty input; an empty wallet set
/// yields an empty report and a logged warning, per the analytic-components
/// surfacing policy.
pub fn analyze(
    transactions_by_wallet: &HashMap<String, Vec<SwapAnalysisInput>>,
    cfg: &config_manager::CorrelationConfig,
) -> CorrelationReport {
    if transactions_by_wallet.is_empty() {
        warn!("correlation analysis invoked with no wallets");
        return CorrelationReport { global_stats: GlobalStats::default(), pairs: vec![], clusters: vec![] };
    }

    let excluded: HashSet<String> = cfg.excluded_mints.iter().cloned().collect();
    let filtered = apply_bot_filter(transactions_by_wallet, cfg.max_daily_tokens_for_filter);
    let global_stats =
        compute_global_stats(&filtered, &excluded, cfg.popular_percent, cfg.min_occurrences_for_popular);

    let pair_params = PairParams {
        sync_time_window_seconds: cfg.sync_time_window_seconds,
        weight_shared_non_obvious: cfg.weight_shared_non_obvious,
        weight_sync_events: cfg.weight_sync_events,
        min_shared_non_obvious: cfg.min_shared_non_obvious,
        min_sync_events: cfg.min_sync_events,
    };
    let pairs = analyze_pairs(&filtered, &global_stats, &excluded, &pair_params);
    let clusters = extract_clusters(&pairs, cfg.min_cluster_score_threshold);

    info!(
        wallets = filtered.len(),
        pairs = pairs.len(),
        clusters = clusters.len(),
        "correlation analysis complete"
    );

    CorrelationReport { global_stats, pairs, clusters }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tx_mapper::Direction;

    fn cfg() -> config_manager::CorrelationConfig {
        config_manager::SystemConfig::default().correlation
    }

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

    #[test]
    fn two_disjoint_wallets_report_no_pairs_or_clusters() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("w1", "A", Direction::In, 1), tx("w1", "B", Direction::Out, 2)]);
        map.insert("w2".to_string(), vec![tx("w2", "C", Direction::In, 3)]);
        let report = analyze(&map, &cfg());
        assert!(report.pairs.is_empty());
        assert!(report.clusters.is_empty());
        assert_eq!(report.global_stats.total_unique_tokens, 3);
    }

    #[test]
    fn empty_input_never_panics() {
        let report = analyze(&HashMap::new(), &cfg());
        assert!(report.pairs.is_empty());
    }
}
