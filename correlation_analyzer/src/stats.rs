use std::collections::{HashMap, HashSet};
use tx_mapper::{Direction, SwapAnalysisInput};

#[derive(Debug, Clone, Default)]
pub struct GlobalStats {
    pub total_unique_tokens: usize,
    pub mint_counts: HashMap<String, u64>,
    pub popular_mints: HashSet<String>,
}

/// Wallets that bought more than `max_daily_tokens` distinct mints on any
/// single UTC calendar day are excluded from correlation entirely.
pub fn apply_bot_filter(
    transactions_by_wallet: &HashMap<String, Vec<SwapAnalysisInput>>,
    max_daily_tokens: u32,
) -> HashMap<String, Vec<SwapAnalysisInput>> {
    transactions_by_wallet
        .iter()
        .filter(|(_, txs)| !exceeds_daily_token_cap(txs, max_daily_tokens))
        .map(|(wallet, txs)| (wallet.clone(), txs.clone()))
        .collect()
}

fn exceeds_daily_token_cap(txs: &[SwapAnalysisInput], max_daily_tokens: u32) -> bool {
    let mut per_day: HashMap<chrono::NaiveDate, HashSet<&str>> = HashMap::new();
    for tx in txs {
        if tx.direction != Direction::In || tx.associated_sol_value <= rust_decimal::Decimal::ZERO {
            continue;
        }
        per_day
            .entry(tx_mapper::timestamp_to_datetime(tx.timestamp).date_naive())
            .or_default()
            .insert(tx.mint.as_str());
    }
    per_day.values().any(|mints| mints.len() as u32 > max_daily_tokens)
}

/// Counts mint frequency across every wallet's (already bot-filtered)
/// transactions, ignoring `excluded_mints`, then marks the popular subset:
/// rank below `floor(uniqueMints * popular_percent)`, or raw count above
/// `min_occurrences_for_popular`.
pub fn compute_global_stats(
    transactions_by_wallet: &HashMap<String, Vec<SwapAnalysisInput>>,
    excluded_mints: &HashSet<String>,
    popular_percent: f64,
    min_occurrences_for_popular: u64,
) -> GlobalStats {
    let mut mint_counts: HashMap<String, u64> = HashMap::new();
    for txs in transactions_by_wallet.values() {
        for tx in txs {
            if excluded_mints.contains(&tx.mint) {
                continue;
            }
            *mint_counts.entry(tx.mint.clone()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&String, &u64)> = mint_counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let popular_rank_cutoff = (ranked.len() as f64 * popular_percent).floor() as usize;
    let popular_mints: HashSet<String> = ranked
        .iter()
        .enumerate()
        .filter(|(rank, (_, count))| *rank < popular_rank_cutoff || ***count > min_occurrences_for_popular)
        .map(|(_, (mint, _))| (*mint).clone())
        .collect();

    GlobalStats {
        total_unique_tokens: mint_counts.len(),
        mint_counts,
        popular_mints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tx(mint: &str, dir: Direction, sol: i64, ts: i64) -> SwapAnalysisInput {
        SwapAnalysisInput {
            wallet_address: "w".to_string(),
            signature: format!("sig-{}-{}", mint, ts),
            mint: mint.to_string(),
            direction: dir,
            amount: Decimal::ONE,
            associated_sol_value: Decimal::from(sol),
            timestamp: ts,
            fees_paid_in_sol: None,
        }
    }

    #[test]
    fn counts_unique_mints_across_wallets() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("A", Direction::In, 1, 100), tx("B", Direction::Out, 1, 200)]);
        map.insert("w2".to_string(), vec![tx("C", Direction::In, 1, 300)]);
        let stats = compute_global_stats(&map, &HashSet::new(), 0.0, 10);
        assert_eq!(stats.total_unique_tokens, 3);
    }

    #[test]
    fn excluded_mints_never_counted() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("SOL", Direction::In, 1, 100)]);
        let excluded: HashSet<String> = ["SOL".to_string()].into_iter().collect();
        let stats = compute_global_stats(&map, &excluded, 0.0, 10);
        assert_eq!(stats.total_unique_tokens, 0);
    }

    #[test]
    fn bot_filter_excludes_high_daily_token_count_wallets() {
        let mut map = HashMap::new();
        let day0 = 0i64;
        map.insert(
            "spammer".to_string(),
            vec![
                tx("A", Direction::In, 1, day0),
                tx("B", Direction::In, 1, day0 + 10),
                tx("C", Direction::In, 1, day0 + 20),
            ],
        );
        map.insert("normal".to_string(), vec![tx("A", Direction::In, 1, day0)]);
        let filtered = apply_bot_filter(&map, 2);
        assert!(!filtered.contains_key("spammer"));
        assert!(filtered.contains_key("normal"));
    }
}
