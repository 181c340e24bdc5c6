//! SOL-denominated P&L and holding-time behavior, generalized from the
//! teacher's USD-priced FIFO lot matching to work directly off
//! `SwapAnalysisInput` records (no price fetcher, no external oracle).

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;
use tx_mapper::{Direction, SwapAnalysisInput};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletPnl {
    pub realized_sol: Decimal,
    pub total_volume_sol: Decimal,
}

/// `realizedSol = Σ associatedSolValue(out) − Σ associatedSolValue(in)`, zero-SOL
/// entries excluded from both sums. `totalVolumeSol = Σ |associatedSolValue|`.
pub fn pnl(transactions_by_wallet: &HashMap<String, Vec<SwapAnalysisInput>>) -> HashMap<String, WalletPnl> {
    let mut out = HashMap::with_capacity(transactions_by_wallet.len());

    for (wallet, txs) in transactions_by_wallet {
        let mut result = WalletPnl::default();
        for tx in txs {
            if tx.associated_sol_value.is_zero() {
                continue;
            }
            result.total_volume_sol += tx.associated_sol_value.abs();
            match tx.direction {
                Direction::Out => result.realized_sol += tx.associated_sol_value,
                Direction::In => result.realized_sol -= tx.associated_sol_value,
            }
        }
        out.insert(wallet.clone(), result);
    }

    if out.is_empty() {
        debug!("pnl() called with no wallets");
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Behavior {
    Flipper,
    Scalper,
    Swing,
    Holder,
}

impl Behavior {
    fn classify(hold_seconds: i64) -> Behavior {
        const MINUTE: i64 = 60;
        const HOUR: i64 = 3600;
        const DAY: i64 = 86400;
        if hold_seconds < 5 * MINUTE {
            Behavior::Flipper
        } else if hold_seconds < HOUR {
            Behavior::Scalper
        } else if hold_seconds < DAY {
            Behavior::Swing
        } else {
            Behavior::Holder
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorCounts {
    pub flipper: u32,
    pub scalper: u32,
    pub swing: u32,
    pub holder: u32,
}

impl BehaviorCounts {
    fn increment(&mut self, b: Behavior) {
        match b {
            Behavior::Flipper => self.flipper += 1,
            Behavior::Scalper => self.scalper += 1,
            Behavior::Swing => self.swing += 1,
            Behavior::Holder => self.holder += 1,
        }
    }

    /// Mode of the recorded round-trips; ties break toward the shorter bucket
    /// (`Flipper` < `Scalper` < `Swing` < `Holder`).
    fn dominant(&self) -> Option<Behavior> {
        let counts = [
            (Behavior::Flipper, self.flipper),
            (Behavior::Scalper, self.scalper),
            (Behavior::Swing, self.swing),
            (Behavior::Holder, self.holder),
        ];
        counts
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .max_by_key(|(b, n)| (*n, std::cmp::Reverse(*b)))
            .map(|(b, _)| b)
    }
}

#[derive(Debug, Clone)]
pub struct WalletBehavior {
    pub dominant: Behavior,
    pub counts: BehaviorCounts,
}

/// FIFO-matches each wallet's `in` records against later `out` records per
/// mint (earliest open `in` closes against the earliest subsequent `out`)
/// and classifies the resulting hold durations, mirroring the queue-draining
/// shape of the teacher's partial FIFO matcher without the SOL-cost
/// bookkeeping that classification doesn't need.
pub fn classify_holding_behavior(
    transactions_by_wallet: &HashMap<String, Vec<SwapAnalysisInput>>,
) -> HashMap<String, WalletBehavior> {
    let mut out = HashMap::new();

    for (wallet, txs) in transactions_by_wallet {
        let mut by_mint: HashMap<&str, Vec<&SwapAnalysisInput>> = HashMap::new();
        for tx in txs {
            by_mint.entry(tx.mint.as_str()).or_default().push(tx);
        }

        let mut counts = BehaviorCounts::default();
        for (_mint, mut mint_txs) in by_mint {
            mint_txs.sort_by_key(|t| t.timestamp);

            let mut open_ins: std::collections::VecDeque<i64> = std::collections::VecDeque::new();
            for tx in mint_txs {
                match tx.direction {
                    Direction::In => open_ins.push_back(tx.timestamp),
                    Direction::Out => {
                        if let Some(open) = open_ins.pop_front() {
                            if tx.timestamp >= open {
                                let hold_seconds = tx.timestamp - open;
                                counts.increment(Behavior::classify(hold_seconds));
                            }
                        }
                    }
                }
            }
        }

        if let Some(dominant) = counts.dominant() {
            out.insert(wallet.clone(), WalletBehavior { dominant, counts });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tx(wallet: &str, mint: &str, dir: Direction, amount: i64, sol: i64, ts: i64) -> SwapAnalysisInput {
        SwapAnalysisInput {
            wallet_address: wallet.to_string(),
            signature: format!("sig-{}-{}", mint, ts),
            mint: mint.to_string(),
            direction: dir,
            amount: Decimal::from(amount),
            associated_sol_value: Decimal::from(sol),
            timestamp: ts,
            fees_paid_in_sol: None,
        }
    }

    #[test]
    fn realized_pnl_nets_out_minus_in() {
        let mut map = HashMap::new();
        map.insert(
            "w1".to_string(),
            vec![
                tx("w1", "X", Direction::In, 10, 5, 100),
                tx("w1", "X", Direction::Out, 10, 8, 200),
            ],
        );
        let result = pnl(&map);
        let w1 = result.get("w1").unwrap();
        assert_eq!(w1.realized_sol, Decimal::from(3));
        assert_eq!(w1.total_volume_sol, Decimal::from(13));
    }

    #[test]
    fn zero_sol_entries_excluded_from_both_sums() {
        let mut map = HashMap::new();
        map.insert(
            "w1".to_string(),
            vec![tx("w1", "X", Direction::In, 10, 0, 100)],
        );
        let result = pnl(&map);
        let w1 = result.get("w1").unwrap();
        assert_eq!(w1.realized_sol, Decimal::ZERO);
        assert_eq!(w1.total_volume_sol, Decimal::ZERO);
    }

    #[test]
    fn classifies_a_flipper_round_trip() {
        let mut map = HashMap::new();
        map.insert(
            "w1".to_string(),
            vec![
                tx("w1", "X", Direction::In, 10, 5, 1000),
                tx("w1", "X", Direction::Out, 10, 6, 1100), // 100s hold
            ],
        );
        let behavior = classify_holding_behavior(&map);
        let w1 = behavior.get("w1").unwrap();
        assert_eq!(w1.dominant, Behavior::Flipper);
        assert_eq!(w1.counts.flipper, 1);
    }

    #[test]
    fn dominant_breaks_ties_toward_shorter_bucket() {
        let mut map = HashMap::new();
        map.insert(
            "w1".to_string(),
            vec![
                // flipper round trip
                tx("w1", "X", Direction::In, 10, 5, 0),
                tx("w1", "X", Direction::Out, 10, 6, 100),
                // holder round trip on a different mint
                tx("w1", "Y", Direction::In, 10, 5, 0),
                tx("w1", "Y", Direction::Out, 10, 6, 200_000),
            ],
        );
        let behavior = classify_holding_behavior(&map);
        assert_eq!(behavior.get("w1").unwrap().dominant, Behavior::Flipper);
    }

    #[test]
    fn unmatched_in_with_no_later_out_contributes_nothing() {
        let mut map = HashMap::new();
        map.insert("w1".to_string(), vec![tx("w1", "X", Direction::In, 10, 5, 100)]);
        let behavior = classify_holding_behavior(&map);
        assert!(behavior.get("w1").is_none());
    }
}
