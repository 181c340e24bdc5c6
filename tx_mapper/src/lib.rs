//! Domain types for parsed Solana transactions, and the pure mapping function
//! that turns them into SOL-denominated swap records.
//!
//! The mapping logic mirrors the balance-diffing approach the source used
//! (compute pre/post token balances, diff per mint, net the SOL side against
//! the same transaction) but works over the lightweight transfer/account-data
//! shape the upstream enhanced-transactions API already hands back, so there
//! is no raw-transaction balance bookkeeping left to do here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::trace;

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
const LAMPORTS_PER_SOL: i64 = 1_000_000_000;

/// Upstream enhanced-transaction payloads report token amounts as either a
/// bare JSON number or a numeric string depending on the field, so this
/// accepts both rather than failing a whole batch over one shape mismatch.
fn deserialize_flexible_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleDecimalVisitor;

    impl<'de> Visitor<'de> for FlexibleDecimalVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or numeric string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Decimal, E> {
            v.parse::<Decimal>().map_err(de::Error::custom)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Decimal, E> {
            Decimal::try_from(v).map_err(de::Error::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Decimal, E> {
            Ok(Decimal::from(v))
        }
    }

    deserializer.deserialize_any(FlexibleDecimalVisitor)
}

#[derive(Debug, Clone, Deserialize)]
struct RawTokenAmount {
    #[serde(rename = "tokenAmount", deserialize_with = "deserialize_flexible_decimal")]
    token_amount: Decimal,
}

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("malformed parsed transaction {signature}: {reason}")]
    MalformedTransaction { signature: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MapperError>;

/// Direction of a token movement relative to the wallet being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Transient result of signature pagination; never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    pub block_time: Option<i64>,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
}

impl SignatureInfo {
    pub fn failed(&self) -> bool {
        self.err.is_some()
    }
}

/// A single SPL token transfer leg as reported by the enhanced-transactions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub mint: String,
    #[serde(deserialize_with = "deserialize_flexible_decimal")]
    pub token_amount: Decimal,
}

/// A native SOL transfer leg, denominated in lamports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    #[serde(rename = "amount")]
    pub amount_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceChange {
    pub user_account: String,
    pub mint: String,
    #[serde(rename = "rawTokenAmount")]
    raw_token_amount_wire: RawTokenAmount,
}

impl TokenBalanceChange {
    pub fn raw_token_amount(&self) -> Decimal {
        self.raw_token_amount_wire.token_amount
    }
}

/// Account-level balance deltas, used when a mint or SOL change shows up
/// only as a pre/post balance diff rather than an explicit transfer leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub account: String,
    #[serde(default)]
    pub native_balance_change: i64,
    #[serde(default)]
    pub token_balance_changes: Vec<TokenBalanceChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTokenLeg {
    pub mint: String,
    pub user_account: String,
}

/// Minimal swap-event marker; only used for address-relevance checks during
/// ingestion post-processing, not for PnL accounting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    #[serde(default)]
    pub token_inputs: Vec<SwapTokenLeg>,
    #[serde(default)]
    pub token_outputs: Vec<SwapTokenLeg>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedTransactionEvents {
    pub swap: Option<SwapEvent>,
}

/// Opaque externally produced record; never mutated once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub signature: String,
    pub timestamp: i64,
    pub fee_payer: String,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
    #[serde(default)]
    pub native_transfers: Vec<NativeTransfer>,
    #[serde(default)]
    pub account_data: Vec<AccountData>,
    #[serde(default)]
    pub events: ParsedTransactionEvents,
}

impl ParsedTransaction {
    /// True if `address` is a plausible actor in this transaction: fee payer,
    /// a transfer participant, an account-data entry with a non-zero delta,
    /// or a swap-event token-list participant.
    pub fn involves_address(&self, address: &str) -> bool {
        if self.fee_payer == address {
            return true;
        }
        if self
            .token_transfers
            .iter()
            .any(|t| t.from_user_account == address || t.to_user_account == address)
        {
            return true;
        }
        if self
            .native_transfers
            .iter()
            .any(|t| t.from_user_account == address || t.to_user_account == address)
        {
            return true;
        }
        if self.account_data.iter().any(|a| {
            a.account == address
                && (a.native_balance_change != 0
                    || a.token_balance_changes.iter().any(|c| !c.raw_token_amount().is_zero()))
        }) {
            return true;
        }
        if let Some(swap) = &self.events.swap {
            if swap
                .token_inputs
                .iter()
                .chain(swap.token_outputs.iter())
                .any(|leg| leg.user_account == address)
            {
                return true;
            }
        }
        false
    }
}

/// Uniqueness key: `(signature, mint, direction, amount)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapAnalysisInput {
    pub wallet_address: String,
    pub signature: String,
    pub mint: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub associated_sol_value: Decimal,
    pub timestamp: i64,
    pub fees_paid_in_sol: Option<Decimal>,
}

/// Projection used by analytics components (C8, C9).
#[derive(Debug, Clone)]
pub struct TransactionData {
    pub mint: String,
    pub timestamp: i64,
    pub direction: Direction,
    pub amount: Decimal,
    pub associated_sol_value: Decimal,
}

impl From<&SwapAnalysisInput> for TransactionData {
    fn from(s: &SwapAnalysisInput) -> Self {
        Self {
            mint: s.mint.clone(),
            timestamp: s.timestamp,
            direction: s.direction,
            amount: s.amount,
            associated_sol_value: s.associated_sol_value,
        }
    }
}

/// WSOL (`SOL_MINT`) transfers are wrapped native SOL, not an SPL token the
/// wallet holds a position in, so they net into the SOL side of the swap
/// alongside `native_transfers`/`native_balance_change` rather than showing
/// up as a separate token leg.
fn wallet_sol_net(tx: &ParsedTransaction, wallet: &str) -> Decimal {
    let mut lamports: i64 = 0;
    for t in &tx.native_transfers {
        if t.to_user_account == wallet {
            lamports += t.amount_lamports;
        }
        if t.from_user_account == wallet {
            lamports -= t.amount_lamports;
        }
    }
    for a in &tx.account_data {
        if a.account == wallet {
            lamports += a.native_balance_change;
        }
    }
    let mut sol = Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL);

    for t in &tx.token_transfers {
        if t.mint != SOL_MINT {
            continue;
        }
        if t.to_user_account == wallet {
            sol += t.token_amount;
        }
        if t.from_user_account == wallet {
            sol -= t.token_amount;
        }
    }
    for a in &tx.account_data {
        for c in &a.token_balance_changes {
            if c.mint == SOL_MINT && c.user_account == wallet {
                sol += c.raw_token_amount();
            }
        }
    }

    sol
}

fn wallet_token_net(tx: &ParsedTransaction, wallet: &str) -> HashMap<String, Decimal> {
    let mut net: HashMap<String, Decimal> = HashMap::new();
    for t in &tx.token_transfers {
        if t.mint == SOL_MINT {
            continue;
        }
        if t.to_user_account == wallet {
            *net.entry(t.mint.clone()).or_insert(Decimal::ZERO) += t.token_amount;
        }
        if t.from_user_account == wallet {
            *net.entry(t.mint.clone()).or_insert(Decimal::ZERO) -= t.token_amount;
        }
    }
    for a in &tx.account_data {
        for c in &a.token_balance_changes {
            if c.mint == SOL_MINT {
                continue;
            }
            if c.user_account == wallet {
                *net.entry(c.mint.clone()).or_insert(Decimal::ZERO) += c.raw_token_amount();
            }
        }
    }
    net
}

/// Pure, deterministic mapping from parsed transactions to swap records.
/// Collapses token transfers and account-data deltas per `(mint, direction)`
/// within a transaction and emits one record per non-zero net change.
pub fn map_transactions(wallet_address: &str, txs: &[ParsedTransaction]) -> Vec<SwapAnalysisInput> {
    let mut out = Vec::new();
    for tx in txs {
        let sol_net = wallet_sol_net(tx, wallet_address).abs();
        let token_net = wallet_token_net(tx, wallet_address);

        for (mint, diff) in token_net {
            if diff.is_zero() {
                continue;
            }
            let direction = if diff > Decimal::ZERO { Direction::In } else { Direction::Out };
            trace!(signature = %tx.signature, %mint, ?direction, amount = %diff.abs(), "mapped swap leg");
            out.push(SwapAnalysisInput {
                wallet_address: wallet_address.to_string(),
                signature: tx.signature.clone(),
                mint,
                direction,
                amount: diff.abs(),
                associated_sol_value: sol_net,
                timestamp: tx.timestamp,
                fees_paid_in_sol: None,
            });
        }
    }
    out
}

pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(sig: &str, ts: i64, transfers: Vec<TokenTransfer>, native: Vec<NativeTransfer>) -> ParsedTransaction {
        ParsedTransaction {
            signature: sig.to_string(),
            timestamp: ts,
            fee_payer: "wallet".to_string(),
            token_transfers: transfers,
            native_transfers: native,
            account_data: vec![],
            events: ParsedTransactionEvents::default(),
        }
    }

    #[test]
    fn maps_a_simple_buy() {
        let t = tx(
            "sig1",
            1000,
            vec![TokenTransfer {
                from_user_account: "pool".to_string(),
                to_user_account: "wallet".to_string(),
                mint: "mintA".to_string(),
                token_amount: Decimal::new(10, 0),
            }],
            vec![NativeTransfer {
                from_user_account: "wallet".to_string(),
                to_user_account: "pool".to_string(),
                amount_lamports: 1_000_000_000,
            }],
        );

        let records = map_transactions("wallet", &[t]);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.direction, Direction::In);
        assert_eq!(r.mint, "mintA");
        assert_eq!(r.amount, Decimal::new(10, 0));
        assert_eq!(r.associated_sol_value, Decimal::new(1, 0));
    }

    #[test]
    fn collapses_multiple_legs_for_same_mint() {
        let t = tx(
            "sig2",
            1000,
            vec![
                TokenTransfer {
                    from_user_account: "pool".to_string(),
                    to_user_account: "wallet".to_string(),
                    mint: "mintA".to_string(),
                    token_amount: Decimal::new(10, 0),
                },
                TokenTransfer {
                    from_user_account: "wallet".to_string(),
                    to_user_account: "pool2".to_string(),
                    mint: "mintA".to_string(),
                    token_amount: Decimal::new(3, 0),
                },
            ],
            vec![],
        );

        let records = map_transactions("wallet", &[t]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, Decimal::new(7, 0));
        assert_eq!(records[0].direction, Direction::In);
    }

    #[test]
    fn zero_net_change_emits_nothing() {
        let t = tx(
            "sig3",
            1000,
            vec![
                TokenTransfer {
                    from_user_account: "pool".to_string(),
                    to_user_account: "wallet".to_string(),
                    mint: "mintA".to_string(),
                    token_amount: Decimal::new(5, 0),
                },
                TokenTransfer {
                    from_user_account: "wallet".to_string(),
                    to_user_account: "pool".to_string(),
                    mint: "mintA".to_string(),
                    token_amount: Decimal::new(5, 0),
                },
            ],
            vec![],
        );

        assert!(map_transactions("wallet", &[t]).is_empty());
    }

    #[test]
    fn wsol_transfers_fund_the_associated_sol_value_not_a_separate_leg() {
        let t = tx(
            "sig4",
            1000,
            vec![
                TokenTransfer {
                    from_user_account: "wallet".to_string(),
                    to_user_account: "pool".to_string(),
                    mint: SOL_MINT.to_string(),
                    token_amount: Decimal::new(2, 0),
                },
                TokenTransfer {
                    from_user_account: "pool".to_string(),
                    to_user_account: "wallet".to_string(),
                    mint: "mintA".to_string(),
                    token_amount: Decimal::new(10, 0),
                },
            ],
            vec![],
        );

        let records = map_transactions("wallet", &[t]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mint, "mintA");
        assert_eq!(records[0].direction, Direction::In);
        assert_eq!(records[0].associated_sol_value, Decimal::new(2, 0));
    }

    #[test]
    fn involves_address_checks_all_participant_surfaces() {
        let t = tx("sig5", 1000, vec![], vec![]);
        assert!(t.involves_address("wallet"));
        assert!(!t.involves_address("someone_else"));
    }

    #[test]
    fn deterministic_across_repeated_calls() {
        let t = tx(
            "sig6",
            1000,
            vec![TokenTransfer {
                from_user_account: "pool".to_string(),
                to_user_account: "wallet".to_string(),
                mint: "mintA".to_string(),
                token_amount: Decimal::new(10, 0),
            }],
            vec![],
        );
        let a = map_transactions("wallet", &[t.clone()]);
        let b = map_transactions("wallet", &[t]);
        assert_eq!(a, b);
    }
}
