//! `swap_analysis_input` table. Uniqueness key `(signature, mint, direction, amount)`;
//! the source hits float-rounding collisions on this key under certain
//! database backends and falls back to one-at-a-time inserts. Amounts here
//! are `rust_decimal::Decimal` (fixed-point), which mostly sidesteps the
//! collision, but the batch-then-individual-retry fallback is kept as
//! defense in depth per the Open Question decision in DESIGN.md.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, warn};
use tx_mapper::{Direction, SwapAnalysisInput, TransactionData};

use crate::{PersistenceError, PostgresGateway, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveResult {
    pub inserted: usize,
    pub duplicates_skipped: usize,
}

pub struct SwapStore<'a> {
    gateway: &'a PostgresGateway,
}

fn direction_str(d: Direction) -> &'static str {
    match d {
        Direction::In => "in",
        Direction::Out => "out",
    }
}

fn direction_from_str(s: &str) -> Direction {
    match s {
        "in" => Direction::In,
        _ => Direction::Out,
    }
}

impl<'a> SwapStore<'a> {
    pub fn new(gateway: &'a PostgresGateway) -> Self {
        Self { gateway }
    }

    async fn insert_one(&self, record: &SwapAnalysisInput) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO swap_analysis_input \
             (wallet_address, signature, mint, direction, amount, associated_sol_value, timestamp, fees_paid_in_sol) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (signature, mint, direction, amount) DO NOTHING",
        )
        .bind(&record.wallet_address)
        .bind(&record.signature)
        .bind(&record.mint)
        .bind(direction_str(record.direction))
        .bind(record.amount)
        .bind(record.associated_sol_value)
        .bind(record.timestamp)
        .bind(record.fees_paid_in_sol)
        .execute(&self.gateway.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Batch-inserts, then retries any row individually if the batch as a
    /// whole failed on the unique constraint, so one colliding row never
    /// blocks the rest of the batch from persisting.
    pub async fn save(&self, records: &[SwapAnalysisInput]) -> Result<SaveResult> {
        if records.is_empty() {
            return Ok(SaveResult::default());
        }

        let mut tx = self.gateway.pool.begin().await?;
        let mut batch_ok = true;
        for record in records {
            let outcome = sqlx::query(
                "INSERT INTO swap_analysis_input \
                 (wallet_address, signature, mint, direction, amount, associated_sol_value, timestamp, fees_paid_in_sol) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (signature, mint, direction, amount) DO NOTHING",
            )
            .bind(&record.wallet_address)
            .bind(&record.signature)
            .bind(&record.mint)
            .bind(direction_str(record.direction))
            .bind(record.amount)
            .bind(record.associated_sol_value)
            .bind(record.timestamp)
            .bind(record.fees_paid_in_sol)
            .execute(&mut *tx)
            .await;

            if outcome.is_err() {
                batch_ok = false;
                break;
            }
        }

        if batch_ok {
            tx.commit().await?;
            return Ok(SaveResult { inserted: records.len(), duplicates_skipped: 0 });
        }

        tx.rollback().await?;
        warn!("swap batch insert failed, falling back to individual inserts");

        let mut inserted = 0;
        let mut duplicates_skipped = 0;
        for record in records {
            match self.insert_one(record).await {
                Ok(true) => inserted += 1,
                Ok(false) => duplicates_skipped += 1,
                Err(PersistenceError::Database(e)) if is_unique_violation(&e) => {
                    duplicates_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        debug!(inserted, duplicates_skipped, "swap store save complete");
        Ok(SaveResult { inserted, duplicates_skipped })
    }

    pub async fn get_by_wallet(
        &self,
        wallet_address: &str,
        time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<SwapAnalysisInput>> {
        let rows = if let Some((from, to)) = time_range {
            sqlx::query(
                "SELECT * FROM swap_analysis_input WHERE wallet_address = $1 \
                 AND timestamp >= $2 AND timestamp <= $3 ORDER BY timestamp ASC",
            )
            .bind(wallet_address)
            .bind(from.timestamp())
            .bind(to.timestamp())
            .fetch_all(&self.gateway.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM swap_analysis_input WHERE wallet_address = $1 ORDER BY timestamp ASC",
            )
            .bind(wallet_address)
            .fetch_all(&self.gateway.pool)
            .await?
        };

        Ok(rows.into_iter().map(row_to_swap_analysis_input).collect())
    }

    pub async fn get_by_wallets(
        &self,
        wallet_addresses: &[String],
        exclude_mints: &[String],
        time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<HashMap<String, Vec<TransactionData>>> {
        if wallet_addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT * FROM swap_analysis_input WHERE wallet_address = ANY($1) \
             AND NOT (mint = ANY($2)) \
             AND ($3::bigint IS NULL OR timestamp >= $3) \
             AND ($4::bigint IS NULL OR timestamp <= $4) \
             ORDER BY timestamp ASC",
        )
        .bind(wallet_addresses)
        .bind(exclude_mints)
        .bind(time_range.map(|(from, _)| from.timestamp()))
        .bind(time_range.map(|(_, to)| to.timestamp()))
        .fetch_all(&self.gateway.pool)
        .await?;

        let mut out: HashMap<String, Vec<TransactionData>> = HashMap::new();
        for row in rows {
            let wallet_address: String = row.get("wallet_address");
            let record = row_to_swap_analysis_input(row);
            out.entry(wallet_address).or_default().push(TransactionData::from(&record));
        }
        Ok(out)
    }
}

fn row_to_swap_analysis_input(row: sqlx::postgres::PgRow) -> SwapAnalysisInput {
    SwapAnalysisInput {
        wallet_address: row.get("wallet_address"),
        signature: row.get("signature"),
        mint: row.get("mint"),
        direction: direction_from_str(row.get::<String, _>("direction").as_str()),
        amount: row.get("amount"),
        associated_sol_value: row.get("associated_sol_value"),
        timestamp: row.get("timestamp"),
        fees_paid_in_sol: row.try_get::<Option<Decimal>, _>("fees_paid_in_sol").unwrap_or(None),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err.as_database_error().and_then(|e| e.code()), Some(code) if code == "23505")
}
