//! `helius_transaction_cache` table: "we have already persisted or ruled out
//! this signature." Keyed on signature; idempotent upserts.

use chrono::{DateTime, Utc};
use sqlx::Row;
use std::collections::HashMap;
use tracing::debug;

use crate::{PostgresGateway, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

pub struct TransactionCache<'a> {
    gateway: &'a PostgresGateway,
}

impl<'a> TransactionCache<'a> {
    pub fn new(gateway: &'a PostgresGateway) -> Self {
        Self { gateway }
    }

    /// Missing keys are simply absent from the returned map.
    pub async fn get(&self, signatures: &[String]) -> Result<HashMap<String, CacheEntry>> {
        if signatures.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT signature, timestamp, fetched_at FROM helius_transaction_cache WHERE signature = ANY($1)",
        )
        .bind(signatures)
        .fetch_all(&self.gateway.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let signature: String = row.get("signature");
                (
                    signature,
                    CacheEntry {
                        timestamp: row.get("timestamp"),
                        fetched_at: row.get("fetched_at"),
                    },
                )
            })
            .collect())
    }

    /// Idempotent upsert. A collision on `signature` overwrites `fetched_at`
    /// but preserves the original `timestamp`.
    pub async fn put(&self, entries: &[(String, CacheEntry)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        debug!(count = entries.len(), "caching transaction entries");

        let mut tx = self.gateway.pool.begin().await?;
        for (signature, entry) in entries {
            sqlx::query(
                "INSERT INTO helius_transaction_cache (signature, timestamp, fetched_at) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (signature) DO UPDATE SET fetched_at = EXCLUDED.fetched_at",
            )
            .bind(signature)
            .bind(entry.timestamp)
            .bind(entry.fetched_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
