//! `wallet` table: per-address sync cursor, created on first sync and never destroyed.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use crate::{PostgresGateway, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub address: String,
    pub first_processed_timestamp: Option<DateTime<Utc>>,
    pub newest_processed_signature: Option<String>,
    pub newest_processed_timestamp: Option<DateTime<Utc>>,
    pub last_successful_fetch_timestamp: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            first_processed_timestamp: None,
            newest_processed_signature: None,
            newest_processed_timestamp: None,
            last_successful_fetch_timestamp: None,
        }
    }
}

pub struct WalletStore<'a> {
    gateway: &'a PostgresGateway,
}

impl<'a> WalletStore<'a> {
    pub fn new(gateway: &'a PostgresGateway) -> Self {
        Self { gateway }
    }

    pub async fn get(&self, address: &str) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            "SELECT address, first_processed_timestamp, newest_processed_signature, \
             newest_processed_timestamp, last_successful_fetch_timestamp \
             FROM wallet WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.gateway.pool)
        .await?;

        Ok(row.map(|row| Wallet {
            address: row.get("address"),
            first_processed_timestamp: row.get("first_processed_timestamp"),
            newest_processed_signature: row.get("newest_processed_signature"),
            newest_processed_timestamp: row.get("newest_processed_timestamp"),
            last_successful_fetch_timestamp: row.get("last_successful_fetch_timestamp"),
        }))
    }

    /// Upserts cursor fields. `first_processed_timestamp` is set only once, on
    /// the first successful sync, and never overwritten afterward.
    pub async fn update_cursor(&self, wallet: &Wallet) -> Result<()> {
        debug!(address = %wallet.address, "updating wallet cursor");
        sqlx::query(
            "INSERT INTO wallet (address, first_processed_timestamp, newest_processed_signature, \
             newest_processed_timestamp, last_successful_fetch_timestamp) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (address) DO UPDATE SET \
             first_processed_timestamp = COALESCE(wallet.first_processed_timestamp, EXCLUDED.first_processed_timestamp), \
             newest_processed_signature = EXCLUDED.newest_processed_signature, \
             newest_processed_timestamp = EXCLUDED.newest_processed_timestamp, \
             last_successful_fetch_timestamp = EXCLUDED.last_successful_fetch_timestamp",
        )
        .bind(&wallet.address)
        .bind(wallet.first_processed_timestamp)
        .bind(&wallet.newest_processed_signature)
        .bind(wallet.newest_processed_timestamp)
        .bind(wallet.last_successful_fetch_timestamp)
        .execute(&self.gateway.pool)
        .await?;
        Ok(())
    }
}
