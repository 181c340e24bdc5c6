//! Postgres-backed persistence: wallet cursors, the swap-record store, and
//! the transaction detail cache, all sharing one connection pool.

mod cache;
mod postgres_client;
mod swap_store;
mod wallet;

pub use cache::{CacheEntry, TransactionCache};
pub use postgres_client::PostgresGateway;
pub use swap_store::{SaveResult, SwapStore};
pub use wallet::{Wallet, WalletStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database pool creation error: {0}")]
    PoolCreation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

pub const WALLET_TABLE: &str = "wallet";
pub const SWAP_ANALYSIS_INPUT_TABLE: &str = "swap_analysis_input";
pub const HELIUS_TRANSACTION_CACHE_TABLE: &str = "helius_transaction_cache";
