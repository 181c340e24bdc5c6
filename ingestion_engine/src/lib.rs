//! Parallel signature discovery, cache-aware detail fetch, and wallet sync
//! cursoring over the Solana RPC / Helius facade.

pub mod diagnostics;
pub mod ingest;
pub mod sync;

pub use ingest::{ingest, BatchSink, IngestCallbacks, IngestParams, IngestionError};
pub use sync::{sync_wallet, SyncOptions, SyncReport};
