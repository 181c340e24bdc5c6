//! Wallet sync service (C7): cursor-aware incremental or full fetch, mapped
//! and persisted as swaps on every streamed batch.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tx_mapper::{map_transactions, timestamp_to_datetime, ParsedTransaction};

use persistence_layer::{PostgresGateway, SwapStore, Wallet, WalletStore};
use solana_rpc_client::SolanaRpcClient;

use crate::ingest::{ingest, BatchSink, IngestCallbacks, IngestParams, IngestionError};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub smart_fetch: bool,
    pub target_tx_count: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { smart_fetch: true, target_tx_count: 200 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub transactions_ingested: usize,
    pub swaps_saved: usize,
}

struct SwapPersistingSink<'a> {
    address: String,
    swap_store: SwapStore<'a>,
    report: SyncReport,
    newest_signature: Option<String>,
    newest_timestamp: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
impl<'a> BatchSink for SwapPersistingSink<'a> {
    async fn on_batch(&mut self, transactions: &[ParsedTransaction]) -> Result<(), IngestionError> {
        self.report.transactions_ingested += transactions.len();

        for tx in transactions {
            let ts = timestamp_to_datetime(tx.timestamp);
            if self.newest_timestamp.map_or(true, |cur| ts > cur) {
                self.newest_timestamp = Some(ts);
                self.newest_signature = Some(tx.signature.clone());
            }
        }

        let swaps = map_transactions(&self.address, transactions);
        if !swaps.is_empty() {
            let saved = self.swap_store.save(&swaps).await?;
            self.report.swaps_saved += saved.inserted;
        }
        Ok(())
    }
}

/// Loads the wallet's cursor, fetches new activity since it (or a capped
/// full history if there is none or smart fetch is off), maps each
/// streamed batch into swap records, and persists them before advancing
/// the cursor.
pub async fn sync_wallet(
    rpc: &SolanaRpcClient,
    gateway: &PostgresGateway,
    address: &str,
    options: &SyncOptions,
    base_params: &IngestParams,
) -> Result<SyncReport, IngestionError> {
    let wallet_store = WalletStore::new(gateway);
    let existing = wallet_store.get(address).await?;

    let mut params = base_params.clone();
    if options.smart_fetch {
        if let Some(wallet) = &existing {
            if let Some(newest_sig) = &wallet.newest_processed_signature {
                params.stop_at_signature = Some(newest_sig.clone());
                params.newest_processed_timestamp = wallet.newest_processed_timestamp;
            }
        }
    }
    if params.stop_at_signature.is_none() {
        let cap = ((options.target_tx_count as f64) * 1.5).ceil() as usize;
        params.max_signatures = Some(cap.max(300));
    }

    let mut sink = SwapPersistingSink {
        address: address.to_string(),
        swap_store: SwapStore::new(gateway),
        report: SyncReport::default(),
        newest_signature: None,
        newest_timestamp: existing.as_ref().and_then(|w| w.newest_processed_timestamp),
    };

    {
        let mut callbacks = IngestCallbacks { sink: Some(&mut sink), on_progress: None, cancel: None };
        ingest(rpc, gateway, address, &params, &mut callbacks).await?;
    }

    let mut wallet = existing.unwrap_or_else(|| Wallet::new(address));
    if let Some(sig) = sink.newest_signature {
        wallet.newest_processed_signature = Some(sig);
    }
    wallet.newest_processed_timestamp = sink.newest_timestamp;
    wallet.last_successful_fetch_timestamp = Some(Utc::now());
    if wallet.first_processed_timestamp.is_none() {
        wallet.first_processed_timestamp = Some(Utc::now());
    }
    wallet_store.update_cursor(&wallet).await?;

    let report = sink.report;
    info!(
        address,
        ingested = report.transactions_ingested,
        saved = report.swaps_saved,
        "wallet sync complete"
    );
    if report.transactions_ingested == 0 {
        warn!(address, "sync produced no new transactions");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_options_default_is_smart_fetch_with_200_target() {
        let opts = SyncOptions::default();
        assert!(opts.smart_fetch);
        assert_eq!(opts.target_tx_count, 200);
    }
}
