//! Phase-by-phase signature discovery and parallel detail fetch (C6).

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tx_mapper::{timestamp_to_datetime, ParsedTransaction, SignatureInfo};

use persistence_layer::{CacheEntry, PersistenceError, PostgresGateway, TransactionCache};
use solana_rpc_client::{SolanaRpcClient, SolanaRpcError};

use crate::diagnostics;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("rpc error: {0}")]
    Rpc(#[from] SolanaRpcError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

const SIGNATURE_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct IngestParams {
    pub parse_batch_limit: usize,
    pub max_signatures: Option<usize>,
    pub stop_at_signature: Option<String>,
    pub newest_processed_timestamp: Option<DateTime<Utc>>,
    pub until_timestamp: Option<DateTime<Utc>>,
    pub inner_concurrency: usize,
    pub process_cached_signatures: bool,
    pub indexing_wait_ms: u64,
    pub legit_missing_microbatch_size: usize,
    pub reconcile: bool,
    pub write_diagnostics: bool,
}

impl IngestParams {
    pub fn from_config(cfg: &config_manager::IngestionConfig) -> Self {
        Self {
            parse_batch_limit: cfg.parse_batch_limit.min(100),
            max_signatures: None,
            stop_at_signature: None,
            newest_processed_timestamp: None,
            until_timestamp: None,
            inner_concurrency: cfg.inner_concurrency.max(1),
            process_cached_signatures: false,
            indexing_wait_ms: cfg.indexing_wait_ms,
            legit_missing_microbatch_size: cfg.legit_missing_microbatch_size.max(1),
            reconcile: true,
            write_diagnostics: false,
        }
    }
}

/// Receives each freshly-fetched batch as soon as it's persisted to the
/// transaction cache. Implementors typically map and save swap records;
/// a failure here does not roll back the cache write.
#[async_trait::async_trait]
pub trait BatchSink: Send {
    async fn on_batch(&mut self, transactions: &[ParsedTransaction]) -> Result<(), IngestionError>;
}

pub type OnProgress<'a> = dyn FnMut(u8) + Send + 'a;

#[derive(Default)]
pub struct IngestCallbacks<'a> {
    pub sink: Option<&'a mut dyn BatchSink>,
    pub on_progress: Option<&'a mut OnProgress<'a>>,
    pub cancel: Option<&'a CancellationToken>,
}

/// Discovers, caches, and returns an address's parsed transactions. With
/// `on_batch` supplied the engine streams results and never materializes
/// the full list; without it, results are buffered, filtered, and sorted
/// before returning.
pub async fn ingest(
    rpc: &SolanaRpcClient,
    gateway: &PostgresGateway,
    address: &str,
    params: &IngestParams,
    callbacks: &mut IngestCallbacks<'_>,
) -> Result<Vec<ParsedTransaction>, IngestionError> {
    let rpc_sigs = discover_signatures(rpc, address, params).await?;
    let total = rpc_sigs.len();
    info!(address, signatures = total, "ingestion: signature discovery complete");

    let sig_by_signature: HashMap<&str, &SignatureInfo> =
        rpc_sigs.iter().map(|s| (s.signature.as_str(), s)).collect();

    let cache = TransactionCache::new(gateway);
    let all_signatures: Vec<String> = rpc_sigs.iter().map(|s| s.signature.clone()).collect();
    let cache_hits = cache.get(&all_signatures).await?;

    let mut to_fetch: Vec<String> = Vec::new();
    let mut cached: Vec<String> = Vec::new();
    for sig in &all_signatures {
        if cache_hits.contains_key(sig) {
            cached.push(sig.clone());
        } else {
            to_fetch.push(sig.clone());
        }
    }
    debug!(to_fetch = to_fetch.len(), cached = cached.len(), "ingestion: cache diff complete");

    let mut buffered = Vec::new();
    let mut processed = 0usize;
    let mut last_reported_pct = 0u8;
    let mut legit_missing: Vec<String> = Vec::new();

    report_progress(callbacks, &mut last_reported_pct, processed, total);

    fetch_in_chunks(
        rpc,
        &cache,
        &to_fetch,
        params,
        callbacks,
        &sig_by_signature,
        &mut buffered,
        &mut legit_missing,
        &mut processed,
        total,
        &mut last_reported_pct,
    )
    .await?;

    if params.process_cached_signatures && !cached.is_empty() {
        fetch_in_chunks(
            rpc,
            &cache,
            &cached,
            params,
            callbacks,
            &sig_by_signature,
            &mut buffered,
            &mut legit_missing,
            &mut processed,
            total,
            &mut last_reported_pct,
        )
        .await?;
    }

    if !legit_missing.is_empty() {
        tokio::time::sleep(std::time::Duration::from_millis(params.indexing_wait_ms)).await;
        let retry_batch = std::mem::take(&mut legit_missing);
        let still_missing =
            retry_micro_batches(rpc, &cache, &retry_batch, params, callbacks, &mut buffered, &mut processed, total)
                .await?;
        if !still_missing.is_empty() {
            warn!(count = still_missing.len(), "legit-missing signatures unresolved after retry");
            if params.write_diagnostics {
                diagnostics::write_legit_missing(address, &still_missing);
            }
        }
    }

    if params.reconcile {
        reconcile(rpc, &cache, address, &rpc_sigs, params, &mut buffered, callbacks).await?;
    }

    report_progress(callbacks, &mut last_reported_pct, total, total);

    if callbacks.sink.is_some() {
        return Ok(Vec::new());
    }

    let mut results = buffered;
    if params.stop_at_signature.is_none() {
        if let Some(lower_bound) = params.newest_processed_timestamp {
            results.retain(|tx| timestamp_to_datetime(tx.timestamp) > lower_bound);
        }
    }
    if let Some(upper_bound) = params.until_timestamp {
        results.retain(|tx| timestamp_to_datetime(tx.timestamp) <= upper_bound);
    }
    results.retain(|tx| tx.involves_address(address));
    results.sort_by_key(|tx| tx.timestamp);

    Ok(results)
}

async fn discover_signatures(
    rpc: &SolanaRpcClient,
    address: &str,
    params: &IngestParams,
) -> Result<Vec<SignatureInfo>, IngestionError> {
    let mut collected: Vec<SignatureInfo> = Vec::new();
    let mut before: Option<String> = None;

    loop {
        let page = match rpc.get_signatures_page(address, SIGNATURE_PAGE_SIZE, before.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                if solana_rpc_client::is_non_retryable(&e) {
                    return Err(IngestionError::Rpc(e));
                }
                warn!(error = %e.sanitized_message(), "signature discovery exhausted retries, returning empty");
                return Ok(Vec::new());
            }
        };

        if page.is_empty() {
            break;
        }
        let page_len = page.len();

        for sig in page {
            if let Some(stop) = &params.stop_at_signature {
                if &sig.signature == stop {
                    return Ok(apply_cap(collected, params.max_signatures));
                }
            }
            collected.push(sig);
            if let Some(max) = params.max_signatures {
                if collected.len() >= max {
                    return Ok(apply_cap(collected, params.max_signatures));
                }
            }
        }

        before = collected.last().map(|s| s.signature.clone());
        if page_len < SIGNATURE_PAGE_SIZE as usize {
            break;
        }
    }

    Ok(apply_cap(collected, params.max_signatures))
}

fn apply_cap(mut sigs: Vec<SignatureInfo>, max: Option<usize>) -> Vec<SignatureInfo> {
    if let Some(max) = max {
        sigs.truncate(max);
    }
    sigs
}

#[allow(clippy::too_many_arguments)]
async fn fetch_in_chunks(
    rpc: &SolanaRpcClient,
    cache: &TransactionCache<'_>,
    signatures: &[String],
    params: &IngestParams,
    callbacks: &mut IngestCallbacks<'_>,
    sig_by_signature: &HashMap<&str, &SignatureInfo>,
    buffered: &mut Vec<ParsedTransaction>,
    legit_missing: &mut Vec<String>,
    processed: &mut usize,
    total: usize,
    last_reported_pct: &mut u8,
) -> Result<(), IngestionError> {
    let outer_chunk_size = params.parse_batch_limit * params.inner_concurrency;

    for outer_chunk in signatures.chunks(outer_chunk_size.max(params.parse_batch_limit)) {
        if let Some(cancel) = callbacks.cancel {
            if cancel.is_cancelled() {
                info!("ingestion cancelled, inflight work will complete but no further chunks dispatched");
                break;
            }
        }

        let sub_batches: Vec<&[String]> = outer_chunk.chunks(params.parse_batch_limit).collect();
        let futures_iter = sub_batches.into_iter().map(|batch| rpc.get_transactions_batch(batch));
        let results = futures::future::join_all(futures_iter).await;

        for (batch, result) in outer_chunk.chunks(params.parse_batch_limit).zip(results) {
            *processed += batch.len();
            match result {
                Ok(batch_result) => {
                    persist_batch(cache, &batch_result.transactions).await?;
                    classify_missing(&batch_result.missing_signatures(), sig_by_signature, legit_missing);
                    invoke_on_batch(callbacks, buffered, &batch_result.transactions).await?;
                }
                Err(e) => {
                    warn!(
                        error = %e.sanitized_message(),
                        count = batch.len(),
                        "batch fetch failed, signatures marked failed-missing"
                    );
                }
            }
        }

        report_progress(callbacks, last_reported_pct, *processed, total);
    }

    Ok(())
}

fn classify_missing(
    missing: &[String],
    sig_by_signature: &HashMap<&str, &SignatureInfo>,
    legit_missing: &mut Vec<String>,
) {
    for sig in missing {
        match sig_by_signature.get(sig.as_str()) {
            Some(info) if info.failed() => {
                // failed-missing: the RPC already recorded an error for this
                // signature, so Helius never having it is expected.
            }
            _ => legit_missing.push(sig.clone()),
        }
    }
}

async fn persist_batch(cache: &TransactionCache<'_>, transactions: &[ParsedTransaction]) -> Result<(), IngestionError> {
    if transactions.is_empty() {
        return Ok(());
    }
    let fetched_at = Utc::now();
    let entries: Vec<(String, CacheEntry)> = transactions
        .iter()
        .map(|tx| (tx.signature.clone(), CacheEntry { timestamp: timestamp_to_datetime(tx.timestamp), fetched_at }))
        .collect();
    cache.put(&entries).await?;
    Ok(())
}

async fn invoke_on_batch(
    callbacks: &mut IngestCallbacks<'_>,
    buffered: &mut Vec<ParsedTransaction>,
    transactions: &[ParsedTransaction],
) -> Result<(), IngestionError> {
    if transactions.is_empty() {
        return Ok(());
    }
    match callbacks.sink.as_deref_mut() {
        Some(sink) => sink.on_batch(transactions).await,
        None => {
            buffered.extend_from_slice(transactions);
            Ok(())
        }
    }
}

fn report_progress(callbacks: &mut IngestCallbacks<'_>, last_reported_pct: &mut u8, processed: usize, total: usize) {
    if total == 0 {
        return;
    }
    let pct = ((processed as f64 / total as f64) * 100.0).floor() as u8;
    let next_threshold = *last_reported_pct + 25;
    if pct >= next_threshold || processed >= total {
        *last_reported_pct = (pct / 25) * 25;
        if let Some(on_progress) = callbacks.on_progress.as_deref_mut() {
            on_progress(pct.min(100));
        }
    }
}

async fn retry_micro_batches(
    rpc: &SolanaRpcClient,
    cache: &TransactionCache<'_>,
    signatures: &[String],
    params: &IngestParams,
    callbacks: &mut IngestCallbacks<'_>,
    buffered: &mut Vec<ParsedTransaction>,
    processed: &mut usize,
    total: usize,
) -> Result<Vec<String>, IngestionError> {
    let mut still_missing = HashSet::new();
    for sig in signatures {
        still_missing.insert(sig.clone());
    }

    let mut last_reported_pct = 100;
    for micro_batch in signatures.chunks(params.legit_missing_microbatch_size) {
        match rpc.get_transactions_batch(micro_batch).await {
            Ok(batch_result) => {
                persist_batch(cache, &batch_result.transactions).await?;
                for tx in &batch_result.transactions {
                    still_missing.remove(&tx.signature);
                }
                invoke_on_batch(callbacks, buffered, &batch_result.transactions).await?;
            }
            Err(e) => {
                warn!(error = %e.sanitized_message(), "legit-missing retry batch failed");
            }
        }
        *processed += micro_batch.len();
        report_progress(callbacks, &mut last_reported_pct, *processed, total);
    }

    Ok(still_missing.into_iter().collect())
}

async fn reconcile(
    rpc: &SolanaRpcClient,
    cache: &TransactionCache<'_>,
    address: &str,
    rpc_sigs: &[SignatureInfo],
    params: &IngestParams,
    buffered: &mut Vec<ParsedTransaction>,
    callbacks: &mut IngestCallbacks<'_>,
) -> Result<(), IngestionError> {
    let expected: Vec<String> =
        rpc_sigs.iter().filter(|s| !s.failed()).map(|s| s.signature.clone()).collect();
    if expected.is_empty() {
        return Ok(());
    }

    let cached = cache.get(&expected).await?;
    let gap: Vec<String> = expected.into_iter().filter(|s| !cached.contains_key(s)).collect();
    if gap.is_empty() {
        return Ok(());
    }

    debug!(address, gap = gap.len(), "reconciliation found a cache gap, running one micro-fetch pass");
    let mut processed = 0;
    let total = gap.len();
    let remaining = retry_micro_batches(rpc, cache, &gap, params, callbacks, buffered, &mut processed, total).await?;
    if !remaining.is_empty() {
        warn!(address, count = remaining.len(), "reconciliation residue unresolved, reporting only");
        if params.write_diagnostics {
            diagnostics::write_reconcile(address, &remaining);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(signature: &str, err: Option<serde_json::Value>) -> SignatureInfo {
        SignatureInfo { signature: signature.to_string(), slot: 1, block_time: Some(1), err }
    }

    #[test]
    fn apply_cap_truncates_to_max() {
        let sigs = vec![sig("a", None), sig("b", None), sig("c", None)];
        assert_eq!(apply_cap(sigs, Some(2)).len(), 2);
    }

    #[test]
    fn apply_cap_with_no_max_is_a_no_op() {
        let sigs = vec![sig("a", None), sig("b", None)];
        assert_eq!(apply_cap(sigs, None).len(), 2);
    }

    #[test]
    fn classify_missing_separates_failed_from_legit() {
        let failed = sig("s1", Some(serde_json::json!({"InstructionError": [0, "Custom"]})));
        let ok = sig("s2", None);
        let sig_by_signature: HashMap<&str, &SignatureInfo> =
            [(failed.signature.as_str(), &failed), (ok.signature.as_str(), &ok)].into_iter().collect();

        let mut legit_missing = Vec::new();
        classify_missing(
            &["s1".to_string(), "s2".to_string()],
            &sig_by_signature,
            &mut legit_missing,
        );

        assert_eq!(legit_missing, vec!["s2".to_string()]);
    }

    #[test]
    fn report_progress_fires_at_25_percent_granularity() {
        let mut callbacks = IngestCallbacks::default();
        let mut seen = Vec::new();
        let mut on_progress = |pct: u8| seen.push(pct);
        callbacks.on_progress = Some(&mut on_progress);

        let mut last_pct = 0u8;
        report_progress(&mut callbacks, &mut last_pct, 10, 100);
        report_progress(&mut callbacks, &mut last_pct, 24, 100);
        report_progress(&mut callbacks, &mut last_pct, 25, 100);
        report_progress(&mut callbacks, &mut last_pct, 60, 100);
        report_progress(&mut callbacks, &mut last_pct, 100, 100);

        assert_eq!(seen, vec![25, 60, 100]);
    }
}
