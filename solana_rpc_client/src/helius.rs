//! Helius enhanced-transactions batch endpoint.

use crate::{SolanaRpcClient, SolanaRpcError};
use retry_utils::{retry_with_backoff, RetryableError};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, warn};
use tx_mapper::ParsedTransaction;

/// Result of one `getTransactionsBatch` call. The response may be shorter
/// than the request; `missing_signatures` surfaces the gap to the caller
/// rather than silently dropping it.
#[derive(Debug, Clone)]
pub struct BatchFetchResult {
    pub requested: Vec<String>,
    pub transactions: Vec<ParsedTransaction>,
}

impl BatchFetchResult {
    pub fn missing_signatures(&self) -> Vec<String> {
        let received: HashSet<&str> = self.transactions.iter().map(|t| t.signature.as_str()).collect();
        self.requested
            .iter()
            .filter(|sig| !received.contains(sig.as_str()))
            .cloned()
            .collect()
    }
}

fn classify_helius_error(err: &SolanaRpcError) -> RetryableError {
    match err {
        SolanaRpcError::Helius { status, .. } => {
            if *status == 429 {
                RetryableError::RateLimit
            } else if *status >= 500 {
                RetryableError::ServerError
            } else {
                RetryableError::Other
            }
        }
        SolanaRpcError::Http(e) if e.is_timeout() => RetryableError::Timeout,
        SolanaRpcError::Http(e) if e.is_connect() => RetryableError::ServerError,
        _ => RetryableError::Other,
    }
}

impl SolanaRpcClient {
    /// Fetches up to 100 transactions in one request. Ordering of the
    /// response does not necessarily match the request.
    pub async fn get_transactions_batch(
        &self,
        signatures: &[String],
    ) -> Result<BatchFetchResult, SolanaRpcError> {
        if signatures.len() > 100 {
            warn!(count = signatures.len(), "getTransactionsBatch called with more than 100 signatures");
        }

        let requested: Vec<String> = signatures.to_vec();
        let url = format!(
            "{}/v0/transactions?api-key={}",
            self.config.helius_base_url, self.config.helius_api_key
        );

        let transactions = retry_with_backoff(
            || self.fetch_batch_once(&url, &requested),
            &self.retry,
            classify_helius_error,
        )
        .await?;

        debug!(requested = requested.len(), received = transactions.len(), "getTransactionsBatch complete");
        Ok(BatchFetchResult { requested, transactions })
    }

    async fn fetch_batch_once(
        &self,
        url: &str,
        signatures: &[String],
    ) -> Result<Vec<ParsedTransaction>, SolanaRpcError> {
        rate_limiter::acquire().await;

        let response = self
            .http
            .post(url)
            .json(&json!({ "transactions": signatures }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SolanaRpcError::Helius { status: status.as_u16(), message: body });
        }

        response
            .json::<Vec<ParsedTransaction>>()
            .await
            .map_err(SolanaRpcError::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(sig: &str) -> ParsedTransaction {
        serde_json::from_value(serde_json::json!({
            "signature": sig,
            "timestamp": 1,
            "feePayer": "wallet",
        }))
        .unwrap()
    }

    #[test]
    fn missing_signatures_is_request_minus_response() {
        let result = BatchFetchResult {
            requested: vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            transactions: vec![tx("s1"), tx("s3")],
        };
        assert_eq!(result.missing_signatures(), vec!["s2".to_string()]);
    }

    #[test]
    fn no_missing_when_full_response() {
        let result = BatchFetchResult {
            requested: vec!["s1".to_string()],
            transactions: vec![tx("s1")],
        };
        assert!(result.missing_signatures().is_empty());
    }
}
