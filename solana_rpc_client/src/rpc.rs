//! Native Solana JSON-RPC methods: signature paging and account lookups.

use crate::{SolanaRpcClient, SolanaRpcError};
use retry_utils::{retry_with_backoff, RetryableError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use tx_mapper::SignatureInfo;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[allow(dead_code)]
    code: i32,
    message: String,
}

/// Selector for `getTokenAccountsByOwner`'s required account filter.
pub enum TokenAccountFilter {
    Mint(String),
    ProgramId(String),
}

fn classify_error(err: &SolanaRpcError) -> RetryableError {
    match err {
        SolanaRpcError::Http(e) => {
            if let Some(status) = e.status() {
                if status.as_u16() == 429 {
                    RetryableError::RateLimit
                } else if status.is_server_error() {
                    RetryableError::ServerError
                } else {
                    RetryableError::Other
                }
            } else if e.is_timeout() {
                RetryableError::Timeout
            } else if e.is_connect() {
                RetryableError::ServerError
            } else {
                RetryableError::Other
            }
        }
        SolanaRpcError::Timeout => RetryableError::Timeout,
        SolanaRpcError::Rpc(message) => {
            let lower = message.to_lowercase();
            if lower.contains("invalid param") || lower.contains("wrongsize") {
                RetryableError::Other
            } else {
                RetryableError::ServerError
            }
        }
        _ => RetryableError::Other,
    }
}

/// True when `err` is a non-retryable client error (already final by the
/// time `retry_with_backoff` gave up), as opposed to a transient condition
/// that was retried to exhaustion. Callers use this to decide whether to
/// abort-and-propagate or swallow-and-return-empty.
pub fn is_non_retryable(err: &SolanaRpcError) -> bool {
    matches!(classify_error(err), RetryableError::Other)
}

impl SolanaRpcClient {
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, SolanaRpcError> {
        rate_limiter::acquire().await;

        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SolanaRpcError::InvalidResponse(format!("HTTP {}", response.status())));
        }

        let parsed: RpcResponse<Value> = response.json().await?;
        match (parsed.result, parsed.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(SolanaRpcError::Rpc(error.message)),
            (None, None) => Ok(Value::Null),
        }
    }

    async fn rpc_call_with_retry(&self, method: &str, params: Value) -> Result<Value, SolanaRpcError> {
        retry_with_backoff(
            || self.rpc_call(method, params.clone()),
            &self.retry,
            classify_error,
        )
        .await
    }

    /// Pages oldest-backwards from `before` (RPC's natural order is newest-first).
    pub async fn get_signatures_page(
        &self,
        address: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<SignatureInfo>, SolanaRpcError> {
        let limit = limit.min(1000);
        let mut options = serde_json::Map::new();
        options.insert("limit".to_string(), json!(limit));
        if let Some(before) = before {
            options.insert("before".to_string(), json!(before));
        }

        debug!(address, limit, ?before, "getSignaturesForAddress");
        let result = self
            .rpc_call_with_retry("getSignaturesForAddress", json!([address, options]))
            .await?;

        if result.is_null() {
            return Ok(vec![]);
        }
        serde_json::from_value(result).map_err(SolanaRpcError::Json)
    }

    pub async fn get_multiple_accounts(&self, pubkeys: &[String]) -> Result<Value, SolanaRpcError> {
        if pubkeys.len() > 100 {
            warn!(count = pubkeys.len(), "getMultipleAccounts called with more than 100 pubkeys");
        }
        let options = json!({ "encoding": "jsonParsed" });
        self.rpc_call_with_retry("getMultipleAccounts", json!([pubkeys, options])).await
    }

    pub async fn get_token_accounts_by_owner(
        &self,
        owner: &str,
        filter: TokenAccountFilter,
        encoding: &str,
    ) -> Result<Value, SolanaRpcError> {
        let filter_json = match filter {
            TokenAccountFilter::Mint(mint) => json!({ "mint": mint }),
            TokenAccountFilter::ProgramId(program_id) => json!({ "programId": program_id }),
        };
        let options = json!({ "encoding": encoding });
        self.rpc_call_with_retry("getTokenAccountsByOwner", json!([owner, filter_json, options]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_vs_non_retryable() {
        assert_eq!(
            classify_error(&SolanaRpcError::Rpc("invalid param: bad mint".to_string())),
            RetryableError::Other
        );
        assert_eq!(
            classify_error(&SolanaRpcError::Rpc("WrongSize for account".to_string())),
            RetryableError::Other
        );
        assert_eq!(
            classify_error(&SolanaRpcError::Rpc("node is behind".to_string())),
            RetryableError::ServerError
        );
    }
}
