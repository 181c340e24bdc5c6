//! Unified Solana RPC / Helius client.
//!
//! Mirrors the source's split between native JSON-RPC calls (signature
//! paging, account lookups) and the Helius enhanced-transactions endpoint
//! (batch transaction detail), but behind one facade and one retry/rate-limit
//! discipline instead of two independently-drifting clients.

mod helius;
mod rpc;

pub use helius::BatchFetchResult;
pub use rpc::{is_non_retryable, TokenAccountFilter};

use reqwest::Client;
use retry_utils::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolanaRpcError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("helius error ({status}): {message}")]
    Helius { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("timeout")]
    Timeout,
}

impl SolanaRpcError {
    /// Redacts credentials and trims to a single line before anything reaches a log sink.
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Replaces `api-key=<value>` with `api-key=REDACTED` and collapses to one line.
pub fn sanitize_error_message(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find("api-key=") {
        out.push_str(&rest[..idx]);
        out.push_str("api-key=REDACTED");
        rest = &rest[idx + "api-key=".len()..];
        match rest.find(|c: char| c == '&' || c.is_whitespace()) {
            Some(end) => rest = &rest[end..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.lines().next().unwrap_or(&out).to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaRpcClientConfig {
    pub rpc_url: String,
    pub rpc_timeout_seconds: u64,
    pub helius_api_key: String,
    pub helius_base_url: String,
    /// Requests per second enforced by the shared rate limiter for this process.
    pub rate_limit_rps: u64,
}

impl Default for SolanaRpcClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            rpc_timeout_seconds: 30,
            helius_api_key: String::new(),
            helius_base_url: "https://api.helius.xyz".to_string(),
            rate_limit_rps: 10,
        }
    }
}

#[derive(Clone)]
pub struct SolanaRpcClient {
    config: SolanaRpcClientConfig,
    http: Client,
    retry: RetryConfig,
    request_id: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl SolanaRpcClient {
    pub fn new(config: SolanaRpcClientConfig) -> Result<Self, SolanaRpcError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_seconds))
            .build()?;
        rate_limiter::set_min_rps(config.rate_limit_rps);
        Ok(Self {
            config,
            http,
            retry: RetryConfig {
                max_attempts: 3,
                rate_limit_delays_ms: vec![1000, 2000, 4000],
                server_error_delays_ms: vec![1000, 2000, 4000],
                timeout_delays_ms: vec![1000, 2000, 4000],
            },
            request_id: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_api_key_in_url() {
        let msg = "helius error calling https://api.helius.xyz/v0/transactions?api-key=SUPERSECRET&limit=1";
        let sanitized = sanitize_error_message(msg);
        assert!(!sanitized.contains("SUPERSECRET"));
        assert!(sanitized.contains("api-key=REDACTED"));
        assert!(sanitized.contains("&limit=1"));
    }

    #[test]
    fn sanitize_leaves_messages_without_keys_untouched() {
        assert_eq!(sanitize_error_message("plain message"), "plain message");
    }
}
