//! NFT balance lookups over EVM JSON-RPC.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Selector of ERC-721 / ERC-20 `balanceOf(address)`.
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Errors from a single chain lookup. These never leave the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("No RPC endpoints configured")]
    NoEndpoints,
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("RPC transport error: {0}")]
    Transport(String),
    #[error("RPC endpoint timed out after {0:?}")]
    Timeout(Duration),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// A chain that can report how many tokens of one NFT contract an address holds.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Chain name, for logs and responses.
    fn chain(&self) -> &str;

    /// Balance of `address`.
    async fn balance_of(&self, address: &str) -> Result<u64, OracleError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC balance source with ordered endpoint fallback.
///
/// Endpoints are tried in order; the first one that answers successfully
/// within `timeout` wins. A timed-out request is dropped, which cancels it.
#[derive(Debug, Clone)]
pub struct RpcChain {
    name: String,
    endpoints: Vec<String>,
    contract: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RpcChain {
    pub fn new(
        name: impl Into<String>,
        endpoints: Vec<String>,
        contract: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::with_client(name, endpoints, contract, timeout, reqwest::Client::new())
    }

    pub fn with_client(
        name: impl Into<String>,
        endpoints: Vec<String>,
        contract: impl Into<String>,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            endpoints,
            contract: contract.into(),
            timeout,
            client,
        }
    }

    async fn query_endpoint(&self, endpoint: &str, calldata: &str) -> Result<u64, OracleError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": self.contract, "data": calldata }, "latest"],
        });

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(OracleError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = body
            .result
            .ok_or_else(|| OracleError::InvalidResponse("missing result".to_string()))?;

        parse_quantity(&result)
    }
}

#[async_trait]
impl BalanceSource for RpcChain {
    fn chain(&self) -> &str {
        &self.name
    }

    async fn balance_of(&self, address: &str) -> Result<u64, OracleError> {
        let calldata = balance_of_calldata(address)?;
        let mut last_error = OracleError::NoEndpoints;

        for endpoint in &self.endpoints {
            trace!(chain = %self.name, endpoint = %endpoint, "Querying NFT balance");

            match tokio::time::timeout(self.timeout, self.query_endpoint(endpoint, &calldata)).await
            {
                Ok(Ok(balance)) => {
                    debug!(chain = %self.name, endpoint = %endpoint, balance, "NFT balance fetched");
                    return Ok(balance);
                }
                Ok(Err(e)) => {
                    warn!(chain = %self.name, endpoint = %endpoint, error = %e, "RPC endpoint failed, trying next");
                    last_error = e;
                }
                Err(_) => {
                    warn!(chain = %self.name, endpoint = %endpoint, timeout = ?self.timeout, "RPC endpoint timed out, trying next");
                    last_error = OracleError::Timeout(self.timeout);
                }
            }
        }

        Err(last_error)
    }
}

/// Whether `address` is `0x` followed by 40 hex digits.
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Calldata for `balanceOf(address)`: selector plus the address left-padded to 32 bytes.
pub fn balance_of_calldata(address: &str) -> Result<String, OracleError> {
    if !is_valid_address(address) {
        return Err(OracleError::InvalidAddress(address.to_string()));
    }
    Ok(format!(
        "0x{}{:0>64}",
        BALANCE_OF_SELECTOR,
        address[2..].to_ascii_lowercase()
    ))
}

/// Parse a hex quantity such as `0x0000...0003`.
pub fn parse_quantity(hex: &str) -> Result<u64, OracleError> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| OracleError::InvalidResponse(format!("not a hex quantity: {hex}")))?
        .trim_start_matches('0');

    if digits.is_empty() {
        return Ok(0);
    }

    u64::from_str_radix(digits, 16)
        .map_err(|e| OracleError::InvalidResponse(format!("bad quantity {hex}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(WALLET));
        assert!(is_valid_address(&WALLET.to_lowercase()));
        assert!(!is_valid_address("0xABC"));
        assert!(!is_valid_address("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_valid_address("0xZZ908400098527886E0F7030069857D2E4169EE7"));
    }

    #[test]
    fn test_balance_of_calldata() {
        let data = balance_of_calldata(WALLET).unwrap();
        assert_eq!(
            data,
            "0x70a0823100000000000000000000000052908400098527886e0f7030069857d2e4169ee7"
        );
        assert_eq!(data.len(), 2 + 8 + 64);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(
            parse_quantity("0x0000000000000000000000000000000000000000000000000000000000000003")
                .unwrap(),
            3
        );
        assert_eq!(parse_quantity("0x1f").unwrap(), 31);
        assert!(parse_quantity("3").is_err());
        assert!(parse_quantity("0xnothex").is_err());
    }

    /// Serve a JSON-RPC stub on an ephemeral port; returns its URL.
    async fn stub_rpc(response: serde_json::Value, hits: Arc<AtomicUsize>) -> String {
        async fn handler(
            State((response, hits)): State<(serde_json::Value, Arc<AtomicUsize>)>,
            Json(_request): Json<serde_json::Value>,
        ) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            Json(response)
        }

        let app = Router::new()
            .route("/", post(handler))
            .with_state((response, hits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    /// An address nothing listens on.
    async fn dead_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_falls_back_to_next_endpoint() {
        let hits = Arc::new(AtomicUsize::new(0));
        let good = stub_rpc(json!({"jsonrpc": "2.0", "id": 1, "result": "0x2"}), hits.clone()).await;
        let chain = RpcChain::new(
            "test",
            vec![dead_endpoint().await, good],
            "0x0000000000000000000000000000000000000001",
            Duration::from_secs(5),
        );

        assert_eq!(chain.balance_of(WALLET).await.unwrap(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    /// Serve a JSON-RPC stub that answers only after `delay`.
    async fn slow_rpc(delay: Duration) -> String {
        let app = Router::new().route(
            "/",
            post(move || async move {
                tokio::time::sleep(delay).await;
                Json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x9"}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out_and_falls_back() {
        let hits = Arc::new(AtomicUsize::new(0));
        let slow = slow_rpc(Duration::from_secs(5)).await;
        let good = stub_rpc(json!({"jsonrpc": "2.0", "id": 1, "result": "0x2"}), hits.clone()).await;
        let timeout = Duration::from_millis(200);
        let chain = RpcChain::new(
            "test",
            vec![slow, good],
            "0x0000000000000000000000000000000000000001",
            timeout,
        );

        let started = std::time::Instant::now();
        let balance = chain.balance_of(WALLET).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(balance, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(elapsed >= timeout, "returned before the timeout: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "waited on the slow endpoint: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_all_endpoints_slow_is_timeout() {
        let timeout = Duration::from_millis(100);
        let chain = RpcChain::new(
            "test",
            vec![slow_rpc(Duration::from_secs(5)).await],
            "0x0000000000000000000000000000000000000001",
            timeout,
        );

        let err = chain.balance_of(WALLET).await.unwrap_err();
        assert!(matches!(err, OracleError::Timeout(t) if t == timeout));
    }

    #[tokio::test]
    async fn test_rpc_error_counts_as_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let failing = stub_rpc(
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "execution reverted"}}),
            hits.clone(),
        )
        .await;
        let chain = RpcChain::new(
            "test",
            vec![failing],
            "0x0000000000000000000000000000000000000001",
            Duration::from_secs(5),
        );

        let err = chain.balance_of(WALLET).await.unwrap_err();
        assert!(matches!(err, OracleError::Rpc { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_exhausted_endpoints_return_last_error() {
        let chain = RpcChain::new(
            "test",
            vec![dead_endpoint().await, dead_endpoint().await],
            "0x0000000000000000000000000000000000000001",
            Duration::from_secs(5),
        );

        let err = chain.balance_of(WALLET).await.unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }

    #[tokio::test]
    async fn test_invalid_address_skips_network() {
        let chain = RpcChain::new("test", vec![], "0x1", Duration::from_secs(5));
        let err = chain.balance_of("not-an-address").await.unwrap_err();
        assert!(matches!(err, OracleError::InvalidAddress(_)));
    }
}
