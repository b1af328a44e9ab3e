//! Ownership aggregation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::chain::{BalanceSource, RpcChain};
use crate::config::{ChainConfig, OracleConfig};

/// Balance reported by one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBalance {
    pub chain: String,
    pub balance: u64,
}

/// Result of an ownership check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// Whether the address holds at least one token across both chains
    pub owned: bool,
    /// Per-chain evidence
    pub balances: Vec<ChainBalance>,
}

impl Ownership {
    pub fn total_balance(&self) -> u64 {
        self.balances
            .iter()
            .fold(0u64, |total, b| total.saturating_add(b.balance))
    }
}

/// Decides whether a wallet holds the NFT on either of two chains.
///
/// Lookup failures are never surfaced: a chain whose endpoints are all
/// exhausted contributes a zero balance and the other chain is still asked.
#[derive(Clone)]
pub struct OwnershipOracle {
    primary: Arc<dyn BalanceSource>,
    secondary: Arc<dyn BalanceSource>,
}

impl OwnershipOracle {
    pub fn new(primary: Arc<dyn BalanceSource>, secondary: Arc<dyn BalanceSource>) -> Self {
        Self { primary, secondary }
    }

    /// Build JSON-RPC sources for both configured chains.
    pub fn from_config(config: &OracleConfig) -> Self {
        let client = reqwest::Client::new();
        let build = |chain: &ChainConfig| -> Arc<dyn BalanceSource> {
            if chain.contract.is_empty() {
                warn!(chain = %chain.name, "No NFT contract configured, balances will read as zero");
            }
            Arc::new(RpcChain::with_client(
                chain.name.clone(),
                chain.rpc_urls.clone(),
                chain.contract.clone(),
                config.timeout(),
                client.clone(),
            ))
        };

        Self::new(build(&config.primary), build(&config.secondary))
    }

    /// Check both chains concurrently.
    pub async fn has_ownership(&self, address: &str) -> Ownership {
        let (primary, secondary) = futures::join!(
            balance_or_zero(self.primary.as_ref(), address),
            balance_or_zero(self.secondary.as_ref(), address),
        );

        let ownership = Ownership {
            owned: primary.balance.saturating_add(secondary.balance) > 0,
            balances: vec![primary, secondary],
        };

        info!(
            address = %address,
            owned = ownership.owned,
            total_balance = ownership.total_balance(),
            "Ownership checked"
        );

        ownership
    }
}

async fn balance_or_zero(source: &dyn BalanceSource, address: &str) -> ChainBalance {
    let balance = match source.balance_of(address).await {
        Ok(balance) => balance,
        Err(e) => {
            warn!(chain = %source.chain(), error = %e, "Balance lookup failed, treating as zero");
            0
        }
    };

    ChainBalance {
        chain: source.chain().to_string(),
        balance,
    }
}

impl std::fmt::Debug for OwnershipOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipOracle")
            .field("primary", &self.primary.chain())
            .field("secondary", &self.secondary.chain())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use async_trait::async_trait;

    struct FixedBalance(&'static str, Result<u64, ()>);

    #[async_trait]
    impl BalanceSource for FixedBalance {
        fn chain(&self) -> &str {
            self.0
        }

        async fn balance_of(&self, _address: &str) -> Result<u64, OracleError> {
            self.1
                .map_err(|_| OracleError::Transport("all endpoints down".to_string()))
        }
    }

    fn oracle(primary: Result<u64, ()>, secondary: Result<u64, ()>) -> OwnershipOracle {
        OwnershipOracle::new(
            Arc::new(FixedBalance("ethereum", primary)),
            Arc::new(FixedBalance("polygon", secondary)),
        )
    }

    #[tokio::test]
    async fn test_exhausted_chain_degrades_to_zero() {
        let ownership = oracle(Err(()), Ok(3)).has_ownership("0xabc").await;

        assert!(ownership.owned);
        assert_eq!(
            ownership.balances,
            vec![
                ChainBalance { chain: "ethereum".to_string(), balance: 0 },
                ChainBalance { chain: "polygon".to_string(), balance: 3 },
            ]
        );
        assert_eq!(ownership.total_balance(), 3);
    }

    #[tokio::test]
    async fn test_no_balance_anywhere() {
        let ownership = oracle(Ok(0), Ok(0)).has_ownership("0xabc").await;
        assert!(!ownership.owned);
    }

    #[tokio::test]
    async fn test_both_chains_failing_is_not_an_error() {
        let ownership = oracle(Err(()), Err(())).has_ownership("0xabc").await;
        assert!(!ownership.owned);
        assert_eq!(ownership.total_balance(), 0);
    }

    #[tokio::test]
    async fn test_primary_balance_alone_is_enough() {
        let ownership = oracle(Ok(1), Err(())).has_ownership("0xabc").await;
        assert!(ownership.owned);
    }
}
