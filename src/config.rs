//! Configuration management for the gateway.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{GateError, Result};

/// Prefix for environment variable overrides, e.g. `OSINTGATE__UPSTREAM__API_TOKEN`.
pub const ENV_PREFIX: &str = "OSINTGATE";

/// Main configuration for the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Deployment mode
    #[serde(default)]
    pub environment: Environment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Quota configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Token and login configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// NFT ownership lookups
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Upstream search provider
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Deployment mode. Error responses only carry internal detail outside production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Quota for one identity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Requests admitted per window
    pub max_requests: u32,
    /// Fixed window length in seconds
    pub window_secs: u64,
}

impl QuotaConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Quota configuration for both identity classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Quota for NFT holders
    #[serde(default = "default_nft_holder_quota")]
    pub nft_holder: QuotaConfig,

    /// Quota for credential users
    #[serde(default = "default_regular_quota")]
    pub regular: QuotaConfig,

    /// How often expired entries are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            nft_holder: default_nft_holder_quota(),
            regular: default_regular_quota(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl RateLimitingConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_nft_holder_quota() -> QuotaConfig {
    QuotaConfig {
        max_requests: 200,
        window_secs: 3600,
    }
}

fn default_regular_quota() -> QuotaConfig {
    QuotaConfig {
        max_requests: 50,
        window_secs: 3600,
    }
}

fn default_sweep_interval() -> u64 {
    300
}

/// Token and login configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Explicit session secret. Derived from `deployment_id` when unset.
    #[serde(default)]
    pub session_secret: Option<String>,

    /// Stable identifier of this deployment, input to secret derivation
    #[serde(default)]
    pub deployment_id: Option<String>,

    /// Static credential users
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// A static credential user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Argon2 PHC string of the password
    pub password_hash: String,
}

/// One chain's JSON-RPC endpoints and NFT contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name used in logs and responses
    pub name: String,
    /// Endpoints tried in order until one answers
    pub rpc_urls: Vec<String>,
    /// NFT contract address
    #[serde(default)]
    pub contract: String,
}

/// NFT ownership lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Chain queried through an ordered endpoint list
    #[serde(default = "default_primary_chain")]
    pub primary: ChainConfig,

    /// Second chain
    #[serde(default = "default_secondary_chain")]
    pub secondary: ChainConfig,

    /// Per-endpoint timeout in seconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_chain(),
            secondary: default_secondary_chain(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_primary_chain() -> ChainConfig {
    ChainConfig {
        name: "ethereum".to_string(),
        rpc_urls: vec![
            "https://eth.llamarpc.com".to_string(),
            "https://rpc.ankr.com/eth".to_string(),
            "https://cloudflare-eth.com".to_string(),
        ],
        contract: String::new(),
    }
}

fn default_secondary_chain() -> ChainConfig {
    ChainConfig {
        name: "polygon".to_string(),
        rpc_urls: vec!["https://polygon-rpc.com".to_string()],
        contract: String::new(),
    }
}

fn default_oracle_timeout() -> u64 {
    10
}

/// Upstream search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the provider API
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// API token. The search endpoint answers 503 while this is unset.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            api_token: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_upstream_url() -> String {
    "https://api.osint.industries/v2".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

impl GateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig =
            serde_yaml::from_str(yaml).map_err(|e| GateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file layered under
    /// `OSINTGATE__<SECTION>__<FIELD>` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::with_name(path).format(::config::FileFormat::Yaml),
            );
        }

        let config: GateConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| GateError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (class, quota) in [
            ("nft_holder", &self.rate_limiting.nft_holder),
            ("regular", &self.rate_limiting.regular),
        ] {
            if quota.window_secs == 0 {
                return Err(GateError::Config(format!(
                    "rate_limiting.{class}.window_secs must be greater than zero"
                )));
            }
        }

        if self.rate_limiting.sweep_interval_secs == 0 {
            return Err(GateError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        for chain in [&self.oracle.primary, &self.oracle.secondary] {
            if chain.rpc_urls.is_empty() {
                return Err(GateError::Config(format!(
                    "oracle chain '{}' has no rpc_urls",
                    chain.name
                )));
            }
        }

        Ok(())
    }
}
