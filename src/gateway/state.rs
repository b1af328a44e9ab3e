//! Shared handler state.

use std::sync::Arc;

use super::upstream::{HttpSearchProvider, SearchProvider};
use crate::config::GateConfig;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::oracle::OwnershipOracle;
use crate::ratelimit::QuotaTiers;
use crate::token::{SessionSecret, TokenCodec};

/// Everything the HTTP handlers need, cheap to clone.
#[derive(Clone)]
pub struct GatewayState {
    pub codec: Arc<TokenCodec>,
    pub tiers: QuotaTiers,
    pub oracle: Arc<OwnershipOracle>,
    pub credentials: Arc<CredentialStore>,
    /// `None` while no upstream API token is configured
    pub search: Option<Arc<dyn SearchProvider>>,
    /// Include internal error detail in responses (non-production only)
    pub expose_error_details: bool,
}

impl GatewayState {
    /// Wire up every component from configuration.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let secret = SessionSecret::resolve(
            config.auth.session_secret.as_deref(),
            config.auth.deployment_id.as_deref(),
        )?;

        let search = HttpSearchProvider::from_config(&config.upstream)?
            .map(|provider| Arc::new(provider) as Arc<dyn SearchProvider>);

        Ok(Self {
            codec: Arc::new(TokenCodec::new(secret)),
            tiers: QuotaTiers::new(&config.rate_limiting),
            oracle: Arc::new(OwnershipOracle::from_config(&config.oracle)),
            credentials: Arc::new(CredentialStore::from_config(&config.auth.users)?),
            search,
            expose_error_details: !config.environment.is_production(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    #[test]
    fn test_from_default_config() {
        let state = GatewayState::from_config(&GateConfig::default()).unwrap();

        assert!(state.search.is_none());
        assert!(!state.expose_error_details);
        assert!(state.credentials.is_empty());
        assert_eq!(state.codec.secret(), &SessionSecret::derive("default"));
    }

    #[test]
    fn test_development_exposes_details_and_enables_search() {
        let mut config = GateConfig::default();
        config.environment = Environment::Development;
        config.upstream.api_token = Some("token".to_string());

        let state = GatewayState::from_config(&config).unwrap();
        assert!(state.expose_error_details);
        assert!(state.search.is_some());
    }

    #[test]
    fn test_bad_configured_secret_fails() {
        let mut config = GateConfig::default();
        config.auth.session_secret = Some("bad_secret".to_string());

        assert!(GatewayState::from_config(&config).is_err());
    }
}
