//! Process-wide session secret.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::info;

use super::codec::TOKEN_DELIMITER;
use crate::error::{GateError, Result};

/// Deployment id used when none is configured.
const DEFAULT_DEPLOYMENT_ID: &str = "default";

/// The secret every issued token is prefixed with.
///
/// Either configured explicitly or derived as the SHA-256 of the crate name
/// and deployment id, so it is stable across restarts of one deployment and
/// differs between deployments.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(Arc<str>);

impl SessionSecret {
    /// Use the configured secret if there is one, otherwise derive it.
    pub fn resolve(configured: Option<&str>, deployment_id: Option<&str>) -> Result<Self> {
        match configured.map(str::trim) {
            Some(secret) => {
                info!("Using configured session secret");
                Self::new(secret)
            }
            None => {
                let deployment_id = deployment_id.unwrap_or(DEFAULT_DEPLOYMENT_ID);
                info!(deployment_id = %deployment_id, "Deriving session secret");
                Ok(Self::derive(deployment_id))
            }
        }
    }

    /// Wrap an explicit secret.
    ///
    /// The secret is the first token segment, so it must be non-empty and
    /// must not contain the segment delimiter.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(GateError::Config("session secret must not be empty".to_string()));
        }
        if secret.contains(TOKEN_DELIMITER) {
            return Err(GateError::Config(format!(
                "session secret must not contain '{}'",
                TOKEN_DELIMITER
            )));
        }
        Ok(Self(Arc::from(secret)))
    }

    /// Derive the secret for a deployment.
    pub fn derive(deployment_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(env!("CARGO_PKG_NAME"));
        hasher.update(":");
        hasher.update(deployment_id);
        Self(Arc::from(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}
