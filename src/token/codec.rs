//! Token wire format.
//!
//! NFT holder: `<secret>_nft_<wallet>_<issued-at-ms>`
//! Credential user: `<secret>_session_<uuid>`
//!
//! Tokens carry no signature. Anyone who knows the session secret can mint a
//! holder token for any wallet address, so the secret must stay private to
//! the gateway.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::secret::SessionSecret;
use crate::clock::{Clock, SystemClock};

/// Separator between token segments.
pub const TOKEN_DELIMITER: char = '_';

/// Second segment of NFT holder tokens.
pub const NFT_CLASS_MARKER: &str = "nft";

/// Second segment of credential user tokens.
pub const SESSION_MARKER: &str = "session";

/// Substring whose presence marks a holder token.
const NFT_MARKER_SUBSTRING: &str = "_nft_";

/// The identity class a token belongs to, which decides its quota tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityClass {
    NftHolder,
    Regular,
}

impl IdentityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityClass::NftHolder => "nft_holder",
            IdentityClass::Regular => "regular",
        }
    }
}

/// What a login proved about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvidence {
    /// The wallet holds the NFT on at least one chain
    Wallet { address: String },
    /// Username and password matched a configured user
    Credential { username: String },
}

/// Issues tokens and reads them back.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    secret: SessionSecret,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec on the system clock.
    pub fn new(secret: SessionSecret) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Create a codec stamping tokens with time from `clock`.
    pub fn with_clock(secret: SessionSecret, clock: Arc<dyn Clock>) -> Self {
        Self { secret, clock }
    }

    /// Issue a token for verified evidence.
    pub fn issue(&self, evidence: &IdentityEvidence) -> String {
        match evidence {
            IdentityEvidence::Wallet { address } => {
                debug!(address = %address, "Issuing NFT holder token");
                format!(
                    "{secret}{d}{marker}{d}{address}{d}{issued}",
                    secret = self.secret.as_str(),
                    d = TOKEN_DELIMITER,
                    marker = NFT_CLASS_MARKER,
                    address = address,
                    issued = self.clock.now_ms(),
                )
            }
            IdentityEvidence::Credential { username } => {
                debug!(username = %username, "Issuing session token");
                format!(
                    "{secret}{d}{marker}{d}{id}",
                    secret = self.secret.as_str(),
                    d = TOKEN_DELIMITER,
                    marker = SESSION_MARKER,
                    id = uuid::Uuid::new_v4().simple(),
                )
            }
        }
    }

    /// Whether `token` was issued under the current session secret.
    pub fn is_current(&self, token: &str) -> bool {
        token
            .strip_prefix(self.secret.as_str())
            .is_some_and(|rest| rest.starts_with(TOKEN_DELIMITER))
    }

    /// Identity class of a token, from the presence of the NFT marker alone.
    ///
    /// This does not check that the token is well formed; a holder token with
    /// a broken wallet segment still classifies as [`IdentityClass::NftHolder`]
    /// and then fails [`TokenCodec::extract_key`].
    pub fn classify(token: &str) -> IdentityClass {
        if token.contains(NFT_MARKER_SUBSTRING) {
            IdentityClass::NftHolder
        } else {
            IdentityClass::Regular
        }
    }

    /// Wallet address of an NFT holder token.
    ///
    /// Returns `None` when the token has fewer than three segments, its second
    /// segment is not the NFT marker, or the wallet segment is empty.
    pub fn extract_key(token: &str) -> Option<&str> {
        let mut segments = token.split(TOKEN_DELIMITER);
        let _secret = segments.next()?;

        if segments.next()? != NFT_CLASS_MARKER {
            return None;
        }

        segments.next().filter(|wallet| !wallet.is_empty())
    }

    pub fn secret(&self) -> &SessionSecret {
        &self.secret
    }
}
