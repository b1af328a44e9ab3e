//! Bearer token issuance and classification.
//!
//! Tokens are opaque to clients and never stored server-side. A token is
//! accepted when it starts with the current session secret; its identity
//! class and rate limit key are read back from its structure.

mod codec;
mod secret;

pub use codec::{
    IdentityClass, IdentityEvidence, TokenCodec, NFT_CLASS_MARKER, SESSION_MARKER, TOKEN_DELIMITER,
};
pub use secret::SessionSecret;
