//! Static credential users.
//!
//! Passwords are stored as Argon2 PHC strings
//! (`$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`). Verification reads the
//! algorithm parameters from the stored string.

use std::collections::HashMap;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use tracing::warn;

use crate::config::UserConfig;
use crate::error::{GateError, Result};

/// Hash a password into a PHC string with Argon2id default parameters.
pub fn hash_password(password: &str) -> Result<String> {
    hash_with(&Argon2::default(), password)
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GateError::Internal(format!("password hashing failed: {e}")))
}

/// Users allowed to log in with a username and password.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    /// username -> PHC string
    users: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from configured users, rejecting malformed hashes.
    pub fn from_config(users: &[UserConfig]) -> Result<Self> {
        let mut store = Self::new();
        for user in users {
            if store.users.contains_key(&user.username) {
                warn!(username = %user.username, "Duplicate user in configuration, keeping the last entry");
            }
            store = store.with_user(&user.username, &user.password_hash)?;
        }
        Ok(store)
    }

    /// Add a user with an already hashed password.
    pub fn with_user(mut self, username: &str, phc: &str) -> Result<Self> {
        let phc = phc.trim();
        PasswordHash::new(phc).map_err(|e| {
            GateError::Config(format!("user '{username}' has an invalid password_hash: {e}"))
        })?;
        self.users.insert(username.to_string(), phc.to_string());
        Ok(self)
    }

    /// Check a username and password.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(stored) = self.users.get(username) else {
            return false;
        };
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Hash with minimal Argon2 cost so tests stay fast.
#[cfg(test)]
pub(crate) fn cheap_hash(password: &str) -> String {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(256, 1, 1, None).unwrap();
    hash_with(
        &Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        password,
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_salted_phc() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);

        let store = CredentialStore::new().with_user("analyst", &first).unwrap();
        assert!(store.verify("analyst", "hunter2"));
    }

    #[test]
    fn test_verify() {
        let store = CredentialStore::new()
            .with_user("analyst", &cheap_hash("hunter2"))
            .unwrap();

        assert!(store.verify("analyst", "hunter2"));
        assert!(!store.verify("analyst", "hunter3"));
        assert!(!store.verify("someone", "hunter2"));
    }

    #[test]
    fn test_from_config() {
        let users = vec![UserConfig {
            username: "analyst".to_string(),
            password_hash: format!("  {}\n", cheap_hash("password")),
        }];
        let store = CredentialStore::from_config(&users).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.verify("analyst", "password"));
    }

    #[test]
    fn test_plain_digest_rejected() {
        let users = vec![UserConfig {
            username: "analyst".to_string(),
            password_hash: "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
                .to_string(),
        }];

        let err = CredentialStore::from_config(&users).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }
}
