//! Static API keys presented in the `X-API-Key` header.

use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use dashmap::DashSet;
use rand::RngCore;

use super::{AuthError, Authenticator, Principal};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Number of random bytes in a generated key.
const KEY_BYTES: usize = 32;

/// Concurrent set of accepted API keys.
#[derive(Debug, Default)]
pub struct ApiKeyManager {
    keys: DashSet<String>,
}

impl ApiKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager accepting `keys`. Empty strings are ignored.
    pub fn with_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let manager = Self::new();
        for key in keys {
            manager.add_key(key);
        }
        manager
    }

    /// Generate a new random key (URL-safe base64 of 32 random bytes).
    ///
    /// The key is not registered; call [`add_key`](Self::add_key).
    pub fn generate_key() -> String {
        let mut bytes = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE.encode(bytes)
    }

    /// Accept `key` from now on. Returns `false` if it was empty or already present.
    pub fn add_key(&self, key: String) -> bool {
        if key.is_empty() {
            return false;
        }
        self.keys.insert(key)
    }

    /// Stop accepting `key`. Returns whether it was present.
    pub fn revoke_key(&self, key: &str) -> bool {
        self.keys.remove(key).is_some()
    }

    pub fn validate_key(&self, key: &str) -> bool {
        !key.is_empty() && self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Authenticator for ApiKeyManager {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let value = headers
            .get(API_KEY_HEADER)
            .ok_or(AuthError::MissingCredentials)?;
        let key = value.to_str().map_err(|_| AuthError::InvalidApiKey)?;

        if self.validate_key(key) {
            Ok(Principal::ApiKey {
                key_prefix: mask_key(key),
            })
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }
}

/// Mask an API key for logging: first 8 chars followed by "...".
pub fn mask_key(key: &str) -> String {
    match key.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &key[..idx]),
        None => "***".to_string(),
    }
}
