//! Request authentication.
//!
//! Authentication runs before admission control: a request must present a
//! valid API key (`X-API-Key`) or bearer JWT before it is charged a token.

mod api_key;
mod jwt;

use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use thiserror::Error;

pub use api_key::{mask_key, ApiKeyManager, API_KEY_HEADER};
pub use jwt::{Claims, JwtAuthenticator};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Caller presented a registered API key (masked for logging)
    ApiKey { key_prefix: String },
    /// Caller presented a valid bearer token
    User { user_id: String },
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::ApiKey { key_prefix } => write!(f, "api-key:{}", key_prefix),
            Principal::User { user_id } => write!(f, "user:{}", user_id),
        }
    }
}

/// Reasons a request fails authentication.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Invalid authorization format")]
    InvalidAuthorizationFormat,

    #[error("Bearer tokens are not enabled")]
    BearerDisabled,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// A scheme deciding whether a request's headers identify a valid caller.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

/// Accepts either an API key or, when configured, a bearer JWT.
///
/// An `X-API-Key` header takes precedence; a request carrying a wrong key is
/// rejected even if it also carries a valid token.
#[derive(Debug)]
pub struct CompositeAuthenticator {
    api_keys: Arc<ApiKeyManager>,
    jwt: Option<JwtAuthenticator>,
}

impl CompositeAuthenticator {
    pub fn new(api_keys: Arc<ApiKeyManager>, jwt: Option<JwtAuthenticator>) -> Self {
        Self { api_keys, jwt }
    }

    pub fn api_keys(&self) -> &Arc<ApiKeyManager> {
        &self.api_keys
    }
}

impl Authenticator for CompositeAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        if headers.contains_key(API_KEY_HEADER) {
            return self.api_keys.authenticate(headers);
        }

        if headers.contains_key(header::AUTHORIZATION) {
            return match &self.jwt {
                Some(jwt) => jwt.authenticate(headers),
                None => Err(AuthError::BearerDisabled),
            };
        }

        Err(AuthError::MissingCredentials)
    }
}
