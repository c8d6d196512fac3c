//! Caller Authentication
//!
//! Session handling belongs to the hosted platform; the relay only needs to
//! turn a bearer token into a user id and email.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Verified caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(rename = "id")]
    pub user_id: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// Resolves bearer tokens to users
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `authorization` is the raw header value (`Bearer <jwt>`)
    async fn authenticate(&self, authorization: &str) -> Result<AuthenticatedUser>;
}

/// Strip the `Bearer ` scheme, case-insensitively
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Fixed token table (for development and tests)
#[derive(Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, AuthenticatedUser>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, authorization: &str) -> Result<AuthenticatedUser> {
        let token = bearer_token(authorization)
            .ok_or_else(|| PaymentError::Unauthorized("malformed authorization header".into()))?;

        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| PaymentError::Unauthorized("unknown token".into()))
    }
}
