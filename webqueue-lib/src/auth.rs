use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Debug;

/// Supplies bearer tokens for requests that require authentication.
///
/// The scheduler asks for a token right before such a request is sent,
/// so implementations are free to refresh expired tokens. Returning `None`
/// sends the request without an `Authorization` header.
#[async_trait]
pub trait TokenProvider: Send + Sync + Debug {
    /// The current access token, if any
    async fn access_token(&self) -> Option<SecretString>;
}

/// A provider that always hands out the same token.
#[derive(Debug)]
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    /// Create a provider for a fixed token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Option<SecretString> {
        Some(SecretString::from(self.token.expose_secret().to_owned()))
    }
}
