//! Clients for the authorization backend and the provider's revoke endpoint
//!
//! The backend runs the authorization-code flow on our behalf: it hands out
//! the provider's login URL, exchanges the returned code for a token pair,
//! and refreshes access tokens. Revocation goes straight to the provider.

pub mod exchange;
pub mod revoke;

use async_trait::async_trait;

use crate::models::TokenGrant;

pub use exchange::BackendClient;
pub use revoke::RevocationClient;

/// Failure talking to an external service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("invalid service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Authorization backend operations.
#[async_trait]
pub trait AuthExchange: Send + Sync {
    /// URL the user must visit to authorize this client.
    async fn auth_url(&self) -> Result<String, ServiceError>;

    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServiceError>;

    /// Obtain a new access token using a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError>;
}

/// Provider token revocation.
#[async_trait]
pub trait Revoker: Send + Sync {
    async fn revoke(&self, token: &str) -> Result<(), ServiceError>;
}

/// Turn a non-2xx response into a [`ServiceError::Status`].
async fn check_response(
    resp: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
