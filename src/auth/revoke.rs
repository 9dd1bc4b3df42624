//! HTTP client for the provider's token revocation endpoint

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::{check_response, Revoker, ServiceError};

/// Google's revocation endpoint, used when none is configured.
pub const DEFAULT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

pub struct RevocationClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl RevocationClient {
    pub fn new(http: reqwest::Client, endpoint: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint)?,
        })
    }
}

#[async_trait]
impl Revoker for RevocationClient {
    /// Revoke `token`. The response body is ignored.
    async fn revoke(&self, token: &str) -> Result<(), ServiceError> {
        tracing::debug!("Revoke POST {}", self.endpoint);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .query(&[("token", token)])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;
        check_response(resp, self.endpoint.as_str()).await?;
        Ok(())
    }
}
