//! HTTP client for the authorization backend

use async_trait::async_trait;
use url::Url;

use super::{check_response, AuthExchange, ServiceError};
use crate::models::{AuthUrl, TokenGrant};

/// Talks to the backend's `/auth/*` endpoints.
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    /// `base_url` may carry a path prefix; endpoints are resolved beneath it.
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, ServiceError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.base.join(path)?)
    }
}

#[async_trait]
impl AuthExchange for BackendClient {
    async fn auth_url(&self) -> Result<String, ServiceError> {
        let url = self.endpoint("auth/url")?;
        tracing::debug!("Backend GET {}", url);

        let resp = self.http.get(url.clone()).send().await?;
        let body: AuthUrl = check_response(resp, url.as_str()).await?.json().await?;
        Ok(body.url)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServiceError> {
        let url = self.endpoint("auth/callback")?;
        tracing::debug!("Backend GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .query(&[("code", code)])
            .send()
            .await?;
        Ok(check_response(resp, url.as_str()).await?.json().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError> {
        let url = self.endpoint("auth/refresh")?;
        tracing::debug!("Backend POST {}", url);

        let resp = self
            .http
            .post(url.clone())
            .query(&[("refresh_token", refresh_token)])
            .send()
            .await?;
        Ok(check_response(resp, url.as_str()).await?.json().await?)
    }
}
