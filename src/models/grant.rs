//! Token pair returned by the authorization backend

use serde::Deserialize;

use super::DEFAULT_EXPIRES_IN;

/// Response body of the code exchange and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    /// Present on code exchange. Refresh responses may omit it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in_seconds: Option<f64>,
}

impl TokenGrant {
    /// Validity to store for this grant.
    ///
    /// Absent, zero and NaN all count as "not provided".
    pub fn expires_in(&self) -> i64 {
        match self.expires_in_seconds {
            Some(secs) if secs.is_finite() && secs != 0.0 => secs.trunc() as i64,
            _ => DEFAULT_EXPIRES_IN,
        }
    }
}

/// Response body of the auth URL endpoint.
#[derive(Debug, Deserialize)]
pub struct AuthUrl {
    pub url: String,
}
