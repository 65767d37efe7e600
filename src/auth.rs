//! OAuth2 client-credentials token cache
//!
//! A token is requested once and then reused for the lifetime of the cache.
//! There is no expiry tracking: a cached token is returned as-is until
//! [`TokenCache::force_refresh`] clears it.

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{Result, SyncError};

/// Bearer token returned by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// Token id, if the endpoint sent one
    pub jti: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    jti: Option<String>,
}

pub struct TokenCache {
    client: Client,
    credentials: Credentials,
    token: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Return the cached token, requesting one if the cache is empty.
    ///
    /// The lock is held across the request so concurrent callers share a
    /// single token request.
    pub async fn ensure_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await.map_err(|e| {
            warn!(token_url = %self.credentials.token_url, error = %e, "Token request failed");
            e
        })?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next `ensure_token` hits the endpoint.
    pub async fn force_refresh(&self) {
        debug!("Clearing cached access token");
        self.token.lock().await.take();
    }

    /// Cached token, if any
    pub async fn current(&self) -> Option<AccessToken> {
        self.token.lock().await.clone()
    }

    async fn request_token(&self) -> Result<AccessToken> {
        info!(token_url = %self.credentials.token_url, "Requesting access token");

        let form = [
            ("grant_type", self.credentials.grant_type.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.credentials.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!("HTTP {}: {}", status, body)));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("invalid token response: {}", e)))?;

        if parsed.access_token.is_empty() {
            return Err(SyncError::Auth("token response has no access_token".to_string()));
        }

        debug!(jti = ?parsed.jti, "Access token obtained");
        Ok(AccessToken {
            value: parsed.access_token,
            jti: parsed.jti,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(server: &MockServer) -> Credentials {
        Credentials {
            token_url: format!("{}/oauth/token", server.uri()),
            grant_type: "client_credentials".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_token_is_cached_after_first_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client"))
            .and(body_string_contains("client_secret=secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "T", "jti": "j1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new(Client::new(), credentials(&server));
        assert_eq!(cache.ensure_token().await.unwrap(), "T");
        assert_eq!(cache.ensure_token().await.unwrap(), "T");

        let current = cache.current().await.unwrap();
        assert_eq!(current.jti.as_deref(), Some("j1"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "T", "jti": "j1"}))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new(Client::new(), credentials(&server));
        let (a, b) = tokio::join!(cache.ensure_token(), cache.ensure_token());

        assert_eq!(a.unwrap(), "T");
        assert_eq!(b.unwrap(), "T");
    }

    #[tokio::test]
    async fn test_force_refresh_requests_again() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "T"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let cache = TokenCache::new(Client::new(), credentials(&server));
        cache.ensure_token().await.unwrap();
        cache.force_refresh().await;
        assert!(cache.current().await.is_none());
        cache.ensure_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_error_is_auth_error_and_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let cache = TokenCache::new(Client::new(), credentials(&server));
        let err = cache.ensure_token().await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(ref msg) if msg.contains("invalid_client")));
        assert!(cache.current().await.is_none());
    }
}
