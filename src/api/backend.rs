//! The auth backend seam: three operations against the Hiredesk backend.
//!
//! The session manager and the request pipeline are generic over
//! `AuthBackend`, so tests drive them with a stub instead of a server.
//! `HttpAuthBackend` is the real implementation over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::models::{LoginResponse, RefreshResponse, User};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for refresh calls specifically, in seconds.
/// A hung refresh blocks the 401-retry path, so it fails fast to the
/// unauthenticated fallback instead of inheriting the general timeout.
const REFRESH_TIMEOUT_SECS: u64 = 10;

/// The backend authentication operations the client consumes.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /auth/login` with a credential pair.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// `POST /auth/refresh`, bearer = refresh token, empty body.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;

    /// `GET /auth/me`, bearer = access token.
    async fn me(&self, access_token: &str) -> Result<User, ApiError>;
}

/// Auth backend over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
}

impl HttpAuthBackend {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::from_client(client, config.api_base_url.clone()))
    }

    /// Build on an existing client, sharing its connection pool.
    pub fn from_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response body: {e}")))
    }

    /// Check if a response is successful, mapping the status and body to
    /// an error kind if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = format!("{}/auth/login", self.base_url);
        debug!(%username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        // Any non-2xx is a login failure; the backend does not distinguish
        // bad credentials from validation errors on this endpoint.
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::CredentialsRejected(if body.is_empty() {
                "login failed".to_string()
            } else {
                body
            }));
        }

        Self::parse(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let url = format!("{}/auth/refresh", self.base_url);
        debug!("Sending token refresh request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(refresh_token)
            .timeout(Duration::from_secs(REFRESH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Network(e)
                }
            })?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }

    async fn me(&self, access_token: &str) -> Result<User, ApiError> {
        let url = format!("{}/auth/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }
}
