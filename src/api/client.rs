//! HTTP client for the Hiredesk REST API.
//!
//! Data-fetching layers use this instead of raw reqwest: every request
//! goes through the [`RequestPipeline`], which attaches the stored
//! access token and handles the one refresh-and-retry cycle on a 401.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::store::TokenStore;
use crate::config::Config;

use super::backend::{HttpAuthBackend, REQUEST_TIMEOUT_SECS};
use super::pipeline::RequestPipeline;
use super::ApiError;

/// API client bound to a token store.
/// Clone is not provided: one client per process, shared by reference.
pub struct ApiClient<S> {
    client: Client,
    base_url: String,
    pipeline: RequestPipeline<S, HttpAuthBackend>,
}

impl<S: TokenStore> ApiClient<S> {
    pub fn new(config: &Config, store: Arc<S>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let backend = Arc::new(HttpAuthBackend::from_client(
            client.clone(),
            config.api_base_url.clone(),
        ));

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            pipeline: RequestPipeline::new(store, backend),
        })
    }

    /// Register the redirect hook fired when a mid-request refresh fails.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.pipeline = self.pipeline.on_session_expired(hook);
        self
    }

    /// GET a JSON resource, authenticated when a token is stored.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        self.pipeline
            .send(|token| {
                let mut request = self.client.get(&url);
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                async move {
                    let response = request.send().await?;
                    read_json(response).await
                }
            })
            .await
    }

    /// POST a JSON body and parse a JSON response, authenticated when a
    /// token is stored.
    pub async fn post_json<T, Body>(&self, path: &str, body: &Body) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Body: Serialize,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");

        self.pipeline
            .send(|token| {
                let mut request = self.client.post(&url).json(body);
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                async move {
                    let response = request.send().await?;
                    read_json(response).await
                }
            })
            .await
    }
}

/// Parse a successful response as JSON, mapping non-success statuses to
/// the error taxonomy (401 becomes `Unauthorized`, which the pipeline
/// acts on).
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status, &body));
    }
    response
        .json()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response body: {e}")))
}
