//! Retry-on-401 stage for authenticated requests.
//!
//! The explicit equivalent of a response interceptor: `send` wraps a
//! request-send closure, attaches the stored access token, and on an
//! `Unauthorized` result runs exactly one refresh-and-retransmit cycle
//! before surfacing the failure. The at-most-one-retry bound is in the
//! control flow, not a counter.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::session::refresh_access;
use crate::auth::store::{TokenSlot, TokenStore};

use super::backend::AuthBackend;
use super::ApiError;

type ExpiredHook = Box<dyn Fn() + Send + Sync>;

pub struct RequestPipeline<S, B> {
    store: Arc<S>,
    backend: Arc<B>,
    on_session_expired: Option<ExpiredHook>,
}

impl<S: TokenStore, B: AuthBackend> RequestPipeline<S, B> {
    pub fn new(store: Arc<S>, backend: Arc<B>) -> Self {
        Self {
            store,
            backend,
            on_session_expired: None,
        }
    }

    /// Register the hook invoked when a refresh cycle fails mid-request:
    /// the UI's redirect to the login entry point.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Box::new(hook));
        self
    }

    /// Run a request through the pipeline.
    ///
    /// The closure receives the bearer token to attach (`None` when the
    /// store holds no access token) and performs one transmission. A 401
    /// on a request that carried a bearer triggers one refresh; on
    /// refresh success the closure runs once more with the new token and
    /// that result is final. On refresh failure both stored tokens are
    /// purged, the session-expired hook fires, and the original 401
    /// surfaces. A request sent without a bearer is never retried -
    /// there is no credential to refresh.
    pub async fn send<T, F, Fut>(&self, request: F) -> Result<T, ApiError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = match self.store.get(TokenSlot::Access) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token store read failed; sending unauthenticated");
                None
            }
        };
        let carried_bearer = token.is_some();

        match request(token).await {
            Err(ApiError::Unauthorized) if carried_bearer => {
                debug!("Request rejected with 401; attempting token refresh");
                match refresh_access(self.store.as_ref(), self.backend.as_ref()).await {
                    Ok(new_token) => request(Some(new_token)).await,
                    Err(e) => {
                        warn!(error = %e, "Refresh failed; session expired");
                        // Both tokens are dead at this point; leave neither behind
                        if let Err(purge_err) = self.store.purge() {
                            warn!(error = %purge_err, "Failed to purge tokens after refresh failure");
                        }
                        if let Some(hook) = &self.on_session_expired {
                            hook();
                        }
                        // Surface the original rejection, not the refresh error
                        Err(ApiError::Unauthorized)
                    }
                }
            }
            result => result,
        }
    }
}
