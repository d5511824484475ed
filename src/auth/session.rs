//! The session lifecycle manager.
//!
//! Owns the in-memory view of who is signed in and drives the stored
//! token pair through its lifecycle: created by login, access token
//! replaced by refresh, destroyed by logout or an irrecoverable refresh
//! failure. Constructed explicitly with its two collaborators injected -
//! there is no ambient global - so front ends pass it where it is needed
//! and tests drive it with in-memory doubles.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthBackend};
use crate::models::User;

use super::jwt;
use super::store::{TokenSlot, TokenStore};

/// Lifecycle states of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process start, before the first auth check has settled
    Unknown,
    /// An auth check or login is in flight
    Authenticating,
    Authenticated,
    Unauthenticated,
}

/// How a `check_auth` call settled. The session never fails outward from
/// a check; callers that care about *why* inspect this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No access token in the store
    NoToken,
    /// Access token usable and the identity fetch succeeded
    Authenticated,
    /// Access token expired or malformed, but the refresh path recovered
    Refreshed,
    /// Session irrecoverable; both tokens were purged
    Ended(EndReason),
    /// Transient failure on the identity check; prior state preserved
    Transient,
}

/// Why an irrecoverable check purged the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Access token unusable and no refresh token stored
    NoRefreshToken,
    /// The refresh call failed
    RefreshRejected,
    /// The server rejected an access token that looked unexpired
    AccessRejected,
    /// Refresh succeeded but the follow-up identity fetch failed
    IdentityAfterRefresh,
}

/// Why a refresh cycle could not produce a new access token.
#[derive(Error, Debug)]
pub(crate) enum RefreshError {
    #[error("no refresh token in store")]
    Missing,

    #[error("refresh rejected: {0}")]
    Rejected(#[from] ApiError),
}

/// Run one refresh cycle: read the refresh token, exchange it for a new
/// access token, persist the access token. The refresh token itself is
/// left untouched. Shared by `check_auth` and the request pipeline.
pub(crate) async fn refresh_access<S, B>(store: &S, backend: &B) -> Result<String, RefreshError>
where
    S: TokenStore,
    B: AuthBackend,
{
    let refresh_token = match store.get(TokenSlot::Refresh) {
        Ok(Some(token)) => token,
        Ok(None) => return Err(RefreshError::Missing),
        Err(e) => {
            warn!(error = %e, "Failed to read refresh token from store");
            return Err(RefreshError::Missing);
        }
    };

    let response = backend.refresh(&refresh_token).await?;

    if let Err(e) = store.set(TokenSlot::Access, &response.access_token) {
        // The in-memory token still works for this process; only
        // persistence across restarts is lost.
        warn!(error = %e, "Failed to persist refreshed access token");
    }
    debug!("Access token refreshed");

    Ok(response.access_token)
}

/// The session manager. One instance per process, owned by whoever owns
/// the application lifecycle.
pub struct Session<S, B> {
    store: Arc<S>,
    backend: Arc<B>,
    current_user: Option<User>,
    state: SessionState,
    loading: bool,
}

impl<S: TokenStore, B: AuthBackend> Session<S, B> {
    pub fn new(store: Arc<S>, backend: Arc<B>) -> Self {
        Self {
            store,
            backend,
            current_user: None,
            state: SessionState::Unknown,
            loading: true,
        }
    }

    /// The authenticated principal, if any.
    pub fn user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    /// True only until the first `check_auth` has settled.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle to the token store, for wiring up the request pipeline.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Handle to the auth backend, for wiring up the request pipeline.
    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    /// Replace the principal directly, deriving the session state from it.
    pub fn set_user(&mut self, user: Option<User>) {
        self.state = if user.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        };
        self.current_user = user;
    }

    /// Authenticate with a credential pair.
    ///
    /// On success the returned token pair is persisted and the session
    /// enters `Authenticated`. On failure nothing is mutated - stored
    /// tokens and session state stay exactly as they were - and the
    /// error propagates so the UI can render it.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<User, ApiError> {
        let prior = self.state;
        self.state = SessionState::Authenticating;

        match self.backend.login(username, password).await {
            Ok(response) => {
                if let Err(e) = self
                    .store
                    .store_pair(&response.access_token, &response.refresh_token)
                {
                    warn!(error = %e, "Failed to persist tokens after login");
                }
                info!(username = %response.user.username, "Logged in");
                self.enter_authenticated(response.user.clone());
                Ok(response.user)
            }
            Err(e) => {
                self.state = prior;
                Err(e)
            }
        }
    }

    /// Settle the session from whatever is in the token store.
    ///
    /// Never fails outward; on return `is_loading()` is false and the
    /// session state reflects the outcome. Safe to call repeatedly - the
    /// terminal state is convergent.
    pub async fn check_auth(&mut self) -> CheckOutcome {
        let prior = self.state;
        self.state = SessionState::Authenticating;
        let outcome = self.run_check(prior).await;
        self.loading = false;
        outcome
    }

    async fn run_check(&mut self, prior: SessionState) -> CheckOutcome {
        let access = match self.store.get(TokenSlot::Access) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token store read failed; treating as signed out");
                None
            }
        };
        let Some(access) = access else {
            self.current_user = None;
            self.state = SessionState::Unauthenticated;
            return CheckOutcome::NoToken;
        };

        if !jwt::is_usable(&access, Utc::now()) {
            // Malformed and expired tokens take the same path: try to
            // mint a fresh access token rather than failing outright.
            debug!("Access token unusable; attempting refresh");
            return match refresh_access(self.store.as_ref(), self.backend.as_ref()).await {
                Ok(new_access) => match self.backend.me(&new_access).await {
                    Ok(user) => {
                        info!(username = %user.username, "Session refreshed");
                        self.enter_authenticated(user);
                        CheckOutcome::Refreshed
                    }
                    Err(e) => {
                        warn!(error = %e, "Identity fetch failed after refresh");
                        self.end_session();
                        CheckOutcome::Ended(EndReason::IdentityAfterRefresh)
                    }
                },
                Err(RefreshError::Missing) => {
                    self.end_session();
                    CheckOutcome::Ended(EndReason::NoRefreshToken)
                }
                Err(RefreshError::Rejected(e)) => {
                    warn!(error = %e, "Token refresh rejected");
                    self.end_session();
                    CheckOutcome::Ended(EndReason::RefreshRejected)
                }
            };
        }

        match self.backend.me(&access).await {
            Ok(user) => {
                self.enter_authenticated(user);
                CheckOutcome::Authenticated
            }
            Err(ApiError::Unauthorized) => {
                // The token looked unexpired but the server rejected it.
                // Trust the server.
                warn!("Server rejected an unexpired access token");
                self.end_session();
                CheckOutcome::Ended(EndReason::AccessRejected)
            }
            Err(e) => {
                // Network or server trouble, not an auth verdict. Neither
                // confirm nor revoke the session.
                debug!(error = %e, "Transient failure during identity check");
                self.state = prior;
                CheckOutcome::Transient
            }
        }
    }

    /// End the session. Cannot fail; store trouble is logged, not raised.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.purge() {
            warn!(error = %e, "Failed to clear stored tokens on logout");
        }
        self.current_user = None;
        self.state = SessionState::Unauthenticated;
        info!("Signed out");
    }

    fn enter_authenticated(&mut self, user: User) {
        self.current_user = Some(user);
        self.state = SessionState::Authenticated;
    }

    fn end_session(&mut self) {
        if let Err(e) = self.store.purge() {
            warn!(error = %e, "Failed to purge tokens");
        }
        self.current_user = None;
        self.state = SessionState::Unauthenticated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::backend::stub::StubBackend;
    use crate::auth::jwt::testing::token_expiring_at;
    use crate::auth::store::MemoryTokenStore;
    use crate::models::{LoginResponse, RefreshResponse};

    fn alice() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            role_id: 2,
            department_id: None,
            department_name: None,
            is_hr: true,
        }
    }

    fn session() -> (Arc<MemoryTokenStore>, Arc<StubBackend>, Session<MemoryTokenStore, StubBackend>) {
        let store = Arc::new(MemoryTokenStore::new());
        let backend = Arc::new(StubBackend::new());
        let session = Session::new(Arc::clone(&store), Arc::clone(&backend));
        (store, backend, session)
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[tokio::test]
    async fn empty_store_settles_unauthenticated() {
        let (_store, backend, mut session) = session();
        assert!(session.is_loading());

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::NoToken);
        assert!(!session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(backend.me_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_token_authenticates_directly() {
        let (store, backend, mut session) = session();
        store
            .set(TokenSlot::Access, &token_expiring_at(now() + 3600))
            .unwrap();
        backend.push_me(Ok(alice()));

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Authenticated);
        assert!(session.is_authenticated());
        assert_eq!(session.user().unwrap().username, "alice");
        assert_eq!(backend.refresh_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_inside_margin_is_refreshed() {
        let (store, backend, mut session) = session();
        // 60s out: not yet expired, but inside the 5-minute margin
        store
            .store_pair(&token_expiring_at(now() + 60), "refresh-token")
            .unwrap();
        let fresh = token_expiring_at(now() + 3600);
        backend.push_refresh(Ok(RefreshResponse {
            access_token: fresh.clone(),
        }));
        backend.push_me(Ok(alice()));

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Refreshed);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.get(TokenSlot::Access).unwrap().as_deref(), Some(fresh.as_str()));
        // Refresh token slot untouched
        assert_eq!(
            store.get(TokenSlot::Refresh).unwrap().as_deref(),
            Some("refresh-token")
        );
    }

    #[tokio::test]
    async fn rejected_refresh_purges_both_tokens() {
        let (store, backend, mut session) = session();
        store
            .store_pair(&token_expiring_at(now() + 60), "refresh-token")
            .unwrap();
        backend.push_refresh(Err(ApiError::Unauthorized));

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Ended(EndReason::RefreshRejected));
        assert!(!session.is_authenticated());
        assert_eq!(store.get(TokenSlot::Access).unwrap(), None);
        assert_eq!(store.get(TokenSlot::Refresh).unwrap(), None);
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_purges() {
        let (store, backend, mut session) = session();
        store
            .set(TokenSlot::Access, &token_expiring_at(now() - 10))
            .unwrap();

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Ended(EndReason::NoRefreshToken));
        assert_eq!(store.get(TokenSlot::Access).unwrap(), None);
        assert_eq!(backend.refresh_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_token_takes_the_refresh_path() {
        let (store, backend, mut session) = session();
        store.store_pair("not-a-jwt", "refresh-token").unwrap();
        backend.push_refresh(Ok(RefreshResponse {
            access_token: token_expiring_at(now() + 3600),
        }));
        backend.push_me(Ok(alice()));

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Refreshed);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn server_rejecting_unexpired_token_ends_the_session() {
        let (store, backend, mut session) = session();
        store
            .store_pair(&token_expiring_at(now() + 3600), "refresh-token")
            .unwrap();
        backend.push_me(Err(ApiError::Unauthorized));

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Ended(EndReason::AccessRejected));
        assert_eq!(store.get(TokenSlot::Access).unwrap(), None);
        assert_eq!(store.get(TokenSlot::Refresh).unwrap(), None);
    }

    #[tokio::test]
    async fn transient_failure_preserves_the_session() {
        let (store, backend, mut session) = session();
        store
            .store_pair(&token_expiring_at(now() + 3600), "refresh-token")
            .unwrap();
        backend.push_me(Ok(alice()));
        assert_eq!(session.check_auth().await, CheckOutcome::Authenticated);

        // Second check hits a 500: neither confirmed nor revoked
        backend.push_me(Err(ApiError::ServerError("boom".to_string())));
        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Transient);
        assert!(session.is_authenticated());
        assert_eq!(session.user().unwrap().username, "alice");
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(store.get(TokenSlot::Access).unwrap().is_some());
        assert!(store.get(TokenSlot::Refresh).unwrap().is_some());
    }

    #[tokio::test]
    async fn identity_failure_after_refresh_purges() {
        let (store, backend, mut session) = session();
        store
            .store_pair(&token_expiring_at(now() + 60), "refresh-token")
            .unwrap();
        backend.push_refresh(Ok(RefreshResponse {
            access_token: token_expiring_at(now() + 3600),
        }));
        backend.push_me(Err(ApiError::ServerError("boom".to_string())));

        let outcome = session.check_auth().await;

        assert_eq!(outcome, CheckOutcome::Ended(EndReason::IdentityAfterRefresh));
        assert_eq!(store.get(TokenSlot::Access).unwrap(), None);
        assert_eq!(store.get(TokenSlot::Refresh).unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_path_is_repeatable() {
        let (store, backend, mut session) = session();
        store
            .store_pair(&token_expiring_at(now() + 60), "refresh-token")
            .unwrap();
        // First refresh mints a token that is itself inside the margin,
        // forcing a second refresh on the next check.
        let short_lived = token_expiring_at(now() + 120);
        let long_lived = token_expiring_at(now() + 3600);
        backend.push_refresh(Ok(RefreshResponse {
            access_token: short_lived,
        }));
        backend.push_me(Ok(alice()));
        backend.push_refresh(Ok(RefreshResponse {
            access_token: long_lived.clone(),
        }));
        backend.push_me(Ok(alice()));

        assert_eq!(session.check_auth().await, CheckOutcome::Refreshed);
        assert_eq!(session.check_auth().await, CheckOutcome::Refreshed);

        assert_eq!(session.user().unwrap().username, "alice");
        // The slot holds the most recently issued token
        assert_eq!(
            store.get(TokenSlot::Access).unwrap().as_deref(),
            Some(long_lived.as_str())
        );
    }

    #[tokio::test]
    async fn login_stores_the_pair_and_the_user() {
        let (store, backend, mut session) = session();
        backend.push_login(Ok(LoginResponse {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: alice(),
        }));

        let user = session.login("admin_rh", "password123").await.unwrap();

        assert_eq!(user, alice());
        assert!(session.is_authenticated());
        assert_eq!(session.user(), Some(&alice()));
        assert_eq!(store.get(TokenSlot::Access).unwrap().as_deref(), Some("access-1"));
        assert_eq!(store.get(TokenSlot::Refresh).unwrap().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn failed_login_leaves_everything_untouched() {
        let (store, backend, mut session) = session();
        store.store_pair("old-access", "old-refresh").unwrap();
        backend.push_login(Err(ApiError::CredentialsRejected("nope".to_string())));

        let result = session.login("alice", "wrong").await;

        assert!(matches!(result, Err(ApiError::CredentialsRejected(_))));
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::Unknown);
        assert_eq!(store.get(TokenSlot::Access).unwrap().as_deref(), Some("old-access"));
        assert_eq!(store.get(TokenSlot::Refresh).unwrap().as_deref(), Some("old-refresh"));
    }

    #[tokio::test]
    async fn logout_purges_and_clears() {
        let (store, backend, mut session) = session();
        backend.push_login(Ok(LoginResponse {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: alice(),
        }));
        session.login("alice", "pw").await.unwrap();

        session.logout();

        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(store.get(TokenSlot::Access).unwrap(), None);
        assert_eq!(store.get(TokenSlot::Refresh).unwrap(), None);
    }

    #[tokio::test]
    async fn set_user_derives_the_state() {
        let (_store, _backend, mut session) = session();

        session.set_user(Some(alice()));
        assert!(session.is_authenticated());
        assert_eq!(session.state(), SessionState::Authenticated);

        session.set_user(None);
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }
}
