//! Hiredesk client - session and token lifecycle for the Hiredesk
//! recruitment API.
//!
//! The crate owns the client side of authentication: credential login,
//! token persistence, expiry prediction, silent refresh, and the
//! retry-once-on-401 request pipeline. Rendering and the backend's
//! business rules live elsewhere; a front end constructs a [`Session`]
//! and an [`ApiClient`] over a shared token store and drives them:
//!
//! ```no_run
//! use std::sync::Arc;
//! use hiredesk::{ApiClient, Config, FileTokenStore, HttpAuthBackend, Session};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env();
//! let store = Arc::new(FileTokenStore::new()?);
//! let backend = Arc::new(HttpAuthBackend::new(&config)?);
//!
//! let mut session = Session::new(Arc::clone(&store), backend);
//! session.check_auth().await;
//!
//! let _api = ApiClient::new(&config, store)?
//!     .on_session_expired(|| { /* navigate to the login screen */ });
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthBackend, HttpAuthBackend, RequestPipeline};
pub use auth::{
    CheckOutcome, EndReason, FileTokenStore, MemoryTokenStore, Session, SessionState, TokenSlot,
    TokenStore,
};
pub use config::Config;
pub use models::{LoginResponse, RefreshResponse, User};
