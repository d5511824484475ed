//! REST API plumbing for the Hiredesk backend.
//!
//! This module provides the `AuthBackend` seam over the three
//! authentication endpoints, the `RequestPipeline` that attaches bearer
//! tokens and retries once after a refresh on 401, and the `ApiClient`
//! the data-fetching layer builds its calls on.

pub mod backend;
pub mod client;
pub mod error;
pub mod pipeline;

pub use backend::{AuthBackend, HttpAuthBackend};
pub use client::ApiClient;
pub use error::ApiError;
pub use pipeline::RequestPipeline;
