//! Data types shared across the client.
//!
//! `User` is the authenticated principal; the wire types in `auth` mirror
//! the JSON payloads of the backend's authentication endpoints.

pub mod auth;
pub mod user;

pub use auth::{LoginResponse, RefreshResponse};
pub use user::User;
