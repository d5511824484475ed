use serde::Deserialize;

use super::User;

/// Payload returned by `POST /auth/login` on success.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Payload returned by `POST /auth/refresh` on success.
/// Only the access token is minted; the refresh token stays as issued.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}
