//! JWT payload inspection for expiry prediction.
//!
//! The client never verifies signatures - that is the backend's job. It
//! only reads the payload segment so it can treat a token as unusable
//! before the server starts rejecting it mid-request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Margin before actual expiry at which a token is treated as unusable.
/// 5 minutes gives the refresh path time to run before the server would
/// reject the token.
pub const EXPIRY_MARGIN_MS: i64 = 300_000;

/// Claims the client depends on. Anything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Subject id
    pub sub: String,
    pub username: String,
    pub email: String,
    pub role_id: i64,
    pub is_hr: bool,
}

/// Ways a token string can fail structural decoding. Downstream treats
/// every kind the same way (as an expired token), but tests and logs can
/// tell them apart.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token does not have three dot-separated segments")]
    SegmentCount,

    #[error("payload segment is not valid URL-safe base64")]
    Base64,

    #[error("payload is not a JSON object with the expected claims")]
    Json,
}

/// Decode the payload segment of a JWT without verifying the signature.
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::SegmentCount);
    };

    // Some issuers pad the segment even though the JWT spec says not to.
    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| TokenError::Base64)?;

    serde_json::from_slice(&raw).map_err(|_| TokenError::Json)
}

/// True when the token decodes and its expiry is beyond the safety margin.
/// A token that fails to decode is unusable, never an error. The payload
/// is untrusted bytes, so an `exp` too large to convert to milliseconds
/// reads as unusable rather than overflowing.
pub fn is_usable(token: &str, now: DateTime<Utc>) -> bool {
    match decode(token) {
        Ok(claims) => claims
            .exp
            .checked_mul(1000)
            .and_then(|exp_ms| exp_ms.checked_sub(EXPIRY_MARGIN_MS))
            .map(|cutoff_ms| now.timestamp_millis() <= cutoff_ms)
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Instant at which the token actually expires, if it decodes at all
/// and the expiry is representable.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode(token).ok()?;
    let exp_ms = claims.exp.checked_mul(1000)?;
    Utc.timestamp_millis_opt(exp_ms).single()
}
