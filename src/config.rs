//! Client configuration.
//!
//! One knob: the base URL of the Hiredesk backend. It is read from the
//! `HIREDESK_API_URL` environment variable and falls back to the backend's
//! local development listener.

/// Environment variable naming the backend base URL
const API_URL_ENV: &str = "HIREDESK_API_URL";

/// Default backend base URL used when `HIREDESK_API_URL` is unset.
/// Matches the backend's local development listener.
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL every endpoint path is appended to, without a trailing slash.
    pub api_base_url: String,
}

impl Config {
    /// Read the configuration from the environment, applying the default
    /// base URL when the variable is absent or empty.
    pub fn from_env() -> Self {
        let api_base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Self { api_base_url }
    }

    /// Build a configuration with an explicit base URL.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_base_url_is_kept_verbatim() {
        let config = Config::with_base_url("https://api.example.com/api");
        assert_eq!(config.api_base_url, "https://api.example.com/api");
    }

    #[test]
    fn default_points_at_local_backend() {
        assert_eq!(DEFAULT_API_BASE_URL, "http://localhost:5000/api");
    }
}
