//! API server configuration.

use relay_core::auth::jwt::resolve_jwt_secret;
use relay_core::recording::DEFAULT_RECORDING_WINDOW_SECS;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:5000").
    pub bind_addr: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// How long a recording window stays open, in seconds.
    pub recording_window_secs: i64,
    /// Secret GitHub signs webhook deliveries with. Unset accepts unsigned
    /// deliveries.
    pub webhook_secret: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                       |
    /// |------------------------------|-------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:5000`              |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file |
    /// | `RECORDING_WINDOW_SECS`      | `300`                         |
    /// | `WEBHOOK_SECRET`             | unset                         |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".into()),
            jwt_secret: resolve_jwt_secret(),
            recording_window_secs: std::env::var("RECORDING_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .unwrap_or(DEFAULT_RECORDING_WINDOW_SECS),
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}
