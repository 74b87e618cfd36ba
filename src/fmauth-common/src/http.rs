//! Centralized HTTP client factory.
//!
//! Every component of the credential chain receives the same `reqwest::Client`
//! by injection. Timeouts follow the fixed per-request budget: 30s to connect
//! or read, 60s for the whole exchange. Nothing here retries.

use reqwest::Client;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::TransportError;

/// User-Agent string for all HTTP requests
pub const USER_AGENT: &str = concat!("fmauth/", env!("CARGO_PKG_VERSION"));

/// Connection pool idle timeout so DNS is re-resolved periodically.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Content type of the AWS JSON 1.1 protocol used by Cognito and Secrets Manager.
pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Builds the shared client from configuration.
pub fn build_client(config: &HttpConfig) -> Result<Client, TransportError> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let timeout = Duration::from_secs(config.request_timeout_secs);

    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .read_timeout(connect_timeout)
        .timeout(timeout)
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {e}")))
}

/// Builds a client with the default 30s/60s budget.
pub fn default_client() -> Result<Client, TransportError> {
    build_client(&HttpConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_succeeds() {
        assert!(default_client().is_ok(), "default_client should succeed");
    }

    #[test]
    fn test_custom_timeouts_succeed() {
        let config = HttpConfig {
            connect_timeout_secs: 1,
            request_timeout_secs: 2,
        };
        assert!(build_client(&config).is_ok());
    }
}
