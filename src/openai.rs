//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;
use tracing::warn;

/// Default timeout for OpenAI API requests (5 minutes).
///
/// Per-segment deadlines are enforced by the caller; this only bounds a
/// connection that stops responding entirely.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout.
///
/// Without an explicit key the client falls back to `OPENAI_API_KEY`.
pub fn create_client(api_key: Option<&str>) -> Client<OpenAIConfig> {
    create_client_with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
///
/// Falls back to the library's default HTTP client if a custom one cannot be built.
pub fn create_client_with_timeout(api_key: Option<&str>, timeout: Duration) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::default();
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }
    let client = Client::with_config(config);

    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(http_client) => client.with_http_client(http_client),
        Err(e) => {
            warn!("Failed to create HTTP client with timeout, using default: {}", e);
            client
        }
    }
}
