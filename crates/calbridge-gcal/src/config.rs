//! Google Calendar backend configuration.

use std::env;
use std::time::Duration;

use crate::error::{GcalError, GcalResult};

/// Environment variable holding the OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
/// Environment variable holding the long-lived refresh credential.
pub const ENV_REFRESH_TOKEN: &str = "GOOGLE_REFRESH_TOKEN";

/// The OAuth scope required for full calendar access.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Configuration for the Google Calendar backend.
///
/// Built once at process start and dependency-injected into the client;
/// no component reads the environment after construction.
#[derive(Debug, Clone)]
pub struct GcalConfig {
    /// OAuth 2.0 client ID from the Google Cloud Console.
    pub client_id: String,
    /// OAuth 2.0 client secret from the Google Cloud Console.
    pub client_secret: String,
    /// Long-lived refresh token exchanged for short-lived access tokens.
    pub refresh_token: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for API requests.
    pub user_agent: String,
}

impl GcalConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new configuration with the given credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calbridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Builds the configuration from the process environment.
    ///
    /// All three credential variables must be set and non-empty; a missing
    /// one is reported as a single configuration error naming the full set
    /// so the operator can fix the environment in one pass.
    pub fn from_env() -> GcalResult<Self> {
        let client_id = env::var(ENV_CLIENT_ID).unwrap_or_default();
        let client_secret = env::var(ENV_CLIENT_SECRET).unwrap_or_default();
        let refresh_token = env::var(ENV_REFRESH_TOKEN).unwrap_or_default();

        if refresh_token.is_empty() || client_id.is_empty() || client_secret.is_empty() {
            return Err(GcalError::configuration(format!(
                "missing required environment variables: {ENV_REFRESH_TOKEN}, \
                 {ENV_CLIENT_ID}, and {ENV_CLIENT_SECRET} must be set"
            )));
        }

        Ok(Self::new(client_id, client_secret, refresh_token))
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        if self.refresh_token.is_empty() {
            return Err("refresh_token is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GcalConfig {
        GcalConfig::new(
            "test-client.apps.googleusercontent.com",
            "test-secret",
            "test-refresh-token",
        )
    }

    #[test]
    fn config_creation() {
        let config = test_config();
        assert_eq!(
            config.timeout,
            Duration::from_secs(GcalConfig::DEFAULT_TIMEOUT_SECS)
        );
        assert!(config.user_agent.starts_with("calbridge/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder_methods() {
        let config = test_config()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("calbridge-test/0.0");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "calbridge-test/0.0");
    }

    #[test]
    fn validation_rejects_empty_credentials() {
        let config = GcalConfig::new("", "secret", "refresh");
        assert_eq!(config.validate(), Err("client_id is required"));

        let config = GcalConfig::new("id", "", "refresh");
        assert_eq!(config.validate(), Err("client_secret is required"));

        let config = GcalConfig::new("id", "secret", "");
        assert_eq!(config.validate(), Err("refresh_token is required"));
    }
}
