//! Client configuration for the Parley SDK
//!
//! Configuration is built explicitly or loaded from the environment.
//! Credentials are validated at client construction, before any network
//! activity, so a misconfigured client fails fast.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.parley.dev/v1";

/// Default model used when a request does not name one
pub const DEFAULT_MODEL: &str = "wizard";

/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "PARLEY_API_KEY";
/// Environment variable holding the organization ID
pub const ENV_ORG_ID: &str = "PARLEY_ORG_ID";
/// Environment variable holding the project ID
pub const ENV_PROJECT_ID: &str = "PARLEY_PROJECT_ID";
/// Environment variable overriding the base URL
pub const ENV_BASE_URL: &str = "PARLEY_BASE_URL";

fn default_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_max_conversations() -> usize {
    1000
}

/// Configuration for [`Client`](crate::Client) and [`AsyncClient`](crate::AsyncClient)
///
/// # Examples
///
/// ```
/// use parley::ClientConfig;
///
/// let config = ClientConfig::new("sk-key", "org-1", "proj-1")
///     .with_base_url("http://localhost:8080/v1")
///     .with_history_file("/tmp/parley-history.json");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key used as the bearer token
    pub api_key: String,
    /// Organization identifier sent with every request
    pub organization: String,
    /// Project identifier sent with every request
    pub project: String,
    /// Base URL for API requests
    pub base_url: String,
    /// Request timeout applied by the HTTP transport
    pub timeout: Duration,
    /// Whether conversation history tracking is enabled
    pub enable_history: bool,
    /// Optional file used to persist conversation history between sessions
    pub history_file: Option<PathBuf>,
    /// Maximum number of conversations retained before eviction
    pub max_conversations: usize,
}

impl ClientConfig {
    /// Create a configuration with explicit credentials and defaults elsewhere
    pub fn new(
        api_key: impl Into<String>,
        organization: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            organization: organization.into(),
            project: project.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: default_timeout(),
            enable_history: true,
            history_file: None,
            max_conversations: default_max_conversations(),
        }
    }

    /// Load credentials and base URL from the environment
    ///
    /// Reads `PARLEY_API_KEY`, `PARLEY_ORG_ID`, `PARLEY_PROJECT_ID` and the
    /// optional `PARLEY_BASE_URL` override.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any required variable is unset or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = require_env(ENV_API_KEY, "api_key")?;
        let organization = require_env(ENV_ORG_ID, "organization")?;
        let project = require_env(ENV_PROJECT_ID, "project")?;

        let mut config = Self::new(api_key, organization, project);
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            if !base_url.is_empty() {
                config.base_url = base_url;
            }
        }
        Ok(config)
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable conversation history tracking
    pub fn with_history_enabled(mut self, enabled: bool) -> Self {
        self.enable_history = enabled;
        self
    }

    /// Persist conversation history to the given file
    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = Some(path.into());
        self
    }

    /// Override the conversation retention limit
    pub fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for empty credentials, an unparseable base
    /// URL, or a zero conversation limit.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::Config(format!(
                "The api_key option must be set either explicitly or via the {} environment variable",
                ENV_API_KEY
            )));
        }
        if self.organization.is_empty() {
            return Err(Error::Config(format!(
                "The organization option must be set either explicitly or via the {} environment variable",
                ENV_ORG_ID
            )));
        }
        if self.project.is_empty() {
            return Err(Error::Config(format!(
                "The project option must be set either explicitly or via the {} environment variable",
                ENV_PROJECT_ID
            )));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(Error::Config(format!(
                "Invalid base_url: {}",
                self.base_url
            )));
        }
        if self.max_conversations == 0 {
            return Err(Error::Config(
                "max_conversations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_env(var: &str, option: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::Config(format!(
            "The {} option must be set either explicitly or via the {} environment variable",
            option, var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_new_config_defaults() {
        let config = ClientConfig::new("key", "org", "proj");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.enable_history);
        assert!(config.history_file.is_none());
        assert_eq!(config.max_conversations, 1000);
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_validate_ok() {
        let config = ClientConfig::new("key", "org", "proj");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_api_key() {
        let config = ClientConfig::new("", "org", "proj");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_validate_empty_organization() {
        let config = ClientConfig::new("key", "", "proj");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("organization"));
    }

    #[test]
    fn test_validate_empty_project() {
        let config = ClientConfig::new("key", "org", "");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("project"));
    }

    #[test]
    fn test_validate_bad_base_url() {
        let config = ClientConfig::new("key", "org", "proj").with_base_url("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_max_conversations() {
        let config = ClientConfig::new("key", "org", "proj").with_max_conversations(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::new("key", "org", "proj")
            .with_base_url("http://localhost:9999")
            .with_timeout(Duration::from_secs(5))
            .with_history_enabled(false)
            .with_history_file("/tmp/h.json")
            .with_max_conversations(10);

        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.enable_history);
        assert_eq!(config.history_file, Some(PathBuf::from("/tmp/h.json")));
        assert_eq!(config.max_conversations, 10);
    }

    #[test]
    #[serial]
    fn test_from_env_missing_key() {
        std::env::remove_var(ENV_API_KEY);
        std::env::remove_var(ENV_ORG_ID);
        std::env::remove_var(ENV_PROJECT_ID);
        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[serial]
    fn test_from_env_complete() {
        std::env::set_var(ENV_API_KEY, "env-key");
        std::env::set_var(ENV_ORG_ID, "env-org");
        std::env::set_var(ENV_PROJECT_ID, "env-proj");
        std::env::set_var(ENV_BASE_URL, "http://localhost:1234/v1");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.organization, "env-org");
        assert_eq!(config.project, "env-proj");
        assert_eq!(config.base_url, "http://localhost:1234/v1");

        std::env::remove_var(ENV_API_KEY);
        std::env::remove_var(ENV_ORG_ID);
        std::env::remove_var(ENV_PROJECT_ID);
        std::env::remove_var(ENV_BASE_URL);
    }
}
