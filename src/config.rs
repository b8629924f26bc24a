//! Configuration management for the session client

use crate::errors::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Default backend base URL used in development
pub const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// Default local storage key holding the access token
pub const DEFAULT_STORAGE_KEY: &str = "access_token";

/// Session client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL (e.g., "http://localhost:8080")
    pub api_base: String,

    /// Key under which the access token is persisted
    pub storage_key: String,

    /// Endpoint paths, relative to `api_base`
    pub endpoints: Endpoints,

    /// Additional configuration options
    pub options: ClientOptions,
}

/// Backend endpoint paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
    pub me: String,
    pub kv: String,
    pub files: String,
    pub ai_feedback: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
            me: "/auth/me".to_string(),
            kv: "/api/kv".to_string(),
            files: "/api/files".to_string(),
            ai_feedback: "/api/ai/feedback".to_string(),
        }
    }
}

impl Endpoints {
    /// Same endpoints with every auth path placed under `prefix`
    /// (e.g. "/api" turns "/auth/login" into "/api/auth/login").
    pub fn with_auth_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let defaults = Self::default();
        Self {
            login: format!("{}{}", prefix, defaults.login),
            register: format!("{}{}", prefix, defaults.register),
            refresh: format!("{}{}", prefix, defaults.refresh),
            logout: format!("{}{}", prefix, defaults.logout),
            me: format!("{}{}", prefix, defaults.me),
            ..defaults
        }
    }
}

/// Additional configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    /// HTTP request timeout in seconds (default: 30)
    pub timeout_seconds: u64,

    /// Extra user agent suffix appended to the crate's own
    pub user_agent_suffix: Option<String>,

    /// Log request headers (masked) at debug level (default: false)
    pub debug_logging: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent_suffix: None,
            debug_logging: false,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl ClientConfig {
    /// Create a new configuration pointing at `api_base`
    ///
    /// # Example
    ///
    /// ```rust
    /// use session_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("http://localhost:8080");
    /// assert_eq!(config.storage_key, "access_token");
    /// ```
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            endpoints: Endpoints::default(),
            options: ClientOptions::default(),
        }
    }

    /// Set the storage key for the access token
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the endpoint paths
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.options.timeout_seconds = timeout_seconds;
        self
    }

    /// Enable debug logging of outgoing requests
    pub fn with_debug_logging(mut self, debug: bool) -> Self {
        self.options.debug_logging = debug;
        self
    }

    /// Set custom options
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - `SESSION_CLIENT_API_BASE`: backend base URL (default: http://localhost:8080)
    /// - `SESSION_CLIENT_STORAGE_KEY`: token storage key (default: access_token)
    /// - `SESSION_CLIENT_AUTH_PREFIX`: prefix for auth paths (default: none)
    /// - `SESSION_CLIENT_TIMEOUT_SECONDS`: request timeout (default: 30)
    /// - `SESSION_CLIENT_DEBUG_LOGGING`: enable debug logging (default: false)
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let api_base =
            env::var("SESSION_CLIENT_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let storage_key = env::var("SESSION_CLIENT_STORAGE_KEY")
            .unwrap_or_else(|_| DEFAULT_STORAGE_KEY.to_string());

        let endpoints = match env::var("SESSION_CLIENT_AUTH_PREFIX") {
            Ok(prefix) if !prefix.is_empty() => Endpoints::with_auth_prefix(&prefix),
            _ => Endpoints::default(),
        };

        let timeout_seconds = env::var("SESSION_CLIENT_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ClientError::config_error("SESSION_CLIENT_TIMEOUT_SECONDS must be a number"))?;

        let debug_logging = env::var("SESSION_CLIENT_DEBUG_LOGGING")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let config = Self {
            api_base,
            storage_key,
            endpoints,
            options: ClientOptions {
                timeout_seconds,
                user_agent_suffix: None,
                debug_logging,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_base.is_empty() {
            return Err(ClientError::config_error("API base cannot be empty"));
        }

        let url = Url::parse(&self.api_base)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::config_error("API base must use HTTP or HTTPS"));
        }

        if self.storage_key.is_empty() {
            return Err(ClientError::config_error("Storage key cannot be empty"));
        }

        if self.options.timeout_seconds == 0 {
            return Err(ClientError::config_error("Timeout must be greater than 0"));
        }

        if self.options.timeout_seconds > 300 {
            return Err(ClientError::config_error(
                "Timeout too long (max 300 seconds)",
            ));
        }

        Ok(())
    }

    /// Get the full API URL for a path
    pub fn get_api_url(&self, path: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Check whether `path` is the refresh endpoint
    pub fn is_refresh_path(&self, path: &str) -> bool {
        path.trim_end_matches('/') == self.endpoints.refresh.trim_end_matches('/')
    }
}

/// Builder for the session client configuration
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set API base URL
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    /// Set token storage key
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = key.into();
        self
    }

    /// Set endpoints
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    /// Set options
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
