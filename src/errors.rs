//! Error types for the session client

use thiserror::Error;

/// Result type for session client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Session client error types
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    NetworkError(#[from] NetworkErrorWrapper),

    /// The backend answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// No valid session: the identity check was rejected
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Token storage could not be read or written
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationErrorWrapper),

    /// Invalid token provided
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The backend exposes no endpoint for this operation
    #[error("Operation not supported by the backend: {0}")]
    Unsupported(&'static str),
}

/// Wrapper for network errors to make them cloneable
#[derive(Error, Debug, Clone)]
#[error("{inner}")]
pub struct NetworkErrorWrapper {
    inner: String,
}

impl From<reqwest::Error> for NetworkErrorWrapper {
    fn from(err: reqwest::Error) -> Self {
        Self {
            inner: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::NetworkError(err.into())
    }
}

/// Wrapper for serialization errors to make them cloneable
#[derive(Error, Debug, Clone)]
#[error("{inner}")]
pub struct SerializationErrorWrapper {
    inner: String,
}

impl From<serde_json::Error> for SerializationErrorWrapper {
    fn from(err: serde_json::Error) -> Self {
        Self {
            inner: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::SerializationError(err.into())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::StorageError(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::ConfigError(format!("Invalid URL: {}", err))
    }
}

impl From<reqwest::header::InvalidHeaderValue> for ClientError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        ClientError::InvalidToken(format!("Token is not a valid header value: {}", err))
    }
}

impl ClientError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        ClientError::ConfigError(msg.into())
    }

    /// Create a new storage error
    pub fn storage_error(msg: impl Into<String>) -> Self {
        ClientError::StorageError(msg.into())
    }

    /// Create an error from a non-success HTTP response.
    ///
    /// The message is the `error` field of a JSON body when present,
    /// otherwise `fallback`.
    pub fn from_response(status: u16, body: &str, fallback: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| {
                json.get("error")
                    .and_then(|m| m.as_str())
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| fallback.to_string());

        ClientError::Api { status, message }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::NotAuthenticated => Some(401),
            _ => None,
        }
    }

    /// Check if the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::NetworkError(_) => true,
            ClientError::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Check if this error is related to authentication
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ClientError::NotAuthenticated
                | ClientError::InvalidToken(_)
                | ClientError::Api { status: 401, .. }
        )
    }

    /// Get the error code for structured error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::NetworkError(_) => "NETWORK_ERROR",
            ClientError::Api { .. } => "API_ERROR",
            ClientError::NotAuthenticated => "NOT_AUTHENTICATED",
            ClientError::StorageError(_) => "STORAGE_ERROR",
            ClientError::ConfigError(_) => "CONFIG_ERROR",
            ClientError::SerializationError(_) => "SERIALIZATION_ERROR",
            ClientError::InvalidToken(_) => "INVALID_TOKEN",
            ClientError::Unsupported(_) => "UNSUPPORTED",
        }
    }

    /// Convert error to JSON for display layers
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.error_code(),
            "message": self.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_uses_server_message() {
        let error =
            ClientError::from_response(400, r#"{"error": "Email already in use"}"#, "Login failed");
        assert_eq!(error.to_string(), "Email already in use");
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn test_from_response_fallback() {
        let error = ClientError::from_response(500, "<html>oops</html>", "Login failed");
        assert_eq!(error.to_string(), "Login failed");

        let error = ClientError::from_response(401, r#"{"message": "nope"}"#, "Register failed");
        assert_eq!(error.to_string(), "Register failed");

        let error = ClientError::from_response(401, r#"{"error": ""}"#, "Login failed");
        assert_eq!(error.to_string(), "Login failed");
    }

    #[test]
    fn test_error_categorization() {
        assert!(ClientError::NotAuthenticated.is_auth_error());
        assert!(ClientError::from_response(401, "", "x").is_auth_error());
        assert!(!ClientError::Unsupported("kv.list").is_auth_error());

        assert!(ClientError::from_response(503, "", "x").is_retryable());
        assert!(ClientError::from_response(429, "", "x").is_retryable());
        assert!(!ClientError::from_response(400, "", "x").is_retryable());
    }

    #[test]
    fn test_json_serialization() {
        let error = ClientError::NotAuthenticated;
        let json = error.to_json();

        assert_eq!(json["error"], "NOT_AUTHENTICATED");
        assert_eq!(json["message"], "Not authenticated");
    }

    #[test]
    fn test_unsupported_names_operation() {
        let error = ClientError::Unsupported("fs.read_dir");
        assert_eq!(error.error_code(), "UNSUPPORTED");
        assert!(error.to_string().contains("fs.read_dir"));
    }
}
