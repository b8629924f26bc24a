//! Utility functions for the session client

use crate::{Result, config::ClientConfig, errors::ClientError};
use base64::Engine;
use reqwest::Client;

/// HTTP client creation with common configuration.
///
/// The cookie store is enabled so the backend's refresh cookie travels
/// with every request, like a browser's `credentials: "include"`.
pub fn create_http_client(config: &ClientConfig) -> Result<Client> {
    let user_agent = match &config.options.user_agent_suffix {
        Some(suffix) => format!("session-client/{} {}", crate::VERSION, suffix),
        None => format!("session-client/{}", crate::VERSION),
    };

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(
            config.options.timeout_seconds,
        ))
        .user_agent(user_agent)
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Base64 URL-safe encode
pub fn base64_url_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

/// Base64 URL-safe decode
pub fn base64_url_decode(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| ClientError::InvalidToken(format!("Base64 decode error: {}", e)))
}

/// Extract JWT payload without verification
pub fn extract_jwt_payload(jwt: &str) -> Result<serde_json::Value> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(ClientError::InvalidToken("Invalid JWT format".to_string()));
    }

    let payload_bytes = base64_url_decode(parts[1])?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| ClientError::InvalidToken(format!("Invalid JWT payload: {}", e)))?;

    Ok(payload)
}

/// Check if JWT is expired (without signature verification)
pub fn is_jwt_expired_unsafe(jwt: &str) -> Result<bool> {
    let payload = extract_jwt_payload(jwt)?;

    if let Some(exp) = payload.get("exp").and_then(|e| e.as_i64()) {
        let now = chrono::Utc::now().timestamp();
        Ok(now >= exp)
    } else {
        Ok(false) // No expiration claim
    }
}

/// Percent-encode a single path segment
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Mask sensitive data for logging
pub fn mask_sensitive_data(data: &str, show_chars: usize) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= show_chars * 2 {
        "*".repeat(chars.len())
    } else {
        let start: String = chars[..show_chars].iter().collect();
        let end: String = chars[chars.len() - show_chars..].iter().collect();
        format!("{}***{}", start, end)
    }
}

/// Log request for debugging (with sensitive data masking)
pub fn log_http_request(method: &reqwest::Method, url: &str, headers: &reqwest::header::HeaderMap) {
    log::debug!("HTTP Request: {} {}", method, url);

    for (name, value) in headers.iter() {
        let header_name = name.as_str();
        let header_value = if header_name.contains("authorization") || header_name.contains("cookie")
        {
            mask_sensitive_data(value.to_str().unwrap_or(""), 4)
        } else {
            value.to_str().unwrap_or("").to_string()
        };

        log::debug!("  {}: {}", header_name, header_value);
    }
}
