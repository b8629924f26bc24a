//! Explicit session object owning the persisted access token

use crate::{
    Result,
    token_store::{MemoryTokenStore, TokenStore},
    utils::is_jwt_expired_unsafe,
};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Identity returned by the backend for the current session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Any further fields the backend sends
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Access-token holder shared by the client and the app store.
///
/// Cloning is cheap and every clone sees the same token.
/// `set_token`, `rotate_token` and `clear` are the only mutators.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    key: Arc<str>,
    identity_checked: Arc<AtomicBool>,
    last_rotated: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("identity_checked", &self.identity_checked.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session persisting its token in `store` under `key`
    pub fn new(store: Arc<dyn TokenStore>, key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self {
            store,
            key: Arc::from(key),
            identity_checked: Arc::new(AtomicBool::new(false)),
            last_rotated: Arc::new(RwLock::new(None)),
        }
    }

    /// Session backed by a fresh in-memory store
    pub fn in_memory(key: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()), key)
    }

    /// Storage key of the token
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted token. No side effects.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.store.get(&self.key)?.filter(|t| !t.is_empty()))
    }

    /// Write or clear the persisted token.
    ///
    /// An empty string clears, same as `None`. This starts a new session,
    /// so the identity check is reset until the next successful one.
    pub fn set_token(&self, token: Option<&str>) -> Result<()> {
        self.write_token(token)?;
        self.identity_checked.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Replace the token of the current session after a refresh.
    ///
    /// The identity behind the session is unchanged, so the outcome of the
    /// last identity check is kept. An empty token clears and resets it.
    pub fn rotate_token(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return self.set_token(None);
        }
        self.write_token(Some(token))
    }

    fn write_token(&self, token: Option<&str>) -> Result<()> {
        let token = token.filter(|t| !t.is_empty());
        match token {
            Some(token) => self.store.set(&self.key, token)?,
            None => self.store.remove(&self.key)?,
        }
        if let Ok(mut last_rotated) = self.last_rotated.write() {
            *last_rotated = Some(Utc::now());
        }
        debug!("Access token {}", if token.is_some() { "stored" } else { "cleared" });
        Ok(())
    }

    /// Clear the persisted token
    pub fn clear(&self) -> Result<()> {
        self.set_token(None)
    }

    /// Record the outcome of the last identity check
    pub fn mark_identity_checked(&self, ok: bool) {
        self.identity_checked.store(ok, Ordering::SeqCst);
    }

    /// Authenticated iff a token is present and the last identity check succeeded
    pub fn is_authenticated(&self) -> bool {
        self.identity_checked.load(Ordering::SeqCst) && matches!(self.token(), Ok(Some(_)))
    }

    /// Time of the last token write or clear through this session
    pub fn last_rotated(&self) -> Option<DateTime<Utc>> {
        self.last_rotated.read().ok().and_then(|guard| *guard)
    }

    /// Whether the token is a JWT whose `exp` claim has passed.
    ///
    /// The signature is not verified. Opaque tokens and missing tokens
    /// report `false`.
    pub fn token_expired(&self) -> bool {
        match self.token() {
            Ok(Some(token)) => is_jwt_expired_unsafe(&token).unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::base64_url_encode;

    fn jwt_with_exp(exp: i64) -> String {
        let header = base64_url_encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = base64_url_encode(format!(r#"{{"sub":"alice","exp":{}}}"#, exp).as_bytes());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_set_and_clear_token() {
        let session = Session::in_memory("access_token");
        assert_eq!(session.token().unwrap(), None);
        assert!(session.last_rotated().is_none());

        session.set_token(Some("abc")).unwrap();
        assert_eq!(session.token().unwrap(), Some("abc".to_string()));
        assert!(session.last_rotated().is_some());

        session.clear().unwrap();
        assert_eq!(session.token().unwrap(), None);
    }

    #[test]
    fn test_empty_token_clears() {
        let session = Session::in_memory("access_token");
        session.set_token(Some("abc")).unwrap();
        session.set_token(Some("")).unwrap();
        assert_eq!(session.token().unwrap(), None);
    }

    #[test]
    fn test_clones_share_token() {
        let session = Session::in_memory("access_token");
        let cloned = session.clone();

        cloned.set_token(Some("xyz")).unwrap();
        assert_eq!(session.token().unwrap(), Some("xyz".to_string()));
    }

    #[test]
    fn test_authenticated_is_derived() {
        let session = Session::in_memory("access_token");
        session.mark_identity_checked(true);
        assert!(!session.is_authenticated(), "no token yet");

        session.set_token(Some("abc")).unwrap();
        assert!(!session.is_authenticated(), "token write resets the check");

        session.mark_identity_checked(true);
        assert!(session.is_authenticated());

        session.clear().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_rotation_keeps_identity_check() {
        let session = Session::in_memory("access_token");
        session.set_token(Some("abc")).unwrap();
        session.mark_identity_checked(true);

        session.rotate_token("xyz").unwrap();
        assert_eq!(session.token().unwrap(), Some("xyz".to_string()));
        assert!(session.is_authenticated());

        session.rotate_token("").unwrap();
        assert_eq!(session.token().unwrap(), None);
        assert!(!session.is_authenticated());

        session.set_token(Some("abc")).unwrap();
        assert!(!session.is_authenticated(), "no identity check since the last login");
    }

    #[test]
    fn test_token_expired() {
        let session = Session::in_memory("access_token");
        assert!(!session.token_expired());

        session.set_token(Some("opaque-token")).unwrap();
        assert!(!session.token_expired());

        let past = Utc::now().timestamp() - 60;
        session.set_token(Some(&jwt_with_exp(past))).unwrap();
        assert!(session.token_expired());

        let future = Utc::now().timestamp() + 3600;
        session.set_token(Some(&jwt_with_exp(future))).unwrap();
        assert!(!session.token_expired());
    }

    #[test]
    fn test_user_keeps_extra_fields() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "alice",
            "email": "alice@example.com",
            "plan": "pro"
        }))
        .unwrap();

        assert_eq!(user.id, "alice");
        assert_eq!(user.username, None);
        assert_eq!(user.extra["plan"], "pro");
    }
}
