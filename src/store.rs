//! Observable auth state for UI code

use crate::{
    Result,
    client::SessionClient,
    errors::ClientError,
    session::User,
};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

#[cfg(feature = "ai")]
use crate::services::HttpAi;
#[cfg(feature = "files")]
use crate::services::HttpFiles;
#[cfg(feature = "kv")]
use crate::services::HttpKv;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

/// Snapshot of everything a UI renders from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreState {
    pub is_loading: bool,
    pub error: Option<String>,
    /// Set once `init` has run
    pub ready: bool,
    pub auth: AuthState,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            is_loading: true,
            error: None,
            ready: false,
            auth: AuthState::default(),
        }
    }
}

/// Shared app state plus the operations that drive it.
///
/// Every change is published to subscribers as a full snapshot.
#[derive(Debug, Clone)]
pub struct AppStore {
    client: SessionClient,
    state: Arc<RwLock<StoreState>>,
    updates: broadcast::Sender<StoreState>,
}

impl AppStore {
    pub fn new(client: SessionClient) -> Self {
        let (updates, _) = broadcast::channel(32);
        Self {
            client,
            state: Arc::new(RwLock::new(StoreState::default())),
            updates,
        }
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> broadcast::Receiver<StoreState> {
        self.updates.subscribe()
    }

    /// Current snapshot
    pub async fn state(&self) -> StoreState {
        self.state.read().await.clone()
    }

    pub async fn get_user(&self) -> Option<User> {
        self.state.read().await.auth.user.clone()
    }

    pub async fn clear_error(&self) {
        self.update(|state| state.error = None).await;
    }

    async fn update(&self, f: impl FnOnce(&mut StoreState)) {
        let snapshot = {
            let mut state = self.state.write().await;
            f(&mut state);
            state.clone()
        };
        // No subscribers is fine
        let _ = self.updates.send(snapshot);
    }

    async fn begin(&self) {
        self.update(|state| {
            state.is_loading = true;
            state.error = None;
        })
        .await;
    }

    async fn signed_in(&self, user: User) {
        self.update(|state| {
            state.is_loading = false;
            state.auth = AuthState {
                user: Some(user),
                is_authenticated: true,
            };
        })
        .await;
    }

    async fn signed_out(&self) {
        self.update(|state| {
            state.is_loading = false;
            state.auth = AuthState::default();
        })
        .await;
    }

    async fn fail(&self, message: String) {
        warn!("{}", message);
        self.update(|state| {
            state.is_loading = false;
            state.error = Some(message);
            state.auth = AuthState::default();
        })
        .await;
    }

    /// Mark the store ready and check whether a session already exists
    pub async fn init(&self) -> bool {
        self.update(|state| state.ready = true).await;
        self.check_auth_status().await
    }

    /// Validate the persisted token against the backend.
    ///
    /// A token the backend rejects is cleared.
    pub async fn check_auth_status(&self) -> bool {
        self.begin().await;

        match self.client.get_token() {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.signed_out().await;
                return false;
            }
            Err(e) => {
                self.fail(e.to_string()).await;
                return false;
            }
        }

        match self.client.me().await {
            Ok(user) => {
                self.signed_in(user).await;
                true
            }
            Err(ClientError::NotAuthenticated) => {
                debug!("Persisted token rejected, clearing it");
                if let Err(e) = self.client.set_token(None) {
                    self.fail(e.to_string()).await;
                    return false;
                }
                self.signed_out().await;
                false
            }
            Err(e) => {
                self.fail(e.to_string()).await;
                false
            }
        }
    }

    /// Log in and load the user into the state.
    ///
    /// The user comes from the login body when it has one, otherwise
    /// from the identity endpoint. Failures are also recorded in `error`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        self.begin().await;

        match self.login_user(email, password).await {
            Ok(user) => {
                self.signed_in(user.clone()).await;
                Ok(user)
            }
            Err(e) => {
                self.fail(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn login_user(&self, email: &str, password: &str) -> Result<User> {
        let body = self.client.login(email, password).await?;
        match body
            .get("user")
            .and_then(|u| serde_json::from_value::<User>(u.clone()).ok())
        {
            Some(user) => {
                self.client.session().mark_identity_checked(true);
                Ok(user)
            }
            None => self.client.me().await,
        }
    }

    /// Log out; the local token is cleared even if the backend is unreachable
    pub async fn sign_out(&self) -> Result<()> {
        self.begin().await;
        match self.client.logout().await {
            Ok(()) => {
                self.signed_out().await;
                Ok(())
            }
            Err(e) => {
                self.fail(e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Reload the user from the identity endpoint
    pub async fn refresh_user(&self) -> Result<User> {
        self.begin().await;
        match self.client.me().await {
            Ok(user) => {
                self.signed_in(user.clone()).await;
                Ok(user)
            }
            Err(e) => {
                let message = match &e {
                    ClientError::NotAuthenticated => "Failed to refresh user".to_string(),
                    other => other.to_string(),
                };
                self.fail(message).await;
                Err(e)
            }
        }
    }

    #[cfg(feature = "kv")]
    pub fn kv(&self) -> HttpKv {
        HttpKv::new(self.client.clone())
    }

    #[cfg(feature = "files")]
    pub fn fs(&self) -> HttpFiles {
        HttpFiles::new(self.client.clone())
    }

    #[cfg(feature = "ai")]
    pub fn ai(&self) -> HttpAi {
        HttpAi::new(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use mockito::Server;

    fn store_for(server: &Server) -> AppStore {
        let client = SessionClient::in_memory(ClientConfig::new(server.url())).unwrap();
        AppStore::new(client)
    }

    #[tokio::test]
    async fn initial_state_is_loading() {
        let store = AppStore::new(SessionClient::in_memory(ClientConfig::default()).unwrap());
        let state = store.state().await;
        assert!(state.is_loading);
        assert!(!state.ready);
        assert!(!state.auth.is_authenticated);
    }

    #[tokio::test]
    async fn init_without_token_is_signed_out() {
        let mut server = Server::new_async().await;
        let me = server
            .mock("GET", "/auth/me")
            .expect(0)
            .create_async()
            .await;

        let store = store_for(&server);
        assert!(!store.init().await);

        let state = store.state().await;
        assert!(state.ready);
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert!(!state.auth.is_authenticated);
        me.assert_async().await;
    }

    #[tokio::test]
    async fn check_auth_status_loads_user() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/auth/me")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(r#"{"id":"alice","email":"alice@example.com"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        store.client().set_token(Some("abc")).unwrap();

        assert!(store.check_auth_status().await);
        let user = store.get_user().await.unwrap();
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert!(store.state().await.auth.is_authenticated);
        assert!(store.client().session().is_authenticated());
    }

    #[tokio::test]
    async fn check_auth_status_clears_rejected_token() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/auth/me")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .create_async()
            .await;

        let store = store_for(&server);
        store.client().set_token(Some("stale")).unwrap();

        assert!(!store.check_auth_status().await);
        assert_eq!(store.client().get_token().unwrap(), None);
        let state = store.state().await;
        assert!(state.error.is_none());
        assert!(!state.auth.is_authenticated);
    }

    #[tokio::test]
    async fn sign_in_uses_user_from_login_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(r#"{"accessToken":"abc","user":{"id":"alice"}}"#)
            .create_async()
            .await;
        let me = server
            .mock("GET", "/auth/me")
            .expect(0)
            .create_async()
            .await;

        let store = store_for(&server);
        let mut updates = store.subscribe();

        let user = store.sign_in("alice@example.com", "pw").await.unwrap();
        assert_eq!(user.id, "alice");

        let loading = updates.recv().await.unwrap();
        assert!(loading.is_loading);
        let done = updates.recv().await.unwrap();
        assert!(!done.is_loading);
        assert!(done.auth.is_authenticated);
        assert!(store.client().session().is_authenticated());
        me.assert_async().await;
    }

    #[tokio::test]
    async fn sign_in_falls_back_to_identity_endpoint() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(r#"{"accessToken":"abc"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/auth/me")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(r#"{"id":"alice"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        let user = store.sign_in("alice@example.com", "pw").await.unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(store.get_user().await, Some(user));
    }

    #[tokio::test]
    async fn sign_in_failure_records_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"error":"Invalid email or password"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        assert!(store.sign_in("a@b.c", "wrong").await.is_err());

        let state = store.state().await;
        assert_eq!(state.error.as_deref(), Some("Invalid email or password"));
        assert!(!state.is_loading);
        assert!(!state.auth.is_authenticated);

        store.clear_error().await;
        assert!(store.state().await.error.is_none());
    }

    #[tokio::test]
    async fn sign_out_resets_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(r#"{"accessToken":"abc","user":{"id":"alice"}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/auth/logout")
            .with_status(200)
            .create_async()
            .await;

        let store = store_for(&server);
        store.sign_in("alice@example.com", "pw").await.unwrap();
        store.sign_out().await.unwrap();

        let state = store.state().await;
        assert!(!state.auth.is_authenticated);
        assert!(state.auth.user.is_none());
        assert_eq!(store.client().get_token().unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_user_failure_message() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/auth/me")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .create_async()
            .await;

        let store = store_for(&server);
        assert!(store.refresh_user().await.is_err());
        assert_eq!(
            store.state().await.error.as_deref(),
            Some("Failed to refresh user")
        );
    }
}
