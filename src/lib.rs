//! # session-client
//!
//! Client-side session layer for the app backend: keeps the access token
//! in local storage, attaches it as a bearer header to every request, and
//! refreshes it once, transparently, when a request comes back 401.
//!
//! ```rust,no_run
//! use session_client::{AppStore, ClientConfig, FileTokenStore, SessionClient};
//! use std::sync::Arc;
//!
//! # async fn run() -> session_client::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileTokenStore::new("session.json"));
//! let client = SessionClient::with_store(config, store)?;
//!
//! client.login("alice@example.com", "hunter2").await?;
//! let user = client.me().await?;
//! println!("signed in as {}", user.id);
//!
//! let app = AppStore::new(client);
//! app.init().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod services;
pub mod session;
pub mod store;
pub mod token_store;
pub mod utils;

pub use client::{RequestBody, RequestOptions, SessionClient};
pub use config::{ClientConfig, ClientConfigBuilder, ClientOptions, Endpoints};
pub use errors::{ClientError, Result};
pub use session::{Session, User};
pub use store::{AppStore, AuthState, StoreState};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use utils::create_http_client;

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get enabled features
pub fn features() -> Vec<&'static str> {
    let mut enabled_features = Vec::new();

    #[cfg(feature = "kv")]
    enabled_features.push("kv");

    #[cfg(feature = "files")]
    enabled_features.push("files");

    #[cfg(feature = "ai")]
    enabled_features.push("ai");

    enabled_features
}
