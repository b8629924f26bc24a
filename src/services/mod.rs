//! Backend namespaces exposed next to the auth state: key-value, files, AI.
//!
//! Each namespace is a trait so UI code can swap in another backend. The
//! HTTP implementations go through `SessionClient::request`, so they share
//! its bearer header and refresh-and-retry behaviour. Operations the
//! backend has no endpoint for return `ClientError::Unsupported`.

#[cfg(feature = "ai")]
pub mod ai;
#[cfg(feature = "files")]
pub mod files;
#[cfg(feature = "kv")]
pub mod kv;

#[cfg(feature = "ai")]
pub use ai::{AiResponse, AiService, ChatMessage, ChatRole, HttpAi};
#[cfg(feature = "files")]
pub use files::{FileItem, FileService, HttpFiles};
#[cfg(feature = "kv")]
pub use kv::{HttpKv, KvItem, KvListing, KvService};
