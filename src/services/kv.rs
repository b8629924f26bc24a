//! Key-value namespace

use crate::{
    Result,
    client::{RequestOptions, SessionClient, error_for_status},
    errors::ClientError,
    utils::encode_path_segment,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};

/// A stored key with its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvItem {
    pub key: String,
    pub value: String,
}

/// Result of a listing: bare keys, or keys with values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvListing {
    Keys(Vec<String>),
    Items(Vec<KvItem>),
}

/// Per-user key-value storage on the backend
#[async_trait]
pub trait KvService: Send + Sync {
    /// Value stored under `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys matching `pattern`, with values when `return_values` is set
    async fn list(&self, _pattern: &str, _return_values: bool) -> Result<KvListing> {
        Err(ClientError::Unsupported("kv.list"))
    }

    /// Remove every key
    async fn flush(&self) -> Result<()> {
        Err(ClientError::Unsupported("kv.flush"))
    }
}

/// `KvService` over the backend's `/api/kv/{key}` endpoints
#[derive(Debug, Clone)]
pub struct HttpKv {
    client: SessionClient,
}

impl HttpKv {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    fn key_path(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.client.config().endpoints.kv.trim_end_matches('/'),
            encode_path_segment(key)
        )
    }
}

#[async_trait]
impl KvService for HttpKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let response = self
            .client
            .request(&self.key_path(key), RequestOptions::get())
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = error_for_status(response, "Failed to read key").await?;
        Ok(Some(response.text().await?))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let options = RequestOptions::post()
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .text(value);
        let response = self.client.request(&self.key_path(key), options).await?;
        error_for_status(response, "Failed to store key").await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .client
            .request(&self.key_path(key), RequestOptions::delete())
            .await?;
        error_for_status(response, "Failed to delete key").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use mockito::{Matcher, Server};

    fn kv_for(server: &Server) -> HttpKv {
        let client = SessionClient::in_memory(ClientConfig::new(server.url())).unwrap();
        client.set_token(Some("abc")).unwrap();
        HttpKv::new(client)
    }

    #[tokio::test]
    async fn get_returns_value() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/kv/resume-42")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(r#"{"score":85}"#)
            .create_async()
            .await;

        let kv = kv_for(&server);
        let value = kv.get("resume-42").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"score":85}"#));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/kv/missing")
            .with_status(404)
            .create_async()
            .await;

        let kv = kv_for(&server);
        assert_eq!(kv.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_posts_raw_value() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/kv/theme")
            .match_header("content-type", "text/plain")
            .match_body(Matcher::Exact("dark".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let kv = kv_for(&server);
        kv.set("theme", "dark").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_surfaces_server_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/api/kv/theme")
            .with_status(500)
            .create_async()
            .await;

        let kv = kv_for(&server);
        let err = kv.delete("theme").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete key");
    }

    #[tokio::test]
    async fn list_and_flush_are_unsupported() {
        let server = Server::new_async().await;
        let kv = kv_for(&server);

        assert!(matches!(
            kv.list("resume:*", true).await,
            Err(ClientError::Unsupported("kv.list"))
        ));
        assert!(matches!(
            kv.flush().await,
            Err(ClientError::Unsupported("kv.flush"))
        ));
    }
}
