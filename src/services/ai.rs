//! AI namespace

use crate::{
    Result,
    client::{RequestOptions, SessionClient, error_for_status},
    errors::ClientError,
};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: serde_json::Value,
}

/// Loosely typed AI reply; unknown fields are kept in `extra`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AiResponse {
    /// Text of the reply: `message.content`, a string `message`, or `text`
    pub fn content(&self) -> Option<&str> {
        match &self.message {
            Some(serde_json::Value::String(s)) => Some(s.as_str()),
            Some(message) => message
                .get("content")
                .and_then(|c| c.as_str())
                .or(self.text.as_deref()),
            None => self.text.as_deref(),
        }
    }

    /// `content()` parsed as JSON, for replies that carry structured data
    pub fn content_json(&self) -> Result<serde_json::Value> {
        let content = self
            .content()
            .ok_or_else(|| ClientError::Api {
                status: 200,
                message: "AI response has no content".to_string(),
            })?;
        Ok(serde_json::from_str(content)?)
    }
}

/// AI features offered by the backend
#[async_trait]
pub trait AiService: Send + Sync {
    /// Feedback on the uploaded file at `path`, steered by `instructions`
    async fn feedback(&self, path: &str, instructions: &str) -> Result<AiResponse>;

    async fn chat(&self, _messages: &[ChatMessage], _model: Option<&str>) -> Result<AiResponse> {
        Err(ClientError::Unsupported("ai.chat"))
    }

    async fn img2txt(&self, _image: Vec<u8>) -> Result<String> {
        Err(ClientError::Unsupported("ai.img2txt"))
    }
}

/// `AiService` over `/api/ai`
#[derive(Debug, Clone)]
pub struct HttpAi {
    client: SessionClient,
}

impl HttpAi {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AiService for HttpAi {
    async fn feedback(&self, path: &str, instructions: &str) -> Result<AiResponse> {
        let options = RequestOptions::post()
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .query("path", path)
            .text(instructions);
        let response = self
            .client
            .request(&self.client.config().endpoints.ai_feedback, options)
            .await?;
        let response = error_for_status(response, "Failed to get feedback").await?;
        Ok(response.json().await?)
    }
}
