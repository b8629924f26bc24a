//! Session client: bearer requests with one transparent refresh on 401

use crate::{
    Result,
    config::ClientConfig,
    errors::ClientError,
    session::{Session, User},
    token_store::TokenStore,
    utils::{create_http_client, log_http_request},
};
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Body of an outgoing request
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
    /// Single-file multipart upload
    File {
        field: String,
        file_name: String,
        mime: Option<String>,
        data: Vec<u8>,
    },
}

impl RequestBody {
    fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::File { .. })
    }
}

/// Method, extra headers, query and body of a request.
///
/// Kept whole so the same request can be reissued after a refresh.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Add a header; caller headers override the default content type
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = RequestBody::Text(text.into());
        self
    }

    pub fn bytes(mut self, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(data);
        self
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        self.body = RequestBody::File {
            field: field.into(),
            file_name: file_name.into(),
            mime,
            data,
        };
        self
    }
}

/// Where a logical request stands after its first send
enum FirstAttempt {
    Complete(Response),
    Unauthorized(Response),
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// HTTP client bound to one `Session`.
///
/// Cloning shares the HTTP connection pool, cookie jar, session and
/// refresh lock.
#[derive(Clone)]
pub struct SessionClient {
    config: Arc<ClientConfig>,
    http: Client,
    session: Session,
    refresh_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("api_base", &self.config.api_base)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Create a client for `config` using an existing session
    pub fn new(config: ClientConfig, session: Session) -> Result<Self> {
        config.validate()?;
        let http = create_http_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            http,
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create a client whose token lives in `store` under the configured key
    pub fn with_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let session = Session::new(store, config.storage_key.clone());
        Self::new(config, session)
    }

    /// Create a client with an in-memory token store
    pub fn in_memory(config: ClientConfig) -> Result<Self> {
        let session = Session::in_memory(config.storage_key.clone());
        Self::new(config, session)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read the persisted token
    pub fn get_token(&self) -> Result<Option<String>> {
        self.session.token()
    }

    /// Write or clear the persisted token
    pub fn set_token(&self, token: Option<&str>) -> Result<()> {
        self.session.set_token(token)
    }

    fn build_headers(&self, options: &RequestOptions, token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if !options.body.is_multipart() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Issue one request with the given token. No 401 handling.
    async fn send_once(
        &self,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response> {
        let url = self.config.get_api_url(path);
        let headers = self.build_headers(options, token)?;

        if self.config.options.debug_logging {
            log_http_request(&options.method, &url, &headers);
        }

        let mut request = self
            .http
            .request(options.method.clone(), &url)
            .headers(headers);

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }

        request = match &options.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.body(serde_json::to_vec(value)?),
            RequestBody::Text(text) => request.body(text.clone()),
            RequestBody::Bytes(data) => request.body(data.clone()),
            RequestBody::File {
                field,
                file_name,
                mime,
                data,
            } => {
                let mut part =
                    reqwest::multipart::Part::bytes(data.clone()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    part = part.mime_str(mime)?;
                }
                request.multipart(reqwest::multipart::Form::new().part(field.clone(), part))
            }
        };

        let response = request.send().await?;
        debug!("{} {} -> {}", options.method, path, response.status());
        Ok(response)
    }

    async fn first_attempt(
        &self,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<FirstAttempt> {
        let response = self.send_once(path, options, token).await?;
        if response.status() == StatusCode::UNAUTHORIZED && !self.config.is_refresh_path(path) {
            Ok(FirstAttempt::Unauthorized(response))
        } else {
            Ok(FirstAttempt::Complete(response))
        }
    }

    /// Issue a request with the bearer token attached.
    ///
    /// On a 401 from any path other than the refresh endpoint, one
    /// refresh is attempted. If it succeeds the request is reissued once
    /// with the new token and that response is returned, whatever its
    /// status. If it fails the original 401 response is returned.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Response> {
        let sent_with = self.session.token()?;

        let unauthorized = match self
            .first_attempt(path, &options, sent_with.as_deref())
            .await?
        {
            FirstAttempt::Complete(response) => return Ok(response),
            FirstAttempt::Unauthorized(response) => response,
        };

        debug!("{} returned 401, attempting token refresh", path);
        if !self.refresh_after_unauthorized(sent_with.as_deref()).await {
            return Ok(unauthorized);
        }

        let token = self.session.token()?;
        self.send_once(path, &options, token.as_deref()).await
    }

    /// Single-flight refresh for callers that saw a 401.
    ///
    /// A waiter whose token was already replaced while it queued for the
    /// lock reuses that token instead of refreshing again.
    async fn refresh_after_unauthorized(&self, sent_with: Option<&str>) -> bool {
        let _guard = self.refresh_lock.lock().await;

        match self.session.token() {
            Ok(Some(current)) if Some(current.as_str()) != sent_with => {
                debug!("Token already refreshed by a concurrent request");
                true
            }
            _ => self.refresh().await,
        }
    }

    /// Exchange the session cookie for a new access token.
    ///
    /// Never fails: non-success statuses, transport and decode errors all
    /// report `false`.
    pub async fn refresh(&self) -> bool {
        let url = self.config.get_api_url(&self.config.endpoints.refresh);

        let response = match self.http.post(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                return false;
            }
        };

        if !response.status().is_success() {
            debug!("Token refresh rejected with status {}", response.status());
            return false;
        }

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Token refresh returned an unreadable body: {}", e);
                return false;
            }
        };

        match self.session.rotate_token(&body.access_token) {
            Ok(()) => true,
            Err(e) => {
                warn!("Refreshed token could not be stored: {}", e);
                false
            }
        }
    }

    async fn post_credentials<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
        fallback: &str,
    ) -> Result<serde_json::Value> {
        let url = self.config.get_api_url(path);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(payload)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &error_text, fallback));
        }

        Ok(response.json().await?)
    }

    /// Sign in with email and password.
    ///
    /// Persists `accessToken` from the response and returns the whole body.
    pub async fn login(&self, email: &str, password: &str) -> Result<serde_json::Value> {
        let body = self
            .post_credentials(
                &self.config.endpoints.login,
                &LoginRequest { email, password },
                "Login failed",
            )
            .await?;

        let token = body.get("accessToken").and_then(|t| t.as_str());
        if token.is_none() {
            warn!("Login response carried no accessToken");
        }
        self.session.set_token(token)?;
        Ok(body)
    }

    /// Create an account. The session token is left untouched.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<serde_json::Value> {
        self.post_credentials(
            &self.config.endpoints.register,
            &RegisterRequest {
                email,
                password,
                name,
            },
            "Register failed",
        )
        .await
    }

    /// End the session on the backend, then clear the local token.
    ///
    /// The backend call's outcome is ignored; the token is always cleared.
    pub async fn logout(&self) -> Result<()> {
        let url = self.config.get_api_url(&self.config.endpoints.logout);
        match self.http.post(&url).send().await {
            Ok(response) if !response.status().is_success() => {
                debug!("Logout returned status {}", response.status());
            }
            Ok(_) => {}
            Err(e) => warn!("Logout request failed: {}", e),
        }

        self.session.clear()
    }

    /// Fetch the current identity; this is the session's identity check
    pub async fn me(&self) -> Result<User> {
        let response = self
            .request(&self.config.endpoints.me, RequestOptions::get())
            .await?;

        if !response.status().is_success() {
            self.session.mark_identity_checked(false);
            return Err(ClientError::NotAuthenticated);
        }

        let user: User = response.json().await?;
        self.session.mark_identity_checked(true);
        Ok(user)
    }

    /// `request` followed by a status check and JSON decode
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.request(path, options).await?;
        let response = error_for_status(response, "Request failed").await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-success response into `ClientError::Api`
pub(crate) async fn error_for_status(response: Response, fallback: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let error_text = response.text().await.unwrap_or_default();
    Err(ClientError::from_response(status, &error_text, fallback))
}
