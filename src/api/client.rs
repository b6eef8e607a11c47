//! REST client for the chat server.
//!
//! `ChatApi` is the seam the runtime uses to fetch thread history and
//! directory nodes. `HttpApi` is the reqwest implementation; tests swap in
//! a mock server.

use std::fmt;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;

use super::types::{AuthResponse, DirectoryId, DirectoryNode, Message};

/// Errors from REST calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Connection refused, DNS, timeout.
    Network(String),
    /// The server rejected the bearer token (HTTP 401).
    Unauthorized,
    /// Any other non-success status.
    Api { status: u16, message: String },
    /// The body was not the JSON we expected.
    Parse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ApiError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Everything needed to render a thread when it is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadHistory {
    pub nodes: Vec<DirectoryNode>,
    pub messages: Vec<Message>,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /directory/{id}`: the node itself first, then its children.
    async fn directory(&self, id: DirectoryId) -> Result<Vec<DirectoryNode>, ApiError>;

    /// `GET /thread/{id}`: message history ordered by `created_at` ascending.
    async fn thread(&self, id: DirectoryId) -> Result<Vec<Message>, ApiError>;

    /// Fetches node and history together.
    async fn thread_history(&self, id: DirectoryId) -> Result<ThreadHistory, ApiError> {
        let (nodes, messages) = tokio::try_join!(self.directory(id), self.thread(id))?;
        Ok(ThreadHistory { nodes, messages })
    }
}

/// Bearer-token HTTP client rooted at `{base_url}` (e.g. `http://localhost:3000/api`).
pub struct HttpApi {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        read_json(response).await
    }
}

/// Exchanges a username for a token via `POST {base_url}/login`.
pub async fn login(base_url: &str, username: &str) -> Result<AuthResponse, ApiError> {
    let url = format!("{}/login", base_url.trim_end_matches('/'));
    info!("Logging in as {}", username);

    let response = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "username": username }))
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    read_json(response).await
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        warn!("Request rejected: unauthorized");
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("API error: {} - {}", status.as_u16(), message);
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn directory(&self, id: DirectoryId) -> Result<Vec<DirectoryNode>, ApiError> {
        self.get_json(&format!("/directory/{id}")).await
    }

    async fn thread(&self, id: DirectoryId) -> Result<Vec<Message>, ApiError> {
        let messages: Vec<Message> = self.get_json(&format!("/thread/{id}")).await?;
        debug!("Fetched {} messages for thread {}", messages.len(), id);
        Ok(messages)
    }
}
