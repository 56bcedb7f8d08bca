//! REST access to the chat server from the client side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};

use crate::ports::ChatView;

/// Errors from chat REST calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Chat not found")]
    NotFound,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Read access to the chat REST endpoints.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /api/chats`
    async fn list_chats(&self) -> Result<Vec<ChatView>, ApiError>;
}

/// [`ChatApi`] over HTTP with a bearer token.
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    token: Secret<String>,
}

impl HttpChatApi {
    /// `base_url` is the server origin, e.g. `http://localhost:8080`.
    pub fn new(
        base_url: impl Into<String>,
        token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.client
            .get(self.url(path))
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ApiError::Network(format!("Connection failed: {}", e))
                } else {
                    ApiError::Network(e.to_string())
                }
            })
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            _ => Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_chats(&self) -> Result<Vec<ChatView>, ApiError> {
        let response = Self::check_status(self.get("/chats").await?).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}
