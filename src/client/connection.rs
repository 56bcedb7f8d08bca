//! Realtime connection from a [`ChatClient`] to `/api/realtime`.
//!
//! One task per connection runs a writer (outbound queue → socket) and a
//! reader (socket → [`ChatClient::handle_server_message`]). Whichever ends
//! first ends the connection, and the client's outbound queue is detached.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, Secret};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    http::{header::AUTHORIZATION, HeaderValue},
    Message,
};

use crate::adapters::websocket::{ClientMessage, ServerMessage};

use super::ChatClient;

/// Errors opening a realtime connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid realtime URL: {0}")]
    InvalidUrl(String),

    #[error("Token cannot be sent as a header")]
    InvalidToken,

    /// The server answered the handshake with a non-upgrade status.
    #[error("Handshake rejected with status {0}")]
    Rejected(u16),

    #[error("Connection failed: {0}")]
    Network(String),
}

/// Realtime endpoint for a server origin such as `http://localhost:8080`.
pub fn realtime_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/api/realtime", base)
}

/// A live realtime connection.
pub struct RealtimeConnection {
    client: Arc<ChatClient>,
    task: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Connects to `ws_url` with `token` as bearer credential and attaches
    /// the socket to `client`.
    pub async fn connect(
        client: Arc<ChatClient>,
        ws_url: &str,
        token: &Secret<String>,
    ) -> Result<Self, ConnectionError> {
        let mut request = ws_url
            .into_client_request()
            .map_err(|e| ConnectionError::InvalidUrl(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| ConnectionError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, response) = connect_async(request).await.map_err(|e| {
            tracing::warn!(url = %ws_url, error = %e, "Realtime connection failed");
            handshake_error(e)
        })?;
        tracing::info!(
            user_id = %client.user_id(),
            status = ?response.status(),
            "Realtime connection established"
        );

        let (mut sink, mut stream) = socket.split();
        let (tx, mut outbound) = mpsc::unbounded_channel::<ClientMessage>();
        client.attach_outbound(tx);

        let task_client = client.clone();
        let task = tokio::spawn(async move {
            let writer = async {
                while let Some(frame) = outbound.recv().await {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("Failed to encode client frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        tracing::debug!("Send error, closing connection: {}", e);
                        return;
                    }
                }
                // Outbound queue detached: close politely.
                if let Err(e) = sink.send(Message::Close(None)).await {
                    tracing::debug!("Failed to send close frame: {}", e);
                }
            };

            let reader = async {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(message) => task_client.handle_server_message(message),
                            Err(e) => tracing::warn!("Unreadable server frame: {}", e),
                        },
                        Ok(Message::Close(_)) => {
                            tracing::debug!("Server closed the connection");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "Realtime connection error");
                            break;
                        }
                    }
                }
            };

            tokio::select! {
                _ = writer => {},
                _ = reader => {},
            }

            drop(outbound);
            task_client.detach_closed_outbound();
            tracing::info!(user_id = %task_client.user_id(), "Realtime connection closed");
        });

        Ok(Self { client, task })
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the server or the network ends the connection.
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Realtime connection task failed");
        }
    }

    /// Closes the socket and waits for the connection task to finish.
    pub async fn disconnect(self) {
        self.client.detach_outbound();
        self.closed().await;
    }
}

fn handshake_error(error: tungstenite::Error) -> ConnectionError {
    match error {
        tungstenite::Error::Http(response) => ConnectionError::Rejected(response.status().as_u16()),
        tungstenite::Error::Url(e) => ConnectionError::InvalidUrl(e.to_string()),
        other => ConnectionError::Network(other.to_string()),
    }
}
