//! End-to-end tests over real WebSocket connections.
//!
//! The full application router is served on a loopback port and driven with
//! `tokio-tungstenite` clients, both raw sockets and the `ChatClient`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::Secret;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use freelance_chat::adapters::auth::MockSessionValidator;
use freelance_chat::adapters::broadcast::LocalBroadcastBus;
use freelance_chat::adapters::http::{app_router, AppState, ChatAppState};
use freelance_chat::adapters::memory::InMemoryChatStore;
use freelance_chat::adapters::websocket::{RealtimeState, RoomManager, ServerMessage};
use freelance_chat::client::{
    realtime_url, ApiError, ChatApi, ChatClient, ConnectionError, RealtimeConnection,
};
use freelance_chat::domain::chat::Chat;
use freelance_chat::domain::foundation::{ChatId, UserId};
use freelance_chat::ports::{ChatReader, ChatView, SessionValidator};

// =============================================================================
// Test Infrastructure
// =============================================================================

const WAIT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

struct Server {
    addr: SocketAddr,
    store: Arc<InMemoryChatStore>,
    rooms: Arc<RoomManager>,
}

impl Server {
    async fn start() -> Self {
        let store = Arc::new(InMemoryChatStore::new());
        let validator: Arc<dyn SessionValidator> = Arc::new(
            MockSessionValidator::new()
                .with_test_user("token-u1", "u1")
                .with_test_user("token-u2", "u2"),
        );
        let rooms = Arc::new(RoomManager::new());
        let bus = Arc::new(LocalBroadcastBus::new(rooms.clone()));
        let state = AppState {
            chat: ChatAppState {
                chat_reader: store.clone(),
            },
            realtime: RealtimeState::new(rooms.clone(), bus, validator.clone(), store.clone()),
            auth: validator,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = app_router(state, &[]);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, store, rooms }
    }

    fn seed(&self, creator: &str, others: &[&str]) -> ChatId {
        let chat = Chat::create(
            &uid(creator),
            others.iter().map(|o| uid(o)).collect(),
            None,
            false,
        )
        .unwrap();
        let id = *chat.id();
        self.store.seed_chat(chat);
        id
    }

    fn url(&self) -> String {
        realtime_url(&format!("http://{}", self.addr))
    }

    async fn open(&self, token: &str) -> Socket {
        let (socket, _) = connect_async(format!("{}?token={}", self.url(), token))
            .await
            .unwrap();
        socket
    }

    async fn wait_for_connections(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.rooms.connection_count().await != expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {} live connections, found {}",
                expected,
                self.rooms.connection_count().await
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn next_event(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn connected_rooms(socket: &mut Socket) -> HashSet<String> {
    match next_event(socket).await {
        ServerMessage::Connected(ack) => ack.rooms.into_iter().collect(),
        other => panic!("expected connected, got {:?}", other),
    }
}

/// Serves REST reads straight from the store as one user.
struct StoreApi {
    store: Arc<InMemoryChatStore>,
    user: UserId,
}

#[async_trait]
impl ChatApi for StoreApi {
    async fn list_chats(&self) -> Result<Vec<ChatView>, ApiError> {
        self.store
            .list_for_user(&self.user)
            .await
            .map_err(|e| ApiError::Network(e.message))
    }
}

// =============================================================================
// Connection lifecycle
// =============================================================================

#[tokio::test]
async fn connected_ack_lists_exactly_the_users_rooms() {
    let server = Server::start().await;
    let shared = server.seed("u1", &["u2"]);
    server.seed("u2", &["u3"]);

    let mut socket = server.open("token-u1").await;

    let expected: HashSet<String> = ["user:u1".to_string(), format!("chat:{}", shared)]
        .into_iter()
        .collect();
    assert_eq!(connected_rooms(&mut socket).await, expected);
}

#[tokio::test]
async fn message_reaches_both_sockets_and_close_releases_them() {
    let server = Server::start().await;
    let chat_id = server.seed("u1", &["u2"]);

    let mut u1 = server.open("token-u1").await;
    let mut u2 = server.open("token-u2").await;
    connected_rooms(&mut u1).await;
    connected_rooms(&mut u2).await;
    server.wait_for_connections(2).await;

    let frame = json!({"event": "send_message", "data": {"chatId": chat_id.to_string(), "content": "hola"}});
    u1.send(Message::Text(frame.to_string())).await.unwrap();

    for socket in [&mut u1, &mut u2] {
        match next_event(socket).await {
            ServerMessage::ReceiveMessage(m) => {
                assert_eq!(m.chat_id, chat_id);
                assert_eq!(m.content, "hola");
                assert_eq!(m.sender_id, uid("u1"));
            }
            other => panic!("expected receive_message, got {:?}", other),
        }
    }
    assert_eq!(server.store.message_count(), 1);

    u1.close(None).await.unwrap();
    u2.close(None).await.unwrap();
    server.wait_for_connections(0).await;
    assert!(server.rooms.active_rooms().await.is_empty());
}

#[tokio::test]
async fn ping_and_malformed_frames_answer_the_sender() {
    let server = Server::start().await;
    let mut socket = server.open("token-u1").await;
    connected_rooms(&mut socket).await;

    socket
        .send(Message::Text(json!({"event": "ping"}).to_string()))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut socket).await, ServerMessage::Pong(_)));

    socket.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(
        next_event(&mut socket).await,
        ServerMessage::error("Malformed message")
    );
}

#[tokio::test]
async fn handshake_without_valid_token_is_rejected_before_upgrade() {
    let server = Server::start().await;

    for url in [server.url(), format!("{}?token=forged", server.url())] {
        match connect_async(url).await {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status().as_u16(), 401),
            Err(other) => panic!("expected an HTTP rejection, got {:?}", other),
            Ok(_) => panic!("handshake should have been rejected"),
        }
    }
    assert_eq!(server.rooms.connection_count().await, 0);
}

// =============================================================================
// Client connection
// =============================================================================

#[tokio::test]
async fn client_sends_and_receives_over_its_own_connection() {
    let server = Server::start().await;
    let chat_id = server.seed("u1", &["u2"]);

    let client = Arc::new(ChatClient::new(
        uid("u1"),
        Arc::new(StoreApi {
            store: server.store.clone(),
            user: uid("u1"),
        }),
    ));
    assert!(client.load_chats().await);

    let connection = RealtimeConnection::connect(
        client.clone(),
        &server.url(),
        &Secret::new("token-u1".to_string()),
    )
    .await
    .unwrap();
    assert!(client.is_connected());
    server.wait_for_connections(1).await;

    assert!(client.send_message(&chat_id, "desde el cliente"));

    let deadline = tokio::time::Instant::now() + WAIT;
    while client.get_chat(&chat_id).unwrap().messages.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "relayed message never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let chat = client.get_chat(&chat_id).unwrap();
    assert_eq!(chat.messages[0].content, "desde el cliente");
    assert_eq!(chat.last_message.as_ref(), chat.messages.last());

    connection.disconnect().await;
    assert!(!client.is_connected());
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn client_connection_with_bad_token_is_rejected() {
    let server = Server::start().await;
    let client = Arc::new(ChatClient::new(
        uid("u1"),
        Arc::new(StoreApi {
            store: server.store.clone(),
            user: uid("u1"),
        }),
    ));

    let result = RealtimeConnection::connect(
        client.clone(),
        &server.url(),
        &Secret::new("forged".to_string()),
    )
    .await;

    assert!(matches!(result, Err(ConnectionError::Rejected(401))));
    assert!(!client.is_connected());
}
