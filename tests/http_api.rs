//! Integration tests for the HTTP surface.
//!
//! The full application router is built over the in-memory store and the
//! mock session validator, then driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use freelance_chat::adapters::auth::MockSessionValidator;
use freelance_chat::adapters::broadcast::LocalBroadcastBus;
use freelance_chat::adapters::http::{app_router, AppState, ChatAppState};
use freelance_chat::adapters::memory::InMemoryChatStore;
use freelance_chat::adapters::websocket::{RealtimeState, RoomManager};
use freelance_chat::domain::chat::{Chat, Message, NewMessage, MessageContent};
use freelance_chat::domain::foundation::{AuthError, ChatId, UserId};
use freelance_chat::ports::{ChatRepository, ChatView, SessionValidator};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn router(store: Arc<InMemoryChatStore>) -> Router {
    let validator: Arc<dyn SessionValidator> = Arc::new(
        MockSessionValidator::new()
            .with_test_user("token-u1", "u1")
            .with_test_user("token-u3", "u3"),
    );
    let rooms = Arc::new(RoomManager::new());
    let bus = Arc::new(LocalBroadcastBus::new(rooms.clone()));

    let state = AppState {
        chat: ChatAppState {
            chat_reader: store.clone(),
        },
        realtime: RealtimeState::new(rooms, bus, validator.clone(), store),
        auth: validator,
    };
    app_router(state, &[])
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed_chat_with_messages(store: &InMemoryChatStore, contents: &[&str]) -> (ChatId, Vec<Message>) {
    let chat = Chat::create(&uid("u1"), vec![uid("u2")], None, false).unwrap();
    let chat_id = *chat.id();
    store.seed_chat(chat);

    let mut messages = Vec::new();
    for content in contents {
        let message = store
            .insert_message(&NewMessage {
                chat_id,
                sender_id: uid("u1"),
                content: MessageContent::new(*content).unwrap(),
            })
            .await
            .unwrap();
        store
            .update_last_message(&chat_id, &message.id, &message.created_at)
            .await
            .unwrap();
        messages.push(message);
    }
    (chat_id, messages)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let app = router(Arc::new(InMemoryChatStore::new()));

    let response = app.oneshot(get("/api/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
}

// =============================================================================
// Chat queries
// =============================================================================

#[tokio::test]
async fn list_requires_token() {
    let app = router(Arc::new(InMemoryChatStore::new()));

    let response = app.oneshot(get("/api/chats", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = router(Arc::new(InMemoryChatStore::new()));

    let response = app.oneshot(get("/api/chats", Some("forged"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], AuthError::InvalidToken.code());
}

#[tokio::test]
async fn list_returns_history_in_order() {
    let store = Arc::new(InMemoryChatStore::new());
    let (chat_id, messages) = seed_chat_with_messages(&store, &["one", "two", "three"]).await;
    let app = router(store);

    let response = app.oneshot(get("/api/chats", Some("token-u1"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let chats: Vec<ChatView> = serde_json::from_value(json_body(response).await).unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].id, chat_id);

    let ids: Vec<_> = chats[0].messages.iter().map(|m| m.id).collect();
    let expected: Vec<_> = messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, expected);
    assert_eq!(chats[0].last_message.as_ref().map(|m| m.id), expected.last().copied());
    assert!(chats[0]
        .messages
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn list_is_scoped_to_participant() {
    let store = Arc::new(InMemoryChatStore::new());
    seed_chat_with_messages(&store, &["private"]).await;
    let app = router(store);

    let response = app.oneshot(get("/api/chats", Some("token-u3"))).await.unwrap();

    let chats: Vec<ChatView> = serde_json::from_value(json_body(response).await).unwrap();
    assert!(chats.is_empty());
}

#[tokio::test]
async fn get_chat_for_participant() {
    let store = Arc::new(InMemoryChatStore::new());
    let (chat_id, _) = seed_chat_with_messages(&store, &["hi"]).await;
    let app = router(store);

    let response = app
        .oneshot(get(&format!("/api/chats/{}", chat_id), Some("token-u1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["id"], chat_id.to_string());
    assert_eq!(body["isGroup"], false);
    assert_eq!(body["lastMessage"]["content"], "hi");
}

#[tokio::test]
async fn get_chat_hides_foreign_and_malformed_ids() {
    let store = Arc::new(InMemoryChatStore::new());
    let (chat_id, _) = seed_chat_with_messages(&store, &["hi"]).await;
    let app = router(store);

    for (uri, token) in [
        (format!("/api/chats/{}", chat_id), "token-u3"),
        ("/api/chats/not-a-uuid".to_string(), "token-u1"),
        (format!("/api/chats/{}", ChatId::new()), "token-u1"),
    ] {
        let response = app.clone().oneshot(get(&uri, Some(token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Chat not found or access denied");
    }
}

// =============================================================================
// Realtime handshake
// =============================================================================

#[tokio::test]
async fn realtime_without_token_is_unauthorized() {
    let app = router(Arc::new(InMemoryChatStore::new()));

    let response = app.oneshot(get("/api/realtime", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Token not provided");
}

#[tokio::test]
async fn realtime_with_bad_query_token_is_unauthorized() {
    let app = router(Arc::new(InMemoryChatStore::new()));

    let response = app
        .oneshot(get("/api/realtime?token=forged", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn realtime_with_valid_token_still_needs_upgrade() {
    let app = router(Arc::new(InMemoryChatStore::new()));

    let response = app
        .oneshot(get("/api/realtime?token=token-u1", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
}
