//! Integration tests for the WebSocket gateway: upgrade authentication,
//! the ready handshake, conversation-room delivery, typing relay, and the
//! global offline broadcast.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use uuid::Uuid;

use mosaic_db::Database;
use mosaic_server::app;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    base_url: String,
    ws_url: String,
    client: reqwest::Client,
}

async fn spawn_server() -> TestServer {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    let upload_dir = std::env::temp_dir().join(format!("mosaic-gw-test-{}", Uuid::new_v4()));
    let router = app::build_router(db, "dev-secret-change-me".into(), upload_dir);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    TestServer {
        base_url: format!("http://{}", addr),
        ws_url: format!("ws://{}", addr),
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    async fn register(&self, username: &str) -> (String, String) {
        let body: Value = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password123",
                "full_name": format!("{username} Example"),
            }))
            .send()
            .await
            .expect("register response")
            .json()
            .await
            .expect("register json");
        (
            body["token"].as_str().expect("token").to_string(),
            body["user"]["id"].as_str().expect("user id").to_string(),
        )
    }

    async fn create_conversation(&self, token: &str, other_id: &str) -> String {
        let body: Value = self
            .client
            .post(format!("{}/messages/conversations", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "participant_ids": [other_id] }))
            .send()
            .await
            .expect("conversation response")
            .json()
            .await
            .expect("conversation json");
        body["conversation"]["id"].as_str().expect("conversation id").to_string()
    }

    async fn connect(&self, token: &str) -> WsClient {
        let (ws, _) = connect_async(format!("{}/gateway?token={}", self.ws_url, token))
            .await
            .expect("ws connect");
        ws
    }
}

/// Reads frames until the next JSON event, skipping ping/pong noise.
async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("event json");
        }
    }
}

async fn send_command(ws: &mut WsClient, command: Value) {
    ws.send(Message::Text(command.to_string().into()))
        .await
        .expect("send command");
}

#[tokio::test]
async fn upgrade_requires_a_valid_token() {
    let server = spawn_server().await;

    assert!(
        connect_async(format!("{}/gateway", server.ws_url)).await.is_err(),
        "upgrade without token must be rejected"
    );
    assert!(
        connect_async(format!("{}/gateway?token=garbage", server.ws_url))
            .await
            .is_err(),
        "upgrade with a bad token must be rejected"
    );
}

#[tokio::test]
async fn ready_is_sent_first_and_presence_is_persisted() {
    let server = spawn_server().await;
    let (token, user_id) = server.register("ws_ready").await;

    let mut ws = server.connect(&token).await;
    let ready = next_event(&mut ws).await;
    assert_eq!(ready["type"], "ready");
    assert_eq!(ready["data"]["user_id"], user_id.as_str());
    assert_eq!(ready["data"]["username"], "ws_ready");

    // The connect persisted the online flag, visible over REST.
    let profile: Value = server
        .client
        .get(format!("{}/users/{}", server.base_url, user_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["is_online"], true);
}

#[tokio::test]
async fn messages_reach_joined_room_members() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("room_alice").await;
    let (token_b, id_b) = server.register("room_bob").await;
    let conversation_id = server.create_conversation(&token_a, &id_b).await;

    let mut ws_a = server.connect(&token_a).await;
    let mut ws_b = server.connect(&token_b).await;
    next_event(&mut ws_a).await; // ready
    next_event(&mut ws_b).await; // ready

    let join = json!({ "type": "join_conversation", "data": { "conversation_id": conversation_id } });
    send_command(&mut ws_a, join.clone()).await;
    send_command(&mut ws_b, join).await;

    // Let the join commands land before publishing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let sent = server
        .client
        .post(format!(
            "{}/messages/conversations/{}/messages",
            server.base_url, conversation_id
        ))
        .bearer_auth(&token_a)
        .json(&json!({ "content": "hello room" }))
        .send()
        .await
        .unwrap();
    assert_eq!(sent.status(), 201);

    let event = next_event(&mut ws_b).await;
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["data"]["message"]["content"], "hello room");
    assert_eq!(
        event["data"]["message"]["conversation_id"],
        conversation_id.as_str()
    );
    assert_eq!(event["data"]["message"]["sender"]["username"], "room_alice");

    // The sender is present in the room too and receives the echo.
    let echo = next_event(&mut ws_a).await;
    assert_eq!(echo["type"], "new_message");
}

#[tokio::test]
async fn typing_is_relayed_to_the_room_but_not_the_sender() {
    let server = spawn_server().await;
    let (token_a, id_a) = server.register("typing_alice").await;
    let (token_b, id_b) = server.register("typing_bob").await;
    let conversation_id = server.create_conversation(&token_a, &id_b).await;

    let mut ws_a = server.connect(&token_a).await;
    let mut ws_b = server.connect(&token_b).await;
    next_event(&mut ws_a).await;
    next_event(&mut ws_b).await;

    let join = json!({ "type": "join_conversation", "data": { "conversation_id": conversation_id } });
    send_command(&mut ws_a, join.clone()).await;
    send_command(&mut ws_b, join).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    send_command(
        &mut ws_a,
        json!({ "type": "typing", "data": { "conversation_id": conversation_id } }),
    )
    .await;

    let event = next_event(&mut ws_b).await;
    assert_eq!(event["type"], "user_typing");
    assert_eq!(event["data"]["user_id"], id_a.as_str());

    send_command(
        &mut ws_a,
        json!({ "type": "stop_typing", "data": { "conversation_id": conversation_id } }),
    )
    .await;
    let event = next_event(&mut ws_b).await;
    assert_eq!(event["type"], "user_stop_typing");

    // The sender never saw an echo of either indicator; the next thing it
    // can receive must come from someone else.
    send_command(
        &mut ws_b,
        json!({ "type": "typing", "data": { "conversation_id": conversation_id } }),
    )
    .await;
    let event = next_event(&mut ws_a).await;
    assert_eq!(event["type"], "user_typing");
    assert_eq!(event["data"]["user_id"], id_b.as_str());
}

#[tokio::test]
async fn read_receipts_reach_the_room() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("receipt_alice").await;
    let (token_b, id_b) = server.register("receipt_bob").await;
    let conversation_id = server.create_conversation(&token_a, &id_b).await;

    let mut ws_b = server.connect(&token_b).await;
    next_event(&mut ws_b).await;
    send_command(
        &mut ws_b,
        json!({ "type": "join_conversation", "data": { "conversation_id": conversation_id } }),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    server
        .client
        .post(format!(
            "{}/messages/conversations/{}/messages",
            server.base_url, conversation_id
        ))
        .bearer_auth(&token_b)
        .json(&json!({ "content": "read me" }))
        .send()
        .await
        .unwrap();
    next_event(&mut ws_b).await; // own new_message echo

    let marked = server
        .client
        .put(format!(
            "{}/messages/conversations/{}/read",
            server.base_url, conversation_id
        ))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(marked.status(), 200);

    let event = next_event(&mut ws_b).await;
    assert_eq!(event["type"], "messages_read");
    assert_eq!(event["data"]["conversation_id"], conversation_id.as_str());
}

#[tokio::test]
async fn disconnect_broadcasts_offline_and_persists_last_seen() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("watcher").await;
    let (token_b, id_b) = server.register("leaver").await;

    let mut ws_a = server.connect(&token_a).await;
    let mut ws_b = server.connect(&token_b).await;
    next_event(&mut ws_a).await;
    next_event(&mut ws_b).await;

    ws_b.close(None).await.expect("close");

    let event = next_event(&mut ws_a).await;
    assert_eq!(event["type"], "user_offline");
    assert_eq!(event["data"]["user_id"], id_b.as_str());

    // Offline flag and last_seen landed in the store.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let profile: Value = server
        .client
        .get(format!("{}/users/{}", server.base_url, id_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["is_online"], false);
    assert!(profile["last_seen"].is_string());
}
