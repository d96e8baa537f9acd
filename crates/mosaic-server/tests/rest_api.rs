//! Integration tests driving the full router over HTTP: auth round trips,
//! social-graph invariants, feed scoping, and messaging authorization.

use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use mosaic_db::Database;
use mosaic_server::app;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
}

async fn spawn_server() -> TestServer {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    let upload_dir =
        std::env::temp_dir().join(format!("mosaic-test-uploads-{}", Uuid::new_v4()));

    // The auth middleware falls back to the same dev secret when the env
    // var is unset, so tests and router agree without touching the env.
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
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    /// Registers a user and returns (token, user_id).
    async fn register(&self, username: &str) -> (String, String) {
        let resp = self
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
            .expect("register response");
        assert_eq!(resp.status(), 201, "register should succeed");

        let body: Value = resp.json().await.expect("register json");
        (
            body["token"].as_str().expect("token").to_string(),
            body["user"]["id"].as_str().expect("user id").to_string(),
        )
    }

    async fn create_post(&self, token: &str, caption: &str) -> String {
        let resp = self
            .client
            .post(format!("{}/posts", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "image_url": "/files/demo.jpg", "caption": caption }))
            .send()
            .await
            .expect("create post response");
        assert_eq!(resp.status(), 201);

        let body: Value = resp.json().await.expect("post json");
        body["post"]["id"].as_str().expect("post id").to_string()
    }

    async fn follow(&self, token: &str, target: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/users/{}/follow", self.base_url, target))
            .bearer_auth(token)
            .send()
            .await
            .expect("follow response")
    }

    async fn feed(&self, token: &str) -> Vec<Value> {
        let body: Value = self
            .client
            .get(format!("{}/posts/feed", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .expect("feed response")
            .json()
            .await
            .expect("feed json");
        body["posts"].as_array().expect("posts array").clone()
    }
}

#[tokio::test]
async fn register_login_me_roundtrip_preserves_identity() {
    let server = spawn_server().await;
    let (_, user_id) = server.register("roundtrip").await;

    let login: Value = server
        .client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": "roundtrip@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login["user"]["id"], user_id.as_str());
    assert_eq!(login["user"]["username"], "roundtrip");

    let me: Value = server
        .client
        .get(format!("{}/auth/me", server.base_url))
        .bearer_auth(login["token"].as_str().unwrap())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(me["user"]["id"], user_id.as_str());
    assert_eq!(me["user"]["username"], "roundtrip");
    assert_eq!(me["user"]["email"], "roundtrip@example.com");
    assert_eq!(me["user"]["full_name"], "roundtrip Example");
    assert!(me["user"].get("password").is_none(), "password must not leak");
}

#[tokio::test]
async fn register_conflicts_name_the_colliding_field() {
    let server = spawn_server().await;
    server.register("taken").await;

    let email_conflict = server
        .client
        .post(format!("{}/auth/register", server.base_url))
        .json(&json!({
            "username": "fresh_name",
            "email": "taken@example.com",
            "password": "password123",
            "full_name": "Fresh",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(email_conflict.status(), 409);
    let body: Value = email_conflict.json().await.unwrap();
    assert_eq!(body["error"], "email already registered");

    let username_conflict = server
        .client
        .post(format!("{}/auth/register", server.base_url))
        .json(&json!({
            "username": "taken",
            "email": "fresh@example.com",
            "password": "password123",
            "full_name": "Fresh",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(username_conflict.status(), 409);
    let body: Value = username_conflict.json().await.unwrap();
    assert_eq!(body["error"], "username already taken");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = spawn_server().await;
    server.register("loginuser").await;

    let wrong_password = server
        .client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": "loginuser@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), 401);

    let unknown_user = server
        .client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": "nobody@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_user.status(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let server = spawn_server().await;

    let resp = server
        .client
        .get(format!("{}/posts/feed", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .get(format!("{}/posts/feed", server.base_url))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn following_twice_yields_conflict_and_one_edge() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("follower").await;
    let (_, id_b) = server.register("followed").await;

    assert_eq!(server.follow(&token_a, &id_b).await.status(), 200);
    assert_eq!(server.follow(&token_a, &id_b).await.status(), 409);

    let profile: Value = server
        .client
        .get(format!("{}/users/{}", server.base_url, id_b))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["followers_count"], 1);
    assert_eq!(profile["is_following"], true);
}

#[tokio::test]
async fn self_follow_and_missing_target_are_rejected() {
    let server = spawn_server().await;
    let (token, user_id) = server.register("selfie").await;

    assert_eq!(server.follow(&token, &user_id).await.status(), 400);
    assert_eq!(
        server.follow(&token, &Uuid::new_v4().to_string()).await.status(),
        404
    );
}

#[tokio::test]
async fn unfollow_without_edge_is_not_found() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("unfollower").await;
    let (_, id_b) = server.register("unfollowed").await;

    let resp = server
        .client
        .delete(format!("{}/users/{}/follow", server.base_url, id_b))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn fresh_post_appears_in_own_feed_with_zeroed_annotations() {
    let server = spawn_server().await;
    let (token, _) = server.register("poster").await;
    server.create_post(&token, "hello").await;

    let posts = server.feed(&token).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["caption"], "hello");
    assert_eq!(posts[0]["likes_count"], 0);
    assert_eq!(posts[0]["comments_count"], 0);
    assert_eq!(posts[0]["is_liked"], false);
}

#[tokio::test]
async fn feed_tracks_follow_and_unfollow() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("reader").await;
    let (token_b, id_b) = server.register("writer").await;

    server.follow(&token_a, &id_b).await;
    server.create_post(&token_b, "from writer").await;

    let posts = server.feed(&token_a).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["user"]["username"], "writer");

    server
        .client
        .delete(format!("{}/users/{}/follow", server.base_url, id_b))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();

    assert!(server.feed(&token_a).await.is_empty());
}

#[tokio::test]
async fn feed_is_newest_first_and_scoped_to_followed_accounts() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("scoped").await;
    let (token_b, id_b) = server.register("inside").await;
    let (token_c, _) = server.register("outside").await;

    server.follow(&token_a, &id_b).await;

    server.create_post(&token_a, "first").await;
    server.create_post(&token_b, "second").await;
    server.create_post(&token_c, "invisible").await;
    server.create_post(&token_a, "third").await;

    let captions: Vec<String> = server
        .feed(&token_a)
        .await
        .iter()
        .map(|p| p["caption"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(captions, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn double_like_conflicts_and_unlike_without_like_is_not_found() {
    let server = spawn_server().await;
    let (token, _) = server.register("liker").await;
    let post_id = server.create_post(&token, "likeable").await;

    let like_url = format!("{}/posts/{}/like", server.base_url, post_id);
    assert_eq!(
        server.client.post(&like_url).bearer_auth(&token).send().await.unwrap().status(),
        200
    );
    assert_eq!(
        server.client.post(&like_url).bearer_auth(&token).send().await.unwrap().status(),
        409
    );

    assert_eq!(
        server.client.delete(&like_url).bearer_auth(&token).send().await.unwrap().status(),
        200
    );
    assert_eq!(
        server.client.delete(&like_url).bearer_auth(&token).send().await.unwrap().status(),
        404
    );
}

#[tokio::test]
async fn only_the_owner_deletes_a_post() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("owner").await;
    let (token_b, _) = server.register("intruder").await;
    let post_id = server.create_post(&token_a, "mine").await;

    let url = format!("{}/posts/{}", server.base_url, post_id);
    assert_eq!(
        server.client.delete(&url).bearer_auth(&token_b).send().await.unwrap().status(),
        403
    );
    assert_eq!(
        server.client.delete(&url).bearer_auth(&token_a).send().await.unwrap().status(),
        200
    );
    assert_eq!(
        server.client.delete(&url).bearer_auth(&token_a).send().await.unwrap().status(),
        404
    );
}

#[tokio::test]
async fn comments_require_content_and_increment_the_count() {
    let server = spawn_server().await;
    let (token, _) = server.register("commenter").await;
    let post_id = server.create_post(&token, "discuss").await;

    let url = format!("{}/posts/{}/comments", server.base_url, post_id);
    let empty = server
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    let created = server
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&json!({ "content": "great shot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["comment"]["content"], "great shot");

    let posts = server.feed(&token).await;
    assert_eq!(posts[0]["comments_count"], 1);

    // Single-post view embeds the comment.
    let detail: Value = server
        .client
        .get(format!("{}/posts/{}", server.base_url, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["post"]["comments"][0]["content"], "great shot");
}

#[tokio::test]
async fn search_matches_substrings_case_insensitively() {
    let server = spawn_server().await;
    let (token, _) = server.register("searcher").await;
    server.register("amelia_rose").await;
    server.register("rosemary").await;
    server.register("unrelated").await;

    let body: Value = server
        .client
        .get(format!("{}/users/search?q=ROSE", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let usernames: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(usernames, vec!["amelia_rose", "rosemary"]);

    let missing_q = server
        .client
        .get(format!("{}/users/search", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing_q.status(), 400);
}

#[tokio::test]
async fn direct_conversations_are_reused() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("initiator").await;
    let (_, id_b) = server.register("other_party").await;

    let url = format!("{}/messages/conversations", server.base_url);
    let first = server
        .client
        .post(&url)
        .bearer_auth(&token_a)
        .json(&json!({ "participant_ids": [id_b] }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);
    let first_body: Value = first.json().await.unwrap();
    let conversation_id = first_body["conversation"]["id"].as_str().unwrap().to_string();

    let second = server
        .client
        .post(&url)
        .bearer_auth(&token_a)
        .json(&json!({ "participant_ids": [id_b] }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);
    let second_body: Value = second.json().await.unwrap();
    assert_eq!(second_body["conversation"]["id"], conversation_id.as_str());
}

#[tokio::test]
async fn non_participants_cannot_send_or_read() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("member_one").await;
    let (_, id_b) = server.register("member_two").await;
    let (token_c, _) = server.register("outsider").await;

    let created: Value = server
        .client
        .post(format!("{}/messages/conversations", server.base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "participant_ids": [id_b] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = created["conversation"]["id"].as_str().unwrap();

    let messages_url = format!(
        "{}/messages/conversations/{}/messages",
        server.base_url, conversation_id
    );

    let send = server
        .client
        .post(&messages_url)
        .bearer_auth(&token_c)
        .json(&json!({ "content": "let me in" }))
        .send()
        .await
        .unwrap();
    assert_eq!(send.status(), 403);

    let read = server
        .client
        .get(&messages_url)
        .bearer_auth(&token_c)
        .send()
        .await
        .unwrap();
    assert_eq!(read.status(), 403);
}

#[tokio::test]
async fn unread_counts_and_mark_read_only_touch_the_counterpart() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("alice_reader").await;
    let (token_b, id_b) = server.register("bob_sender").await;

    let created: Value = server
        .client
        .post(format!("{}/messages/conversations", server.base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "participant_ids": [id_b] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = created["conversation"]["id"].as_str().unwrap().to_string();

    let messages_url = format!(
        "{}/messages/conversations/{}/messages",
        server.base_url, conversation_id
    );
    for content in ["hey", "you there?"] {
        let resp = server
            .client
            .post(&messages_url)
            .bearer_auth(&token_b)
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let conversations = |token: String| {
        let client = server.client.clone();
        let url = format!("{}/messages/conversations", server.base_url);
        async move {
            client
                .get(url)
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        }
    };

    let for_a = conversations(token_a.clone()).await;
    assert_eq!(for_a["conversations"][0]["unread_count"], 2);
    assert_eq!(
        for_a["conversations"][0]["last_message"]["content"],
        "you there?"
    );

    // The sender has no unread messages of their own.
    let for_b = conversations(token_b.clone()).await;
    assert_eq!(for_b["conversations"][0]["unread_count"], 0);

    let read = server
        .client
        .put(format!(
            "{}/messages/conversations/{}/read",
            server.base_url, conversation_id
        ))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(read.status(), 200);

    let for_a = conversations(token_a.clone()).await;
    assert_eq!(for_a["conversations"][0]["unread_count"], 0);
    let for_b = conversations(token_b.clone()).await;
    assert_eq!(for_b["conversations"][0]["unread_count"], 0);
}

#[tokio::test]
async fn messages_are_returned_oldest_first() {
    let server = spawn_server().await;
    let (token_a, _) = server.register("chronicle").await;
    let (_, id_b) = server.register("listener").await;

    let created: Value = server
        .client
        .post(format!("{}/messages/conversations", server.base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "participant_ids": [id_b] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = created["conversation"]["id"].as_str().unwrap();

    let messages_url = format!(
        "{}/messages/conversations/{}/messages",
        server.base_url, conversation_id
    );
    for content in ["one", "two", "three"] {
        server
            .client
            .post(&messages_url)
            .bearer_auth(&token_a)
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap();
    }

    let page: Value = server
        .client
        .get(&messages_url)
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let contents: Vec<&str> = page["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn upload_roundtrip_returns_the_stored_bytes() {
    let server = spawn_server().await;
    let (token, _) = server.register("uploader").await;

    let payload = b"\x89PNG fake image bytes".to_vec();
    let uploaded: Value = server
        .client
        .post(format!("{}/files", server.base_url))
        .bearer_auth(&token)
        .body(payload.clone())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let url = uploaded["url"].as_str().unwrap();

    let downloaded = server
        .client
        .get(format!("{}{}", server.base_url, url))
        .send()
        .await
        .unwrap();
    assert_eq!(downloaded.status(), 200);
    assert_eq!(downloaded.bytes().await.unwrap().to_vec(), payload);

    let empty = server
        .client
        .post(format!("{}/files", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn profile_update_rejects_taken_usernames() {
    let server = spawn_server().await;
    let (token, _) = server.register("renamer").await;
    server.register("occupied").await;

    let url = format!("{}/users/profile", server.base_url);
    let conflict = server
        .client
        .put(&url)
        .bearer_auth(&token)
        .json(&json!({ "username": "occupied" }))
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), 409);

    let updated: Value = server
        .client
        .put(&url)
        .bearer_auth(&token)
        .json(&json!({ "bio": "new bio", "full_name": "Renamed Person" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["user"]["bio"], "new bio");
    assert_eq!(updated["user"]["full_name"], "Renamed Person");
    assert_eq!(updated["user"]["username"], "renamer");
}
