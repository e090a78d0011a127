//! HTTP API integration tests
//! Drives the real router over a loopback socket with reqwest
//!
//! Each test binds its own ephemeral port, so they can run in parallel.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use taskd::api::{serve, AppState, SharedState};
use taskd::config::{AuthConfig, Config, StorageBackend};
use taskd::store::{MemoryStore, UserStore};
use tokio::net::TcpListener;

const SECRET: &str = "api-test-secret-api-test-secret-api-test";

struct TestServer {
    base: String,
    state: SharedState,
    store: MemoryStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start the API on 127.0.0.1:0 backed by a fresh in-memory store
async fn start_test_server() -> TestServer {
    let mut config = Config::default();
    config.auth = AuthConfig::with_secret(SECRET);
    config.auth.bcrypt_cost = 4;
    config.storage.backend = StorageBackend::Memory;

    let store = MemoryStore::new();
    let state = AppState::new(config, Arc::new(store.clone())).expect("Failed to build state");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");

    let served = state.clone();
    let handle = tokio::spawn(async move {
        let _ = serve(listener, served).await;
    });

    TestServer {
        base: format!("http://{}", addr),
        state,
        store,
        handle,
    }
}

async fn register(client: &reqwest::Client, server: &TestServer, name: &str) -> (String, String) {
    let response = client
        .post(server.url("/user/register"))
        .json(&json!({
            "userName": name,
            "email": format!("{}@x.com", name),
            "password": "Secret123!",
        }))
        .send()
        .await
        .expect("Register request failed");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn login(client: &reqwest::Client, server: &TestServer, body: Value) -> reqwest::Response {
    client
        .post(server.url("/user/login"))
        .json(&body)
        .send()
        .await
        .expect("Login request failed")
}

async fn get_me(client: &reqwest::Client, server: &TestServer, token: &str) -> reqwest::Response {
    client
        .get(server.url("/user/me"))
        .bearer_auth(token)
        .send()
        .await
        .expect("Profile request failed")
}

async fn assert_rejected(response: reqwest::Response) {
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Please authenticate." }));
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/api/health")).send().await.unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let index = client.get(server.url("/user")).send().await.unwrap();
    assert_eq!(index.text().await.unwrap(), "User route is working");
}

#[tokio::test]
async fn test_register_login_profile_logout_flow() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let (user_id, _) = register(&client, &server, "alice").await;

    let response = login(
        &client,
        &server,
        json!({ "userName": "alice", "password": "Secret123!" }),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let response = get_me(&client, &server, &token).await;
    assert_eq!(response.status(), 200);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["id"], user_id.as_str());
    assert_eq!(profile["userName"], "alice");
    assert_eq!(profile["email"], "alice@x.com");
    let fields = profile.as_object().unwrap();
    for secret in ["password", "passwordHash", "password_hash", "tokens"] {
        assert!(!fields.contains_key(secret), "profile leaked {}", secret);
    }

    let response = client
        .post(server.url("/user/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert_rejected(get_me(&client, &server, &token).await).await;
}

#[tokio::test]
async fn test_login_by_email() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    register(&client, &server, "alice").await;

    let response = login(
        &client,
        &server,
        json!({ "email": "ALICE@x.com", "password": "Secret123!" }),
    )
    .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    register(&client, &server, "alice").await;

    let attempts = [
        json!({ "userName": "alice", "password": "wrong-password" }),
        json!({ "userName": "mallory", "password": "Secret123!" }),
        json!({ "password": "Secret123!" }),
    ];
    for attempt in attempts {
        let response = login(&client, &server, attempt).await;
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Unable to login" }));
    }
}

#[tokio::test]
async fn test_missing_and_malformed_headers_are_rejected() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/user/me")).send().await.unwrap();
    assert_rejected(response).await;

    for header in ["Bearer", "Bearer not.a.jwt", "Basic YWxpY2U6c2VjcmV0", "garbage"] {
        let response = client
            .get(server.url("/user/me"))
            .header("Authorization", header)
            .send()
            .await
            .unwrap();
        assert_rejected(response).await;
    }
}

#[tokio::test]
async fn test_token_without_prefix_is_accepted() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (_, token) = register(&client, &server, "alice").await;

    let response = client
        .get(server.url("/user/me"))
        .header("Authorization", token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_expired_token_is_rejected_and_pruned() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (user_id, _) = register(&client, &server, "alice").await;

    let mut entry = server
        .state
        .accounts
        .signer()
        .issue(&user_id, Utc::now())
        .unwrap();
    entry.expires_at = Utc::now() - Duration::seconds(1);
    let expired = entry.token.clone();
    let mut doc = server.store.find_by_id(&user_id).await.unwrap().unwrap();
    doc.tokens.insert(entry);
    server.store.save(&doc).await.unwrap();

    assert_rejected(get_me(&client, &server, &expired).await).await;

    let doc = server.store.find_by_id(&user_id).await.unwrap().unwrap();
    assert!(!doc.tokens.contains(&expired));
    assert_eq!(doc.tokens.len(), 1);
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (_, first) = register(&client, &server, "alice").await;
    let body: Value = login(
        &client,
        &server,
        json!({ "userName": "alice", "password": "Secret123!" }),
    )
    .await
    .json()
    .await
    .unwrap();
    let second = body["token"].as_str().unwrap().to_string();

    let response = client
        .post(server.url("/user/logoutAll"))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert_rejected(get_me(&client, &server, &first).await).await;
    assert_rejected(get_me(&client, &server, &second).await).await;
}

#[tokio::test]
async fn test_refresh_replaces_token() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (_, token) = register(&client, &server, "alice").await;

    let response = client
        .post(server.url("/user/refresh"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let fresh = body["token"].as_str().unwrap();

    assert_eq!(get_me(&client, &server, fresh).await.status(), 200);
    assert_rejected(get_me(&client, &server, &token).await).await;
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    register(&client, &server, "alice").await;

    let response = client
        .post(server.url("/user/register"))
        .json(&json!({
            "userName": "Alice",
            "email": "other@x.com",
            "password": "Secret123!",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "User name already in use");
}

#[tokio::test]
async fn test_register_validation() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let cases = [
        json!({ "userName": "bob", "email": "not-an-email", "password": "Secret123!" }),
        json!({ "userName": "bob", "email": "bob@x.com", "password": "short" }),
        json!({ "userName": "   ", "email": "bob@x.com", "password": "Secret123!" }),
        json!({ "email": "bob@x.com", "password": "Secret123!" }),
    ];
    for case in cases {
        let response = client
            .post(server.url("/user/register"))
            .json(&case)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "accepted {}", case);
    }
    assert!(server.store.is_empty().await);
}

#[tokio::test]
async fn test_profile_update() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register(&client, &server, "alice").await;
    let before = server.store.find_by_id(&user_id).await.unwrap().unwrap();

    let response = client
        .patch(server.url("/user/me"))
        .bearer_auth(&token)
        .json(&json!({ "email": "alice@new.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "alice@new.com");

    let after = server.store.find_by_id(&user_id).await.unwrap().unwrap();
    assert_eq!(after.password_hash, before.password_hash);
    assert!(after.tokens.contains(&token));

    let response = client
        .patch(server.url("/user/me"))
        .bearer_auth(&token)
        .json(&json!({ "isAdmin": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid updates!");
}

#[tokio::test]
async fn test_delete_me_invalidates_token() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register(&client, &server, "alice").await;

    let response = client
        .delete(server.url("/user/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(server.store.find_by_id(&user_id).await.unwrap().is_none());

    assert_rejected(get_me(&client, &server, &token).await).await;
}

#[tokio::test]
async fn test_id_routes_enforce_ownership() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (alice_id, alice_token) = register(&client, &server, "alice").await;
    let (bob_id, _) = register(&client, &server, "bob").await;

    // Someone else's account
    let response = client
        .put(server.url(&format!("/user/{}", bob_id)))
        .bearer_auth(&alice_token)
        .json(&json!({ "email": "stolen@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .delete(server.url(&format!("/user/{}", bob_id)))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    assert!(server.store.find_by_id(&bob_id).await.unwrap().is_some());

    // No such account
    let missing = uuid::Uuid::new_v4().to_string();
    let response = client
        .put(server.url(&format!("/user/{}", missing)))
        .bearer_auth(&alice_token)
        .json(&json!({ "email": "ghost@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Own account
    let response = client
        .put(server.url(&format!("/user/{}", alice_id)))
        .bearer_auth(&alice_token)
        .json(&json!({ "email": "alice@new.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .delete(server.url(&format!("/user/{}", alice_id)))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(server.store.find_by_id(&alice_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_id_routes_require_authentication() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (bob_id, _) = register(&client, &server, "bob").await;

    let response = client
        .delete(server.url(&format!("/user/{}", bob_id)))
        .send()
        .await
        .unwrap();
    assert_rejected(response).await;
    assert!(server.store.find_by_id(&bob_id).await.unwrap().is_some());
}
