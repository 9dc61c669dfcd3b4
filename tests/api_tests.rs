use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use lunardb::admission::{AdmissionGate, IdentityResolver};
use lunardb::auth::{ApiKeyManager, CompositeAuthenticator, JwtAuthenticator};
use lunardb::http::{serve_listener, AppState};
use lunardb::ratelimit::ClientRegistry;
use lunardb::store::Store;

const API_KEY: &str = "integration-test-key";
const JWT_SECRET: &str = "integration-test-secret";

struct TestApp {
    base_url: String,
    registry: Arc<ClientRegistry>,
}

async fn spawn_app(rate: f64, burst: u32) -> TestApp {
    let registry = Arc::new(ClientRegistry::new(rate, burst));
    let gate = Arc::new(AdmissionGate::new(
        Arc::clone(&registry),
        Arc::new(Store::new()),
    ));
    let api_keys = Arc::new(ApiKeyManager::with_keys(vec![API_KEY.to_string()]));
    let jwt = JwtAuthenticator::new(JWT_SECRET, Duration::from_secs(3600));
    let state = AppState::new(
        gate,
        Arc::new(CompositeAuthenticator::new(api_keys, Some(jwt))),
        IdentityResolver::new(true),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        serve_listener(listener, state, std::future::pending())
            .await
            .unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        registry,
    }
}

async fn spawn_default_app() -> TestApp {
    spawn_app(100.0, 100).await
}

fn client() -> Client {
    Client::new()
}

async fn set(app: &TestApp, key: &str, value: &str) -> reqwest::Response {
    client()
        .post(format!("{}/api/v1/set", app.base_url))
        .header("X-API-Key", API_KEY)
        .json(&json!({ "key": key, "value": value }))
        .send()
        .await
        .unwrap()
}

async fn get(app: &TestApp, key: &str) -> reqwest::Response {
    client()
        .get(format!("{}/api/v1/get/{}", app.base_url, key))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_root_and_health_are_public() {
    let app = spawn_default_app().await;

    let resp = client().get(&app.base_url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Welcome to LunarDB API");

    let resp = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["keys"], 0);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_credentials() {
    let app = spawn_default_app().await;

    let resp = client()
        .get(format!("{}/api/v1/keys", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client()
        .get(format!("{}/api/v1/keys", app.base_url))
        .header("X-API-Key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid API key");

    // Rejected requests never reach the rate limiter
    assert!(app.registry.is_empty());
}

#[tokio::test]
async fn test_set_get_delete_roundtrip() {
    let app = spawn_default_app().await;

    let resp = set(&app, "planet", "moon").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "OK");

    let resp = get(&app, "planet").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "moon");

    let resp = client()
        .delete(format!("{}/api/v1/del/planet", app.base_url))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = get(&app, "planet").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Key not found");

    // Second delete reports the key as absent
    let resp = client()
        .delete(format!("{}/api/v1/del/planet", app.base_url))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_keys_listing() {
    let app = spawn_default_app().await;

    set(&app, "a", "1").await;
    set(&app, "b", "2").await;
    client()
        .delete(format!("{}/api/v1/del/a", app.base_url))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .unwrap();

    let resp = client()
        .get(format!("{}/api/v1/keys", app.base_url))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["keys"], json!(["b"]));
}

#[tokio::test]
async fn test_set_validation() {
    let app = spawn_default_app().await;

    let resp = set(&app, "", "value").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client()
        .post(format!("{}/api/v1/set", app.base_url))
        .header("X-API-Key", API_KEY)
        .json(&json!({ "key": "only-key" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let app = spawn_app(0.001, 3).await;

    for i in 0..3 {
        let resp = get(&app, "anything").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "request {} should be admitted", i);
    }

    let resp = get(&app, "anything").await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");
}

#[tokio::test]
async fn test_denied_write_does_not_reach_store() {
    let app = spawn_app(0.001, 1).await;

    assert_eq!(set(&app, "k", "first").await.status(), StatusCode::OK);
    assert_eq!(
        set(&app, "k", "second").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let resp = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["keys"], 1);
}

#[tokio::test]
async fn test_forwarded_for_separates_clients() {
    let app = spawn_app(0.001, 1).await;

    let request = |ip: &'static str| {
        client()
            .get(format!("{}/api/v1/keys", app.base_url))
            .header("X-API-Key", API_KEY)
            .header("X-Forwarded-For", ip)
            .send()
    };

    assert_eq!(request("203.0.113.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        request("203.0.113.1").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(request("203.0.113.2").await.unwrap().status(), StatusCode::OK);

    assert!(app.registry.contains("203.0.113.1"));
    assert!(app.registry.contains("203.0.113.2"));
}

#[tokio::test]
async fn test_peer_address_identity() {
    let app = spawn_default_app().await;

    get(&app, "x").await;

    assert!(app.registry.contains("127.0.0.1"));
    assert_eq!(app.registry.len(), 1);
}

#[tokio::test]
async fn test_bearer_token_auth() {
    let app = spawn_default_app().await;
    let token = JwtAuthenticator::new(JWT_SECRET, Duration::from_secs(3600))
        .issue("tester")
        .unwrap();

    let resp = client()
        .get(format!("{}/api/v1/keys", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client()
        .get(format!("{}/api/v1/keys", app.base_url))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_header() {
    let app = spawn_default_app().await;

    let first = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    let second = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();

    let first_id = first.headers()["x-request-id"].to_str().unwrap().to_string();
    let second_id = second.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(first_id.len(), 36);
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn test_concurrent_clients_share_one_bucket() {
    let app = spawn_app(0.001, 5).await;

    let requests = (0..10).map(|_| {
        client()
            .get(format!("{}/api/v1/keys", app.base_url))
            .header("X-API-Key", API_KEY)
            .header("X-Forwarded-For", "198.51.100.9")
            .send()
    });
    let responses = futures::future::join_all(requests).await;

    let admitted = responses
        .into_iter()
        .filter(|r| r.as_ref().unwrap().status() == StatusCode::OK)
        .count();
    assert_eq!(admitted, 5);
    assert_eq!(app.registry.len(), 1);
}
