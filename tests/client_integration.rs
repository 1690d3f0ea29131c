//! Integration tests for the admin client and keepalive.
//!
//! Each test runs an in-process axum server standing in for the admin API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use admin_console::Error;
use admin_console::auth::{MemoryTokenStore, TokenClaims, TokenPolicy, TokenStore};
use admin_console::client::AdminClient;
use admin_console::console::Shell;
use admin_console::history::{Direction, MessageDownload, flatten};
use admin_console::keepalive::{Keepalive, KeepaliveState, TickOutcome};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};

// =============================================================================
// Mock admin server
// =============================================================================

#[derive(Default)]
struct MockAdmin {
    /// Tokens handed out by `auth/refresh`, in order; the last one repeats.
    refresh_tokens: Mutex<Vec<String>>,
    refresh_status: Mutex<Option<StatusCode>>,
    refresh_calls: AtomicUsize,
    logout_status: Mutex<Option<StatusCode>>,
    profile_status: Mutex<Option<StatusCode>>,
    licensing: Mutex<Value>,
    last_bearer: Mutex<Option<String>>,
}

type Shared = Arc<MockAdmin>;

fn remember_bearer(state: &MockAdmin, headers: &HeaderMap) {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);
    *state.last_bearer.lock().unwrap() = bearer;
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != "hunter2" {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    Json(json!({ "payload": { "jwt": jwt(120) } })).into_response()
}

async fn refresh(State(state): State<Shared>, headers: HeaderMap) -> Response {
    remember_bearer(&state, &headers);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = *state.refresh_status.lock().unwrap() {
        return (status, "refresh unavailable").into_response();
    }

    let mut tokens = state.refresh_tokens.lock().unwrap();
    let token = if tokens.len() > 1 {
        tokens.remove(0)
    } else {
        tokens.first().cloned().unwrap_or_default()
    };
    Json(json!({ "payload": { "newToken": token } })).into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    remember_bearer(&state, &headers);
    match *state.logout_status.lock().unwrap() {
        Some(status) => (status, "logout failed").into_response(),
        None => StatusCode::OK.into_response(),
    }
}

async fn messages(Path(conversation): Path<String>) -> Json<Value> {
    Json(json!([
        {
            "userMessage": message(&format!("{conversation}-u1"), "incoming", 0),
            "botMessages": [
                message(&format!("{conversation}-b1"), "outgoing", 1),
                message(&format!("{conversation}-b2"), "outgoing", 2)
            ]
        },
        {
            "userMessage": message(&format!("{conversation}-u2"), "incoming", 3),
            "botMessages": []
        }
    ]))
}

async fn profile(State(state): State<Shared>) -> Response {
    if let Some(status) = *state.profile_status.lock().unwrap() {
        return (status, "no profile").into_response();
    }
    Json(json!({ "payload": { "email": "admin@example.com", "isSuperAdmin": true } }))
        .into_response()
}

async fn licensing(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "payload": state.licensing.lock().unwrap().clone() }))
}

fn message(id: &str, direction: &str, second: u32) -> Value {
    json!({
        "id": id,
        "direction": direction,
        "type": "text",
        "payload": { "type": "text", "text": id },
        "sentOn": format!("2024-05-01T12:00:0{second}Z")
    })
}

fn jwt(expires_in_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        sub: Some("admin@example.com".to_string()),
        iat: Some(now),
        exp: Some(now + expires_in_secs),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server")).unwrap()
}

async fn spawn_admin(state: Shared) -> String {
    let app = Router::new()
        .route("/api/v1/auth/login/basic/default", post(login))
        .route("/api/v1/auth/refresh", get(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me/profile", get(profile))
        .route("/api/v1/admin/license/status", get(licensing))
        .route("/api/v1/mod/history/messages/{id}", get(messages))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v1/")
}

/// Store whose tokens are always inside the refresh window.
fn eager_store() -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::new(TokenPolicy {
        refresh_window: Duration::from_secs(3600),
        token_lifetime: Duration::from_secs(60),
    }))
}

async fn setup(state: Shared) -> (AdminClient, Arc<MemoryTokenStore>) {
    let base_url = spawn_admin(state).await;
    let store = eager_store();
    let client = AdminClient::new(base_url, store.clone()).unwrap();
    (client, store)
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_login_stores_jwt_with_expiry() {
    let (client, store) = setup(Arc::new(MockAdmin::default())).await;

    client
        .auth()
        .login_basic("admin@example.com", "hunter2")
        .await
        .unwrap();

    let stored = store.get_token(false).unwrap().unwrap();
    let remaining = stored.expires_at - chrono::Utc::now();
    assert!(remaining.num_seconds() > 60 && remaining.num_seconds() <= 120);
}

#[tokio::test]
async fn test_login_rejected_leaves_store_empty() {
    let (client, store) = setup(Arc::new(MockAdmin::default())).await;

    let err = client
        .auth()
        .login_basic("admin@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 401, .. }));
    assert!(store.get_token(false).unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_sends_bearer_token() {
    let state = Arc::new(MockAdmin::default());
    *state.refresh_tokens.lock().unwrap() = vec!["renewed".to_string()];
    let (client, store) = setup(state.clone()).await;
    store.set_token("current").unwrap();

    let token = client.auth().refresh().await.unwrap();

    assert_eq!(token, "renewed");
    assert_eq!(state.last_bearer.lock().unwrap().as_deref(), Some("current"));
    // Refreshing alone does not touch the store.
    assert_eq!(store.get_token(false).unwrap().unwrap().token, "current");
}

#[tokio::test]
async fn test_logout_clears_token_even_when_server_fails() {
    let state = Arc::new(MockAdmin::default());
    *state.logout_status.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
    let (client, store) = setup(state.clone()).await;
    store.set_token("current").unwrap();

    let result = client.auth().logout().await;

    assert!(matches!(result, Err(Error::Api { status: 500, .. })));
    assert_eq!(state.last_bearer.lock().unwrap().as_deref(), Some("current"));
    assert!(store.get_token(false).unwrap().is_none());
}

// =============================================================================
// Keepalive against the server
// =============================================================================

#[tokio::test]
async fn test_tick_swaps_in_new_token() {
    let state = Arc::new(MockAdmin::default());
    *state.refresh_tokens.lock().unwrap() = vec!["renewed".to_string()];
    let (client, store) = setup(state.clone()).await;
    store.set_token("current").unwrap();

    let mut keepalive = Keepalive::new(store.clone(), Arc::new(client));

    assert_eq!(keepalive.tick().await, TickOutcome::Refreshed);
    assert_eq!(store.get_token(false).unwrap().unwrap().token, "renewed");
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tick_skips_network_when_not_due() {
    let state = Arc::new(MockAdmin::default());
    let base_url = spawn_admin(state.clone()).await;
    let store = Arc::new(MemoryTokenStore::new(TokenPolicy {
        refresh_window: Duration::from_secs(60),
        token_lifetime: Duration::from_secs(3600),
    }));
    store.set_token("fresh").unwrap();
    let client = AdminClient::new(base_url, store.clone()).unwrap();

    let mut keepalive = Keepalive::new(store, Arc::new(client));

    assert_eq!(keepalive.tick().await, TickOutcome::NotDue);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tick_survives_server_error() {
    let state = Arc::new(MockAdmin::default());
    *state.refresh_status.lock().unwrap() = Some(StatusCode::BAD_GATEWAY);
    let (client, store) = setup(state.clone()).await;
    store.set_token("current").unwrap();

    let mut keepalive = Keepalive::new(store.clone(), Arc::new(client));

    assert_eq!(keepalive.tick().await, TickOutcome::Failed);
    assert_eq!(keepalive.state(), KeepaliveState::Idle);
    assert_eq!(store.get_token(false).unwrap().unwrap().token, "current");
}

#[tokio::test]
async fn test_timer_refreshes_then_disarms() {
    let state = Arc::new(MockAdmin::default());
    // First refresh yields a new token, every later one repeats it.
    *state.refresh_tokens.lock().unwrap() = vec!["stable".to_string()];
    let (client, store) = setup(state.clone()).await;
    store.set_token("initial").unwrap();

    let handle = Keepalive::new(store.clone(), Arc::new(client)).spawn(Duration::from_millis(50));

    let final_state = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("keepalive should disarm on its own");

    assert_eq!(final_state, KeepaliveState::Disarmed);
    assert_eq!(store.get_token(false).unwrap().unwrap().token, "stable");
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 2);

    // No further calls once disarmed.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// History export
// =============================================================================

#[tokio::test]
async fn test_fetch_and_export_history() {
    let (client, store) = setup(Arc::new(MockAdmin::default())).await;
    store.set_token("current").unwrap();

    let exchanges = client.history().messages("conv-7").await.unwrap();
    assert_eq!(exchanges.len(), 2);

    let flat = flatten(&exchanges);
    let ids: Vec<&str> = flat.iter().filter_map(|m| m.id()).collect();
    assert_eq!(
        ids,
        vec!["conv-7-u1", "conv-7-b1", "conv-7-b2", "conv-7-u2"]
    );
    assert_eq!(flat[0].direction(), Some(Direction::Incoming));

    let dir = tempfile::tempdir().unwrap();
    let url = MessageDownload::new(&exchanges)
        .unwrap()
        .save(dir.path())
        .unwrap();
    assert!(url.as_str().starts_with("file://"));

    let written: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("message_history")).unwrap())
            .unwrap();
    assert_eq!(written.len(), 4);
    assert_eq!(written[3]["id"], "conv-7-u2");
}

// =============================================================================
// Shell bootstrap
// =============================================================================

#[tokio::test]
async fn test_shell_reports_unlicensed_pro_server() {
    let state = Arc::new(MockAdmin::default());
    *state.licensing.lock().unwrap() = json!({ "isPro": true, "status": "breached" });
    let (client, _store) = setup(state).await;

    let shell = Shell::bootstrap(&client).await.unwrap().unwrap();

    assert_eq!(shell.profile.email, "admin@example.com");
    assert!(!shell.is_licensed());
}

#[tokio::test]
async fn test_shell_without_profile_is_empty() {
    let state = Arc::new(MockAdmin::default());
    *state.profile_status.lock().unwrap() = Some(StatusCode::UNAUTHORIZED);
    let (client, _store) = setup(state).await;

    assert!(Shell::bootstrap(&client).await.unwrap().is_none());
}
