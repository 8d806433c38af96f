//! End-to-end session tests against a mock MusBlossom API

use musblossom_core::{
    AuthEvent, AuthEvents, FileStore, MemoryNavigator, Navigator, TokenStore,
};
use musblossom_http::{ApiClient, ApiRequest, AuthClient};
use musblossom_session::{AuthFailure, Router, SessionManager};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    tokens: TokenStore,
    navigator: Arc<MemoryNavigator>,
    events: AuthEvents,
    session: SessionManager,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let tokens = TokenStore::in_memory();
    let navigator = Arc::new(MemoryNavigator::new("/login"));
    let events = AuthEvents::new();
    let auth = AuthClient::new(server.uri()).unwrap();
    let session = SessionManager::new(
        tokens.clone(),
        Arc::new(auth),
        navigator.clone(),
        events.clone(),
    );

    Harness {
        server,
        tokens,
        navigator,
        events,
        session,
    }
}

async fn mount_login_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "bob@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "access_token": "A1",
            "refresh_token": "R1",
            "user": {"id": 1, "username": "bob", "email": "bob@example.com"}
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_stores_session_and_navigates_home() {
    let h = harness().await;
    mount_login_ok(&h.server).await;
    let mut events = h.session.subscribe();

    let user = h.session.login("bob@example.com", "secret").await.unwrap();

    assert_eq!(user.username, "bob");
    assert_eq!(h.tokens.access_token().as_deref(), Some("A1"));
    assert_eq!(h.tokens.refresh_token().as_deref(), Some("R1"));
    let stored: Value = serde_json::from_str(&h.tokens.user_json().unwrap()).unwrap();
    assert_eq!(stored["username"], "bob");
    assert!(h.session.is_authenticated());
    assert_eq!(h.navigator.current_path(), "/");
    assert!(matches!(events.try_recv().unwrap(), AuthEvent::LoggedIn(u) if u.username == "bob"));
}

#[tokio::test]
async fn test_login_rejection_surfaces_server_message() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"success": false, "error": "Wrong email or password"})),
        )
        .mount(&h.server)
        .await;

    let result = h.session.login("bob@example.com", "nope").await;

    assert_eq!(
        result,
        Err(AuthFailure::Rejected("Wrong email or password".into()))
    );
    assert_eq!(
        h.session.session().error.as_deref(),
        Some("Wrong email or password")
    );
    assert!(h.tokens.access_token().is_none());
    assert_eq!(h.navigator.current_path(), "/login");
}

#[tokio::test]
async fn test_register_field_errors_are_surfaced() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "username": "bob",
            "email": "bob@example",
            "password": "secret",
            "bio": ""
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": {"email": "Invalid email"}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h.session.register("bob", "bob@example", "secret", None).await;

    assert_eq!(
        result,
        Err(AuthFailure::Rejected("email: Invalid email".into()))
    );
}

#[tokio::test]
async fn test_unreachable_server_is_a_connection_failure() {
    let tokens = TokenStore::in_memory();
    let navigator = Arc::new(MemoryNavigator::new("/login"));
    let auth = AuthClient::with_timeout("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
    let session = SessionManager::new(tokens, Arc::new(auth), navigator, AuthEvents::new());

    let result = session.login("bob@example.com", "secret").await;

    assert_eq!(result, Err(AuthFailure::Connection));
    assert_eq!(
        session.session().error.as_deref(),
        Some("Unable to connect to the server")
    );
}

#[tokio::test]
async fn test_session_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("session.json");

    let h = harness().await;
    mount_login_ok(&h.server).await;
    let persisted = TokenStore::new(Arc::new(FileStore::open(&state).unwrap()));
    let session = SessionManager::new(
        persisted,
        Arc::new(AuthClient::new(h.server.uri()).unwrap()),
        h.navigator.clone(),
        h.events.clone(),
    );
    session.login("bob@example.com", "secret").await.unwrap();

    let reopened = TokenStore::new(Arc::new(FileStore::open(&state).unwrap()));
    let restored = SessionManager::new(
        reopened,
        Arc::new(AuthClient::new(h.server.uri()).unwrap()),
        Arc::new(MemoryNavigator::default()),
        AuthEvents::new(),
    );
    restored.init();

    assert!(restored.is_authenticated());
    assert_eq!(restored.user().map(|u| u.username), Some("bob".to_string()));
}

#[tokio::test]
async fn test_refresh_without_token_makes_no_request() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    assert!(!h.session.refresh_token().await);
}

#[tokio::test]
async fn test_logout_twice_matches_logout_once() {
    let h = harness().await;
    mount_login_ok(&h.server).await;
    h.session.login("bob@example.com", "secret").await.unwrap();

    h.session.logout();
    let after_one = (h.session.session(), h.navigator.history());
    h.session.logout();
    let after_two = (h.session.session(), h.navigator.history());

    assert_eq!(after_one, after_two);
    assert_eq!(h.navigator.current_path(), "/login");
    assert!(h.tokens.refresh_token().is_none());
}

#[tokio::test]
async fn test_interceptor_expiry_signs_session_out() {
    let h = harness().await;
    mount_login_ok(&h.server).await;
    h.session.login("bob@example.com", "secret").await.unwrap();
    let watcher = h.session.watch_storage();
    let mut events = h.events.subscribe();

    let api = ApiClient::builder()
        .base_url(h.server.uri())
        .tokens(h.tokens.clone())
        .navigator(h.navigator.clone())
        .events(h.events.clone())
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/friends"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"success": false, "error": "expired"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let result: Result<Value, _> = api.execute(&ApiRequest::get("/friends")).await;
    assert!(result.is_err());
    assert_eq!(events.recv().await.unwrap(), AuthEvent::SessionExpired);

    for _ in 0..100 {
        if !h.session.is_authenticated() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!h.session.is_authenticated());
    assert_eq!(h.navigator.current_path(), "/login");
    watcher.abort();
}

#[tokio::test]
async fn test_fetch_current_user_refreshes_profile_after_login() {
    let h = harness().await;
    mount_login_ok(&h.server).await;
    h.session.login("bob@example.com", "secret").await.unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": {"id": 1, "username": "bob", "bio": "plays bass"}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.session.fetch_current_user().await.unwrap();

    assert_eq!(user.bio.as_deref(), Some("plays bass"));
    assert_eq!(h.session.user(), Some(user));
    assert!(h.tokens.user_json().unwrap().contains("plays bass"));
}

#[tokio::test]
async fn test_router_guards_against_live_session() {
    let h = harness().await;
    mount_login_ok(&h.server).await;
    let router = Router::with_default_routes(h.session.clone(), h.navigator.clone());

    let nav = router.navigate("/create-post").unwrap();
    assert_eq!(nav.path, "/login");

    h.session.login("bob@example.com", "secret").await.unwrap();

    let nav = router.navigate("/create-post").unwrap();
    assert_eq!(nav.path, "/create-post");
    assert!(nav.redirected_from.is_none());

    let nav = router.navigate("/login").unwrap();
    assert_eq!(nav.path, "/");
}
