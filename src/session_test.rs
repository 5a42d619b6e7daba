use std::collections::VecDeque;
use std::sync::Mutex;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::Timeouts;
use crate::store::MemoryTokenStore;
use crate::types::{ApiMessage, EmailConfirmation, LoginResponse};

// =========================================================================
// MockAuthApi
// =========================================================================

#[derive(Default)]
struct MockAuthApi {
    login_results: Mutex<VecDeque<Result<LoginResponse, ApiError>>>,
    profile_results: Mutex<VecDeque<Result<UserInfo, ApiError>>>,
    login_calls: Mutex<Vec<Credentials>>,
    profile_tokens: Mutex<Vec<String>>,
}

impl MockAuthApi {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_login(&self, result: Result<LoginResponse, ApiError>) {
        self.login_results.lock().unwrap().push_back(result);
    }

    fn push_profile(&self, result: Result<UserInfo, ApiError>) {
        self.profile_results.lock().unwrap().push_back(result);
    }

    fn login_calls(&self) -> Vec<Credentials> {
        self.login_calls.lock().unwrap().clone()
    }

    fn profile_tokens(&self) -> Vec<String> {
        self.profile_tokens.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.login_calls.lock().unwrap().push(credentials.clone());
        self.login_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("unscripted login".into())))
    }

    async fn get_profile(&self, client: &AuthorizedClient) -> Result<UserInfo, ApiError> {
        self.profile_tokens.lock().unwrap().push(client.token().to_owned());
        self.profile_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("unscripted profile".into())))
    }

    async fn confirm_email(&self, _confirmation: &EmailConfirmation) -> Result<serde_json::Value, ApiError> {
        Ok(serde_json::Value::Null)
    }

    async fn request_change_password(&self, _email: &str) -> Result<ApiMessage, ApiError> {
        Err(ApiError::Network("unscripted reset".into()))
    }
}

fn login_ok(token: &str) -> Result<LoginResponse, ApiError> {
    Ok(LoginResponse { body: TokenSet::new(token) })
}

fn profile(name: &str) -> UserInfo {
    UserInfo(serde_json::json!({ "nome": name }))
}

fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Status { status, message: Some(message.to_owned()) }
}

fn offline_client() -> ApiClient {
    ApiClient::new("http://127.0.0.1:9", Timeouts::default()).unwrap()
}

fn session_with(api: &Arc<MockAuthApi>, store: &Arc<MemoryTokenStore>) -> Session {
    Session::new(offline_client(), api.clone(), store.clone())
}

// =========================================================================
// Startup
// =========================================================================

#[test]
fn new_session_is_loading() {
    let session = session_with(&MockAuthApi::new(), &Arc::new(MemoryTokenStore::new()));
    assert!(session.is_loading());
    assert_eq!(session.state(), SessionState::AnonymousLoading);
    assert!(!session.authorized());
}

#[tokio::test]
async fn initialize_without_persisted_tokens_settles_anonymous() {
    let api = MockAuthApi::new();
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    let state = session.initialize().await.unwrap();
    assert_eq!(state, SessionState::Anonymous);
    assert!(!session.is_loading());
    assert!(api.profile_tokens().is_empty());
}

#[tokio::test]
async fn initialize_with_persisted_token_fetches_profile() {
    let api = MockAuthApi::new();
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::with_raw(r#"{"token":"t0"}"#));
    let mut session = session_with(&api, &store);

    let state = session.initialize().await.unwrap();
    assert_eq!(state, SessionState::Authorized);
    assert!(session.authorized());
    assert!(!session.is_loading());
    assert_eq!(api.profile_tokens(), vec!["t0".to_owned()]);
    assert_eq!(session.user_info().and_then(|u| u.get_str("nome")), Some("Ana"));
}

#[tokio::test]
async fn initialize_profile_failure_removes_persisted_token() {
    let api = MockAuthApi::new();
    api.push_profile(Err(rejected(401, "expirado")));
    let store = Arc::new(MemoryTokenStore::with_raw(r#"{"token":"stale"}"#));
    let mut session = session_with(&api, &store);

    let err = session.initialize().await.unwrap_err();
    assert!(matches!(err, SessionError::ProfileUnavailable(_)));
    assert_eq!(err.to_string(), PROFILE_ERROR_MESSAGE);
    assert!(store.raw().is_none());
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(session.tokens().is_none());
    assert!(session.authorized_client().is_none());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn initialize_discards_corrupt_persisted_tokens() {
    let api = MockAuthApi::new();
    let store = Arc::new(MemoryTokenStore::with_raw("{broken"));
    let mut session = session_with(&api, &store);

    let state = session.initialize().await.unwrap();
    assert_eq!(state, SessionState::Anonymous);
    assert!(store.raw().is_none());
    assert!(api.profile_tokens().is_empty());
}

#[tokio::test]
async fn initialize_discards_non_utf8_token_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

    let api = MockAuthApi::new();
    let mut session = Session::new(offline_client(), api.clone(), Arc::new(FileTokenStore::new(&path)));

    assert_eq!(session.initialize().await.unwrap(), SessionState::Anonymous);
    assert!(!path.exists());
    assert!(!session.is_loading());
    assert!(api.profile_tokens().is_empty());

    let mut again = Session::new(offline_client(), api.clone(), Arc::new(FileTokenStore::new(&path)));
    assert_eq!(again.initialize().await.unwrap(), SessionState::Anonymous);
}

#[tokio::test]
async fn initialize_is_noop_when_token_held() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let state = session.initialize().await.unwrap();
    assert_eq!(state, SessionState::Authorized);
    assert_eq!(api.profile_tokens().len(), 1);
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn login_persists_tokens_and_fetches_profile_with_them() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);
    session.initialize().await.unwrap();

    let outcome = session.login("a@b.com", "abcdefgh").await.unwrap();
    assert_eq!(outcome.tokens, TokenSet::new("t1"));
    assert!(outcome.profile.is_ok());

    assert_eq!(store.raw().as_deref(), Some(r#"{"token":"t1"}"#));
    assert_eq!(api.login_calls(), vec![Credentials::new("a@b.com", "abcdefgh")]);
    assert_eq!(api.profile_tokens(), vec!["t1".to_owned()]);
    assert_eq!(session.authorized_client().map(AuthorizedClient::token), Some("t1"));
    assert_eq!(session.state(), SessionState::Authorized);
}

#[tokio::test]
async fn login_rejection_leaves_state_untouched() {
    let api = MockAuthApi::new();
    api.push_login(Err(rejected(401, "X")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);
    session.initialize().await.unwrap();

    let err = session.login("a@b.com", "wrongpass").await.unwrap_err();
    assert_eq!(err.server_message(), Some("X"));
    assert!(store.raw().is_none());
    assert!(session.tokens().is_none());
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(api.profile_tokens().is_empty());
}

#[tokio::test]
async fn login_rejection_keeps_existing_session() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    api.push_login(Err(rejected(401, "X")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    assert!(session.login("a@b.com", "wrongpass").await.is_err());

    assert_eq!(session.state(), SessionState::Authorized);
    assert_eq!(session.authorized_client().map(AuthorizedClient::token), Some("t1"));
    assert_eq!(store.raw().as_deref(), Some(r#"{"token":"t1"}"#));
}

#[tokio::test]
async fn login_with_failing_profile_resets_but_reports_login() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Err(rejected(500, "boom")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    let outcome = session.login("a@b.com", "abcdefgh").await.unwrap();
    assert!(matches!(outcome.profile, Err(SessionError::ProfileUnavailable(_))));
    assert!(store.raw().is_none());
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn relogin_replaces_token_and_refetches_profile() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    api.push_login(login_ok("t2"));
    api.push_profile(Ok(profile("Bia")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    session.login("b@b.com", "abcdefgh").await.unwrap();

    assert_eq!(api.profile_tokens(), vec!["t1".to_owned(), "t2".to_owned()]);
    assert_eq!(session.user_info().and_then(|u| u.get_str("nome")), Some("Bia"));
    assert_eq!(store.raw().as_deref(), Some(r#"{"token":"t2"}"#));
}

#[tokio::test]
async fn login_token_survives_reload() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());

    let mut first = session_with(&api, &store);
    first.login("a@b.com", "abcdefgh").await.unwrap();
    drop(first);

    let mut reloaded = session_with(&api, &store);
    let state = reloaded.initialize().await.unwrap();
    assert_eq!(state, SessionState::Authorized);
    assert_eq!(reloaded.tokens(), Some(&TokenSet::new("t1")));
}

// =========================================================================
// Logout
// =========================================================================

#[tokio::test]
async fn logout_clears_everything_and_is_idempotent() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    session.logout().unwrap();

    assert!(store.raw().is_none());
    assert!(session.tokens().is_none());
    assert!(session.user_info().is_none());
    assert!(session.authorized_client().is_none());
    assert_eq!(session.state(), SessionState::Anonymous);

    session.logout().unwrap();
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[test]
fn logout_before_initialize_settles_loading() {
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&MockAuthApi::new(), &store);
    session.logout().unwrap();
    assert!(!session.is_loading());
    assert_eq!(session.state(), SessionState::Anonymous);
}

// =========================================================================
// Profile
// =========================================================================

#[tokio::test]
async fn ensure_profile_without_token_is_not_authenticated() {
    let mut session = session_with(&MockAuthApi::new(), &Arc::new(MemoryTokenStore::new()));
    let err = session.ensure_profile().await.unwrap_err();
    assert!(matches!(err, SessionError::NotAuthenticated));
}

#[tokio::test]
async fn ensure_profile_uses_cache() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let info = session.ensure_profile().await.unwrap();
    assert_eq!(info.get_str("nome"), Some("Ana"));
    assert_eq!(api.profile_tokens().len(), 1);
}

#[tokio::test]
async fn update_user_info_forces_refetch() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    api.push_profile(Ok(profile("Ana Maria")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let info = session.update_user_info().await.unwrap();
    assert_eq!(info.get_str("nome"), Some("Ana Maria"));
    assert_eq!(api.profile_tokens().len(), 2);
}

#[tokio::test]
async fn update_user_info_failure_resets_session() {
    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    api.push_profile(Err(rejected(401, "expirado")));
    let store = Arc::new(MemoryTokenStore::new());
    let mut session = session_with(&api, &store);

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let err = session.update_user_info().await.unwrap_err();
    assert_eq!(err.server_message(), Some("expirado"));
    assert!(store.raw().is_none());
    assert_eq!(session.state(), SessionState::Anonymous);
}

// =========================================================================
// Authorized requests
// =========================================================================

#[tokio::test]
async fn get_json_without_token_is_not_authenticated() {
    let mut session = session_with(&MockAuthApi::new(), &Arc::new(MemoryTokenStore::new()));
    let err = session.get_json::<serde_json::Value>("/anything/").await.unwrap_err();
    assert!(matches!(err, SessionError::NotAuthenticated));
}

#[tokio::test]
async fn authorized_get_attaches_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unidades/"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(&server.uri(), Timeouts::default()).unwrap();
    let mut session = Session::new(client, api.clone(), store.clone());

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let value: serde_json::Value = session.get_json("/unidades/").await.unwrap();
    assert_eq!(value, serde_json::json!([1, 2]));
    assert_eq!(session.state(), SessionState::Authorized);
}

#[tokio::test]
async fn unauthorized_response_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/unidades/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({ "body": { "mensagem": "Token inválido" } })))
        .mount(&server)
        .await;

    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(&server.uri(), Timeouts::default()).unwrap();
    let mut session = Session::new(client, api.clone(), store.clone());

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let err = session
        .post_json::<_, serde_json::Value>("/unidades/", &serde_json::json!({ "nome": "UBS" }))
        .await
        .unwrap_err();

    assert_eq!(err.server_message(), Some("Token inválido"));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(store.raw().is_none());
}

#[tokio::test]
async fn non_auth_failure_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unidades/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = MockAuthApi::new();
    api.push_login(login_ok("t1"));
    api.push_profile(Ok(profile("Ana")));
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(&server.uri(), Timeouts::default()).unwrap();
    let mut session = Session::new(client, api.clone(), store.clone());

    session.login("a@b.com", "abcdefgh").await.unwrap();
    let err = session.get_json::<serde_json::Value>("/unidades/").await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ApiError::Status { status: 500, .. })));
    assert_eq!(session.state(), SessionState::Authorized);
}
