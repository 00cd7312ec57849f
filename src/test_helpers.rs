//! Fixtures shared by unit tests: a scriptable auth API and user builders.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::guard::routes::{Navigator, RouteTarget};
use crate::net::api::{ApiError, AuthApi};
use crate::net::types::{ApiResponse, LoginForm, Permission, ResetPasswordForm, Role, SignUpForm, User};
use crate::state::session::SessionStore;
use crate::util::persistence::MemoryStore;

// =========================================================================
// MockAuthApi
// =========================================================================

pub struct MockAuthApi {
    current: Mutex<Result<Option<User>, ApiError>>,
    /// Becomes the current user once `login` succeeds.
    user_after_login: Mutex<Option<User>>,
    login_result: Mutex<Result<ApiResponse, ApiError>>,
    logout_result: Mutex<Result<ApiResponse, ApiError>>,
    delay_ms: AtomicU64,
    pub current_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub requests: Mutex<Vec<String>>,
}

fn ok_response() -> ApiResponse {
    ApiResponse { status: 200, body: serde_json::json!({ "title": "Success" }) }
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Ok(None)),
            user_after_login: Mutex::new(None),
            login_result: Mutex::new(Ok(ok_response())),
            logout_result: Mutex::new(Ok(ok_response())),
            delay_ms: AtomicU64::new(0),
            current_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_user(user: User) -> Self {
        let api = Self::new();
        api.set_current(Ok(Some(user)));
        api
    }

    pub fn set_current(&self, result: Result<Option<User>, ApiError>) {
        *self.current.lock().unwrap() = result;
    }

    pub fn set_user_after_login(&self, user: User) {
        *self.user_after_login.lock().unwrap() = Some(user);
    }

    pub fn set_login_result(&self, result: Result<ApiResponse, ApiError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn set_logout_result(&self, result: Result<ApiResponse, ApiError>) {
        *self.logout_result.lock().unwrap() = result;
    }

    /// Delay every current-user response.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap(), Ordering::SeqCst);
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }
}

#[async_trait::async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, form: &LoginForm) -> Result<ApiResponse, ApiError> {
        self.record(format!("login:{}", form.email));
        let result = self.login_result.lock().unwrap().clone();
        if result.is_ok() {
            if let Some(user) = self.user_after_login.lock().unwrap().clone() {
                self.set_current(Ok(Some(user)));
            }
        }
        result
    }

    async fn sign_up(&self, form: &SignUpForm, invitation_id: Option<i64>) -> Result<ApiResponse, ApiError> {
        self.record(format!("signup:{}:{invitation_id:?}", form.email));
        Ok(ok_response())
    }

    async fn resend_confirmation_email(&self, email: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.record(format!("resend:{email:?}"));
        Ok(ok_response())
    }

    async fn request_password_reset(&self, email: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.record(format!("request-reset:{email:?}"));
        Ok(ok_response())
    }

    async fn reset_password(&self, form: &ResetPasswordForm) -> Result<ApiResponse, ApiError> {
        self.record(format!("reset:{}", form.token));
        Ok(ok_response())
    }

    async fn current_user(&self) -> Result<Option<User>, ApiError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.current.lock().unwrap().clone()
    }

    async fn logout(&self) -> Result<ApiResponse, ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.record("logout".to_owned());
        let result = self.logout_result.lock().unwrap().clone();
        if result.is_ok() {
            self.set_current(Ok(None));
        }
        result
    }
}

// =========================================================================
// RecordingNavigator
// =========================================================================

#[derive(Default)]
pub struct RecordingNavigator {
    pub pushed: Mutex<Vec<RouteTarget>>,
}

impl RecordingNavigator {
    pub fn pushed(&self) -> Vec<RouteTarget> {
        self.pushed.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, target: RouteTarget) {
        self.pushed.lock().unwrap().push(target);
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// A user whose role lists `perms`.
pub fn user_with(role: &str, perms: &[&str]) -> User {
    User {
        id: 7,
        email: "ada@example.com".into(),
        display_name: "Ada".into(),
        email_confirmed: true,
        role: Some(Role {
            id: 1,
            name: role.into(),
            is_default: role == "member",
            description: None,
            permissions: perms
                .iter()
                .zip(1..)
                .map(|(name, id)| Permission { id, name: (*name).into(), description: String::new() })
                .collect(),
        }),
    }
}

pub fn member(perms: &[&str]) -> User {
    user_with("member", perms)
}

pub fn network_down() -> ApiError {
    ApiError::Request("connection refused".into())
}

/// Everything a session test wants to poke at.
pub struct Harness {
    pub api: Arc<MockAuthApi>,
    pub durable: Arc<MemoryStore>,
    pub transient: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub session: SessionStore,
}

impl Harness {
    pub fn new(api: MockAuthApi) -> Self {
        Self::with_durable(api, MemoryStore::new())
    }

    /// Build over pre-seeded durable storage, as after a reload.
    pub fn with_durable(api: MockAuthApi, durable: MemoryStore) -> Self {
        let api = Arc::new(api);
        let durable = Arc::new(durable);
        let transient = Arc::new(MemoryStore::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let session = SessionStore::builder(api.clone())
            .durable(durable.clone())
            .transient(transient.clone())
            .navigator(navigator.clone())
            .build();
        Self { api, durable, transient, navigator, session }
    }

    /// Invariant: an unauthenticated session never carries a user.
    pub fn assert_invariant(&self) {
        if !self.session.is_authenticated() {
            assert!(self.session.user().is_none(), "unauthenticated session carries a user");
        }
        if self.session.is_initialized() {
            assert!(self.session.is_authenticated(), "initialized session is not authenticated");
        }
    }
}
