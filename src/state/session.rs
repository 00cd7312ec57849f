//! Auth-session state for the current client.
//!
//! SYSTEM CONTEXT
//! ==============
//! The navigation guard reads this store before every route transition; UI
//! code reads it for identity-dependent rendering. Only this module mutates
//! the session.
//!
//! DESIGN
//! ======
//! The session is a three-state machine held in a `watch` channel:
//!
//! ```text
//! Unauthenticated --init--> Pending --user--> Authenticated(user)
//!        ^                     |                     |
//!        +------ no user / error ------- logout -----+
//! ```
//!
//! `Pending` is the optimistic "we think you are signed in" state, entered
//! before the server has confirmed anything and restored from the persisted
//! `authenticated` flag after a reload. The user record only exists inside
//! `Authenticated`, so a cleared flag can never sit next to a stale user.
//!
//! CONCURRENCY
//! ===========
//! Concurrent `init()` calls share one in-flight request. A generation
//! counter is bumped by `logout()` and `login()` so a reconciliation that
//! started before either can no longer overwrite the newer state.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;

use super::theme::{Theme, ThemeStore};
use crate::guard::routes::{LOGIN_ROUTE, Navigator, RouteTarget};
use crate::net::api::{ApiError, AuthApi};
use crate::net::types::{ApiResponse, LoginForm, ROLE_ADMIN, ROLE_SUPER_ADMIN, ResetPasswordForm, SignUpForm, User};
use crate::util::persistence::{KeyValueStore, MemoryStore};

/// Durable storage key for the optimistic flag.
pub const AUTHENTICATED_KEY: &str = "authenticated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    /// Asserted signed-in, not yet confirmed by the server.
    Pending,
    Authenticated(User),
}

impl SessionPhase {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Why `init()` ended unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The server answered and nobody is signed in.
    #[error("no signed-in user")]
    NoSession,
    /// The server could not be asked, or answered with an error.
    #[error("current user fetch failed: {0}")]
    Network(#[from] ApiError),
    /// A logout or login happened while this request was in flight.
    #[error("session changed while the current user was being fetched")]
    Superseded,
}

type InitFuture = Shared<BoxFuture<'static, Result<User, InitError>>>;

// =============================================================================
// STORE
// =============================================================================

/// Shared handle to the session. Cloning is cheap; every clone sees the same
/// state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: Arc<dyn AuthApi>,
    durable: Arc<dyn KeyValueStore>,
    transient: Arc<dyn KeyValueStore>,
    theme: ThemeStore,
    navigator: Option<Arc<dyn Navigator>>,
    phase: watch::Sender<SessionPhase>,
    in_flight: Mutex<Option<InitFuture>>,
    generation: AtomicU64,
}

pub struct SessionStoreBuilder {
    api: Arc<dyn AuthApi>,
    durable: Option<Arc<dyn KeyValueStore>>,
    transient: Option<Arc<dyn KeyValueStore>>,
    theme: Option<ThemeStore>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl SessionStoreBuilder {
    /// Storage that survives reloads (`localStorage`, a state file).
    #[must_use]
    pub fn durable(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Storage scoped to the current tab or process (`sessionStorage`).
    #[must_use]
    pub fn transient(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.transient = Some(store);
        self
    }

    #[must_use]
    pub fn theme(mut self, theme: ThemeStore) -> Self {
        self.theme = Some(theme);
        self
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the store, restoring the optimistic flag from durable storage.
    #[must_use]
    pub fn build(self) -> SessionStore {
        let durable = self.durable.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let transient = self.transient.unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let initial = if durable.get(AUTHENTICATED_KEY).as_deref() == Some("true") {
            SessionPhase::Pending
        } else {
            SessionPhase::Unauthenticated
        };
        let (phase, _) = watch::channel(initial);

        SessionStore {
            inner: Arc::new(SessionInner {
                api: self.api,
                durable,
                transient,
                theme: self.theme.unwrap_or_default(),
                navigator: self.navigator,
                phase,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

impl SessionStore {
    #[must_use]
    pub fn builder(api: Arc<dyn AuthApi>) -> SessionStoreBuilder {
        SessionStoreBuilder { api, durable: None, transient: None, theme: None, navigator: None }
    }

    // -------------------------------------------------------------------------
    // Derived state
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.phase.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.phase.borrow().user().cloned()
    }

    /// Optimistic flag: true while pending confirmation and once confirmed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.phase.borrow().is_authenticated()
    }

    /// True once the server has confirmed a user.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.phase.borrow().user().is_some()
    }

    /// Signed in with a confirmed email address.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.inner
            .phase
            .borrow()
            .user()
            .is_some_and(|u| u.email_confirmed)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.role_name().as_deref(), Some(ROLE_ADMIN | ROLE_SUPER_ADMIN))
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role_name().as_deref() == Some(ROLE_SUPER_ADMIN)
    }

    fn role_name(&self) -> Option<String> {
        self.inner
            .phase
            .borrow()
            .user()
            .and_then(User::role_name)
            .map(str::to_owned)
    }

    /// Watch every phase change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    #[must_use]
    pub fn theme(&self) -> &ThemeStore {
        &self.inner.theme
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Assert the session optimistically and reconcile it with the server.
    ///
    /// Callers arriving while a request is in flight wait for that request
    /// instead of starting another one.
    ///
    /// # Errors
    ///
    /// Returns why the session ended unauthenticated. The store has already
    /// been reset when this returns an error.
    pub async fn init(&self) -> Result<User, InitError> {
        let request = {
            let mut slot = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = slot.as_ref() {
                existing.clone()
            } else {
                self.inner.assert_pending();
                let inner = Arc::clone(&self.inner);
                let generation = inner.generation.load(Ordering::SeqCst);
                let request = inner.reconcile(generation).boxed().shared();
                *slot = Some(request.clone());
                request
            }
        };
        request.await
    }

    /// Post credentials, then reconcile local state with the new server
    /// session.
    ///
    /// # Errors
    ///
    /// Returns the login request's error; a failed follow-up `init()` is
    /// logged, not returned.
    pub async fn login(&self, form: &LoginForm) -> Result<ApiResponse, ApiError> {
        let response = self.inner.api.login(form).await?;
        tracing::info!(email = %form.email, "login accepted");
        // Anything fetched before the login cookie existed is stale.
        self.inner.invalidate();
        if let Err(e) = self.init().await {
            tracing::warn!(error = %e, "session init after login failed");
        }
        Ok(response)
    }

    /// Register a new account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns the server's error for field-level display.
    pub async fn sign_up(&self, form: &SignUpForm, invitation_id: Option<i64>) -> Result<ApiResponse, ApiError> {
        self.inner.api.sign_up(form, invitation_id).await
    }

    /// # Errors
    ///
    /// Returns the server's error.
    pub async fn resend_confirmation_email(&self, email: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.inner.api.resend_confirmation_email(email).await
    }

    /// # Errors
    ///
    /// Returns the server's error.
    pub async fn request_password_reset(&self, email: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.inner.api.request_password_reset(email).await
    }

    /// # Errors
    ///
    /// Returns the server's error.
    pub async fn reset_password(&self, form: &ResetPasswordForm) -> Result<ApiResponse, ApiError> {
        self.inner.api.reset_password(form).await
    }

    /// Fetch the current user. With `commit`, a user is stored as
    /// authenticated and an empty answer signs out through
    /// [`Self::logout_user`].
    ///
    /// The payload is returned either way.
    ///
    /// # Errors
    ///
    /// Returns transport and non-2xx errors without touching the session.
    pub async fn get_auth_user(&self, commit: bool) -> Result<Option<User>, ApiError> {
        let user = self.inner.api.current_user().await?;
        if commit {
            match &user {
                Some(user) => self.inner.set_phase(SessionPhase::Authenticated(user.clone())),
                None => {
                    // Server failure is logged by logout_user; local state is cleared regardless.
                    let _ = self.logout_user().await;
                }
            }
        }
        Ok(user)
    }

    /// End the server session, then always clear local state.
    ///
    /// # Errors
    ///
    /// Returns the server logout error. Local cleanup has already run.
    pub async fn logout_user(&self) -> Result<(), ApiError> {
        let result = self.inner.api.logout().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "server logout failed; clearing local session anyway");
        }
        self.logout();
        result.map(|_| ())
    }

    /// Clear the local session, wipe storage, reset the theme, and request
    /// the sign-in route.
    pub fn logout(&self) {
        let inner = &self.inner;
        inner.invalidate();
        inner.set_phase(SessionPhase::Unauthenticated);
        inner.durable.clear();
        inner.transient.clear();
        inner.theme.set_theme(Theme::Dark);
        tracing::info!("session cleared");

        match &inner.navigator {
            Some(navigator) => navigator.push(RouteTarget::named(LOGIN_ROUTE)),
            None => tracing::debug!("no navigator installed; skipping sign-in redirect"),
        }
    }
}

impl SessionInner {
    fn set_phase(&self, phase: SessionPhase) {
        let authenticated = phase.is_authenticated();
        self.phase.send_replace(phase);
        self.durable
            .set(AUTHENTICATED_KEY, if authenticated { "true" } else { "false" });
    }

    /// Enter `Pending` unless a user is already confirmed.
    fn assert_pending(&self) {
        let already_confirmed = self.phase.borrow().user().is_some();
        if !already_confirmed {
            self.set_phase(SessionPhase::Pending);
        }
    }

    /// Drop the in-flight request and fence off its result.
    fn invalidate(&self) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        slot.take();
    }

    async fn reconcile(self: Arc<Self>, generation: u64) -> Result<User, InitError> {
        let fetched = self.api.current_user().await;

        // Generation check and phase write happen under the slot lock so an
        // `invalidate()` cannot land between them.
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("discarding superseded current-user response");
            return Err(InitError::Superseded);
        }

        let outcome = match fetched {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(InitError::NoSession),
            Err(e) => Err(InitError::Network(e)),
        };

        match &outcome {
            Ok(user) => {
                self.set_phase(SessionPhase::Authenticated(user.clone()));
                self.theme.set_theme(Theme::System);
                tracing::info!(user_id = user.id, "session confirmed");
            }
            Err(e) => {
                self.set_phase(SessionPhase::Unauthenticated);
                tracing::debug!(error = %e, "session not confirmed");
            }
        }

        slot.take();
        outcome
    }
}
