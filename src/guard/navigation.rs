//! Pre-transition access policy.
//!
//! SYSTEM CONTEXT
//! ==============
//! The router calls [`NavigationGuard::before_each`] for every transition and
//! commits only on [`GuardDecision::Proceed`]. Every route component sees the
//! same redirect behavior because it is decided here, once.
//!
//! ERROR HANDLING
//! ==============
//! The guard never fails. A session that cannot be confirmed is treated as
//! signed out, and a missing permission lands on the dashboard rather than an
//! error page.

#[cfg(test)]
#[path = "navigation_test.rs"]
mod navigation_test;

use super::permissions::PermissionEvaluator;
use super::routes::{DASHBOARD_ROUTE, EffectiveMeta, LOGIN_ROUTE, REDIRECT_QUERY_KEY, ResolvedRoute, RouteTarget};
use crate::net::types::User;
use crate::state::session::{InitError, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(RouteTarget),
}

/// One transition under evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub name: Option<String>,
    /// Path plus query, as requested. Carried through sign-in.
    pub full_path: String,
    pub meta: EffectiveMeta,
}

impl NavigationRequest {
    #[must_use]
    pub fn new(full_path: &str, meta: EffectiveMeta) -> Self {
        Self { name: None, full_path: full_path.to_owned(), meta }
    }
}

impl From<&ResolvedRoute> for NavigationRequest {
    fn from(route: &ResolvedRoute) -> Self {
        Self { name: route.name.clone(), full_path: route.location.full_path(), meta: route.meta.clone() }
    }
}

#[derive(Clone)]
pub struct NavigationGuard {
    session: SessionStore,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Decide whether `to` may be entered. First matching rule wins.
    pub async fn before_each(&self, to: &NavigationRequest) -> GuardDecision {
        let meta = &to.meta;

        let mut confirmed = None;
        if meta.requires_auth && !self.session.is_initialized() {
            match self.confirm_session().await {
                Ok(user) => confirmed = Some(user),
                Err(e) => {
                    tracing::debug!(path = %to.full_path, error = %e, "session not confirmed; redirecting to sign-in");
                    return login_redirect(&to.full_path);
                }
            }
        }

        if meta.requires_auth && !self.session.is_authenticated() {
            tracing::debug!(path = %to.full_path, "unauthenticated; redirecting to sign-in");
            return login_redirect(&to.full_path);
        }

        if meta.guest_only && self.session.is_authenticated() {
            tracing::debug!(path = %to.full_path, "guest-only route while signed in");
            return GuardDecision::Redirect(RouteTarget::named(DASHBOARD_ROUTE));
        }

        if confirmed.is_some() || self.session.is_authenticated() {
            let user = confirmed.or_else(|| self.session.user());
            let perms = PermissionEvaluator::for_user(user.as_ref());
            let any_ok = perms.satisfies_any(&meta.perms_any);
            let all_ok = perms.satisfies_all(&meta.perms_all);
            if !(any_ok && all_ok) {
                tracing::debug!(path = %to.full_path, any_ok, all_ok, "missing permission; redirecting to dashboard");
                return GuardDecision::Redirect(RouteTarget::named(DASHBOARD_ROUTE));
            }
        }

        tracing::debug!(path = %to.full_path, "navigation allowed");
        GuardDecision::Proceed
    }

    /// Run `init()` until a server answer decides. A superseded request says
    /// nothing about the session, so the guard waits for the newer one.
    async fn confirm_session(&self) -> Result<User, InitError> {
        loop {
            match self.session.init().await {
                Err(InitError::Superseded) => {
                    tracing::debug!("session init superseded; waiting for the newer request");
                }
                outcome => return outcome,
            }
        }
    }
}

fn login_redirect(full_path: &str) -> GuardDecision {
    GuardDecision::Redirect(RouteTarget::named(LOGIN_ROUTE).with_query(REDIRECT_QUERY_KEY, full_path))
}
