//! Transition pipeline: resolve, guard, follow redirects, commit.
//!
//! SYSTEM CONTEXT
//! ==============
//! This is the only caller of [`NavigationGuard::before_each`]. A transition
//! reaches [`History`] only after the guard allows it; redirects are resolved
//! through the route table by name and re-enter the pipeline.
//!
//! TRADE-OFFS
//! ==========
//! Guards that redirect to each other would loop forever, so the pipeline
//! gives up after [`MAX_REDIRECTS`] hops and commits nothing.

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

use std::sync::{Arc, Mutex, PoisonError};

use crate::guard::navigation::{GuardDecision, NavigationGuard, NavigationRequest};
use crate::guard::routes::{Location, Navigator, RouteError, RouteTable, RouteTarget};

/// Redirects followed for one navigation before giving up.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("no route matches {0}")]
    NoMatch(String),
    #[error("navigation to {from} still redirecting after {hops} hops")]
    RedirectLoop { from: String, hops: usize },
}

// =============================================================================
// HISTORY
// =============================================================================

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<Location>,
    /// Pushed by the session store, not yet run through the pipeline.
    pending: Vec<RouteTarget>,
}

/// Committed locations, newest last. Cloning shares the same history.
#[derive(Debug, Clone, Default)]
pub struct History {
    state: Arc<Mutex<HistoryState>>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<Location> {
        self.lock().entries.last().cloned()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Location> {
        self.lock().entries.clone()
    }

    /// Drain navigation requests pushed since the last call.
    #[must_use]
    pub fn take_pending(&self) -> Vec<RouteTarget> {
        std::mem::take(&mut self.lock().pending)
    }

    fn commit(&self, location: Location) {
        self.lock().entries.push(location);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for History {
    fn push(&self, target: RouteTarget) {
        tracing::debug!(route = %target.name, "navigation requested");
        self.lock().pending.push(target);
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// A committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub location: Location,
    pub name: Option<String>,
    pub title: Option<String>,
    /// Guard redirects taken on the way, in order.
    pub redirects: Vec<RouteTarget>,
}

#[derive(Clone)]
pub struct Router {
    table: RouteTable,
    guard: NavigationGuard,
    history: History,
}

impl Router {
    #[must_use]
    pub fn new(table: RouteTable, guard: NavigationGuard, history: History) -> Self {
        Self { table, guard, history }
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    #[must_use]
    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Navigate to `full_path`, following guard redirects.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NoMatch`] when nothing matches,
    /// [`RouterError::Route`] when a redirect names an unknown or dynamic
    /// route, and [`RouterError::RedirectLoop`] after [`MAX_REDIRECTS`]
    /// redirects. Nothing is committed on error.
    pub async fn navigate(&self, full_path: &str) -> Result<Navigation, RouterError> {
        let mut target = full_path.to_owned();
        let mut redirects = Vec::new();

        loop {
            let resolved = self
                .table
                .resolve(&target)?
                .ok_or_else(|| RouterError::NoMatch(target.clone()))?;

            match self.guard.before_each(&NavigationRequest::from(&resolved)).await {
                GuardDecision::Proceed => {
                    self.history.commit(resolved.location.clone());
                    tracing::info!(path = %resolved.location.full_path(), hops = redirects.len(), "navigation committed");
                    return Ok(Navigation {
                        location: resolved.location,
                        name: resolved.name,
                        title: resolved.meta.title,
                        redirects,
                    });
                }
                GuardDecision::Redirect(to) => {
                    if redirects.len() == MAX_REDIRECTS {
                        tracing::warn!(from = full_path, "redirect limit reached");
                        return Err(RouterError::RedirectLoop { from: full_path.to_owned(), hops: MAX_REDIRECTS });
                    }
                    target = self.table.href(&to.name, &to.query)?.full_path();
                    redirects.push(to);
                }
            }
        }
    }

    /// Run navigations pushed by the session store (e.g. after logout).
    /// Returns the last one committed.
    ///
    /// # Errors
    ///
    /// Stops at the first navigation that fails.
    pub async fn follow_pending(&self) -> Result<Option<Navigation>, RouterError> {
        let mut last = None;
        for target in self.history.take_pending() {
            let path = self.table.href(&target.name, &target.query)?.full_path();
            last = Some(self.navigate(&path).await?);
        }
        Ok(last)
    }
}
