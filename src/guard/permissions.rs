//! Permission checks over the signed-in user's role.
//!
//! A permission is held when the user's role lists it by name. The
//! `super-admin` role holds every permission. There is no numeric role
//! hierarchy; `admin` only matters through the permissions it lists.

#[cfg(test)]
#[path = "permissions_test.rs"]
mod permissions_test;

use crate::net::types::{ROLE_SUPER_ADMIN, User};

/// One permission name, or a list where any member suffices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionQuery {
    One(String),
    AnyOf(Vec<String>),
}

impl From<&str> for PermissionQuery {
    fn from(name: &str) -> Self {
        Self::One(name.to_owned())
    }
}

impl From<String> for PermissionQuery {
    fn from(name: String) -> Self {
        Self::One(name)
    }
}

impl From<Vec<String>> for PermissionQuery {
    fn from(names: Vec<String>) -> Self {
        Self::AnyOf(names)
    }
}

impl From<&[&str]> for PermissionQuery {
    fn from(names: &[&str]) -> Self {
        Self::AnyOf(names.iter().map(|n| (*n).to_owned()).collect())
    }
}

/// Evaluates permission queries against a (possibly absent) user.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator<'a> {
    user: Option<&'a User>,
}

impl<'a> PermissionEvaluator<'a> {
    #[must_use]
    pub fn for_user(user: Option<&'a User>) -> Self {
        Self { user }
    }

    /// Whether the user holds `query`. Always false without a user.
    #[must_use]
    pub fn has_permission(&self, query: impl Into<PermissionQuery>) -> bool {
        match query.into() {
            PermissionQuery::One(name) => self.holds(&name),
            PermissionQuery::AnyOf(names) => names.iter().any(|n| self.holds(n)),
        }
    }

    /// At least one of `names` is held, or `names` is empty.
    #[must_use]
    pub fn satisfies_any(&self, names: &[String]) -> bool {
        names.is_empty() || names.iter().any(|n| self.holds(n))
    }

    /// Every one of `names` is held (vacuously true when empty).
    #[must_use]
    pub fn satisfies_all(&self, names: &[String]) -> bool {
        names.iter().all(|n| self.holds(n))
    }

    fn holds(&self, name: &str) -> bool {
        let Some(role) = self.user.and_then(|u| u.role.as_ref()) else {
            return false;
        };
        role.name == ROLE_SUPER_ADMIN || role.permissions.iter().any(|p| p.name == name)
    }
}
