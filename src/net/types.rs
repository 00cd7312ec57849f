//! Wire DTOs for the authentication service boundary.
//!
//! DESIGN
//! ======
//! These types mirror the JSON the auth service emits so serde stays the only
//! translation layer. Unknown fields (timestamps, secrets) are ignored.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Deserializer, Serialize};

/// Role name granting administrative screens.
pub const ROLE_ADMIN: &str = "admin";
/// Role name granting every permission.
pub const ROLE_SUPER_ADMIN: &str = "super-admin";

/// The signed-in user as returned by `GET /auth/current`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    /// Whether the email address has been verified.
    ///
    /// The service sends a confirmation timestamp (or null); plain booleans are
    /// accepted too.
    #[serde(default, deserialize_with = "deserialize_confirmation")]
    pub email_confirmed: bool,
    #[serde(default)]
    pub role: Option<Role>,
}

impl User {
    /// Role name, if the payload carried a role.
    #[must_use]
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.name.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

fn deserialize_confirmation<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    })
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// Credentials posted to `/auth/login`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Registration data posted to `/auth/signup`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Body of the completed password reset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

/// Sign-up body with the optional invitation attached.
#[derive(Debug, Serialize)]
pub(crate) struct SignUpRequest<'a> {
    #[serde(flatten)]
    pub form: &'a SignUpForm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<i64>,
}

/// `{email}` body shared by confirmation and reset requests.
#[derive(Debug, Serialize)]
pub(crate) struct EmailRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Raw server reply handed back to callers for field-level error display.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// `{title, message}` envelope the service uses for errors and acknowledgements.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
