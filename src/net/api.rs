//! REST client for the authentication service.
//!
//! ARCHITECTURE
//! ============
//! `AuthApi` is the seam the session store talks through; `HttpAuthApi` is
//! the `reqwest` implementation. The server keeps its session in HTTP-only
//! cookies, so the client carries a cookie store and never sees tokens.
//!
//! ERROR HANDLING
//! ==============
//! `ApiError` is `Clone` and string-backed so a single failed request can be
//! fanned out to every caller waiting on the same shared future.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use serde::Serialize;

use super::types::{
    ApiResponse, EmailRequest, LoginForm, MessageBody, ResetPasswordForm, SignUpForm, SignUpRequest, User,
};
use crate::config::ClientConfig;

pub const LOGIN_PATH: &str = "login";
pub const SIGNUP_PATH: &str = "signup";
pub const RESEND_CONFIRMATION_PATH: &str = "resend-confirmation-email";
pub const REQUEST_PASSWORD_RESET_PATH: &str = "request-password-reset";
pub const RESET_PASSWORD_PATH: &str = "reset-password";
pub const CURRENT_USER_PATH: &str = "current?withSecrets=true";
pub const LOGOUT_PATH: &str = "logout";

/// Errors produced by auth API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("server responded with status {status}{}", format_message(.message.as_deref()))]
    Status { status: u16, message: Option<String> },

    /// A success body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ApiError {
    /// Status code for `Status` errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn format_message(message: Option<&str>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

/// Async boundary to the authentication service. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /login`.
    async fn login(&self, form: &LoginForm) -> Result<ApiResponse, ApiError>;

    /// `POST /signup`, attaching `invitation_id` only when present.
    async fn sign_up(&self, form: &SignUpForm, invitation_id: Option<i64>) -> Result<ApiResponse, ApiError>;

    /// `POST /resend-confirmation-email`.
    async fn resend_confirmation_email(&self, email: Option<&str>) -> Result<ApiResponse, ApiError>;

    /// `POST /request-password-reset`.
    async fn request_password_reset(&self, email: Option<&str>) -> Result<ApiResponse, ApiError>;

    /// `POST /reset-password`.
    async fn reset_password(&self, form: &ResetPasswordForm) -> Result<ApiResponse, ApiError>;

    /// `GET /current?withSecrets=true`.
    ///
    /// `Ok(None)` means the service reports no signed-in user.
    async fn current_user(&self) -> Result<Option<User>, ApiError>;

    /// `POST /logout`.
    async fn logout(&self) -> Result<ApiResponse, ApiError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpAuthApi {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpAuthApi {
    /// Build a cookie-keeping client from config.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the TLS backend fails to initialize.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post<B>(&self, path: &str, body: Option<&B>) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.config.endpoint(path);
        let mut req = self.http.post(&url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| ApiError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        tracing::debug!(%url, status, "auth api response");
        into_response(status, &text)
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, form: &LoginForm) -> Result<ApiResponse, ApiError> {
        self.post(LOGIN_PATH, Some(form)).await
    }

    async fn sign_up(&self, form: &SignUpForm, invitation_id: Option<i64>) -> Result<ApiResponse, ApiError> {
        self.post(SIGNUP_PATH, Some(&SignUpRequest { form, invitation_id }))
            .await
    }

    async fn resend_confirmation_email(&self, email: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.post(RESEND_CONFIRMATION_PATH, Some(&EmailRequest { email }))
            .await
    }

    async fn request_password_reset(&self, email: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.post(REQUEST_PASSWORD_RESET_PATH, Some(&EmailRequest { email }))
            .await
    }

    async fn reset_password(&self, form: &ResetPasswordForm) -> Result<ApiResponse, ApiError> {
        self.post(RESET_PASSWORD_PATH, Some(form)).await
    }

    async fn current_user(&self) -> Result<Option<User>, ApiError> {
        let url = self.config.endpoint(CURRENT_USER_PATH);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        tracing::debug!(%url, status, "auth api response");
        current_user_from(status, &text)
    }

    async fn logout(&self) -> Result<ApiResponse, ApiError> {
        self.post::<()>(LOGOUT_PATH, None).await
    }
}

// =============================================================================
// RESPONSE DECODING
// =============================================================================

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Parse a body as JSON, keeping non-JSON text as a string value.
fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_owned()))
}

/// Pull `message` out of a `{title, message}` envelope.
fn error_message(body: &serde_json::Value) -> Option<String> {
    match body {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        serde_json::Value::Object(_) => serde_json::from_value::<MessageBody>(body.clone())
            .ok()
            .and_then(|b| b.message),
        _ => None,
    }
}

fn into_response(status: u16, text: &str) -> Result<ApiResponse, ApiError> {
    let body = parse_body(text);
    if !is_success(status) {
        return Err(ApiError::Status { status, message: error_message(&body) });
    }
    Ok(ApiResponse { status, body })
}

/// Decode the current-user reply. Empty bodies, JSON `null` and 401 all mean
/// "nobody is signed in".
fn current_user_from(status: u16, text: &str) -> Result<Option<User>, ApiError> {
    if status == 401 {
        return Ok(None);
    }
    let response = into_response(status, text)?;
    if response.body.is_null() {
        return Ok(None);
    }
    serde_json::from_value(response.body)
        .map(Some)
        .map_err(|e| ApiError::Parse(e.to_string()))
}
