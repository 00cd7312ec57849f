use std::sync::{Mutex, MutexGuard, PoisonError};

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that touch process env.
fn env_guard() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`env_guard`].
unsafe fn clear_auth_env() {
    unsafe {
        std::env::remove_var("AUTH_API_BASE_URL");
        std::env::remove_var("AUTH_API_PREFIX");
        std::env::remove_var("AUTH_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("AUTH_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("AUTH_STATE_FILE");
    }
}

#[test]
fn from_env_uses_defaults() {
    let _env = env_guard();
    unsafe { clear_auth_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.api_prefix, "auth");
    assert_eq!(
        cfg.timeouts,
        Timeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
}

#[test]
fn from_env_parses_overrides() {
    let _env = env_guard();
    unsafe {
        clear_auth_env();
        std::env::set_var("AUTH_API_BASE_URL", "https://app.example.test/api/");
        std::env::set_var("AUTH_API_PREFIX", "/v2/auth/");
        std::env::set_var("AUTH_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("AUTH_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("AUTH_STATE_FILE", "/tmp/state.json");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://app.example.test/api");
    assert_eq!(cfg.api_prefix, "v2/auth");
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.state_file, "/tmp/state.json");

    unsafe { clear_auth_env() };
}

#[test]
fn from_env_invalid_timeout_falls_back_to_default() {
    let _env = env_guard();
    unsafe {
        clear_auth_env();
        std::env::set_var("AUTH_REQUEST_TIMEOUT_SECS", "soon");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

    unsafe { clear_auth_env() };
}

#[test]
fn from_env_rejects_non_http_base_url() {
    let _env = env_guard();
    unsafe {
        clear_auth_env();
        std::env::set_var("AUTH_API_BASE_URL", "ftp://example.test");
    }

    let err = ClientConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("http(s)"));

    unsafe { clear_auth_env() };
}

#[test]
fn endpoint_joins_base_prefix_and_path() {
    let cfg = ClientConfig::default().with_base_url("http://localhost:9000/api/").unwrap();
    assert_eq!(cfg.endpoint("login"), "http://localhost:9000/api/auth/login");
    assert_eq!(cfg.endpoint("/current"), "http://localhost:9000/api/auth/current");
}

#[test]
fn with_base_url_rejects_bare_host() {
    assert!(ClientConfig::default().with_base_url("localhost:9000").is_err());
}
