//! Appearance preference driven by the session lifecycle.
//!
//! Applies a `data-theme` attribute to the `<html>` element in the browser.
//! Signing in switches to `System`; signing out forces `Dark` so the sign-in
//! screen looks the same for every visitor.
//!
//! TRADE-OFFS
//! ==========
//! Application is best-effort browser-only behavior; non-browser builds keep
//! the value in memory and skip the DOM write.

#[cfg(test)]
#[path = "theme_test.rs"]
mod theme_test;

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    System,
    Dark,
    Light,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// `System` resolves to dark.
    #[must_use]
    pub fn is_dark(self) -> bool {
        !matches!(self, Self::Light)
    }
}

/// Shared handle to the current theme.
#[derive(Clone, Debug, Default)]
pub struct ThemeStore {
    theme: Arc<Mutex<Theme>>,
}

impl ThemeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        *self.theme.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.theme().is_dark()
    }

    pub fn set_theme(&self, theme: Theme) {
        *self.theme.lock().unwrap_or_else(PoisonError::into_inner) = theme;
        apply(theme.is_dark());
        tracing::debug!(theme = theme.as_str(), "theme applied");
    }
}

/// Set the `data-theme` attribute on the `<html>` element.
fn apply(dark: bool) {
    #[cfg(feature = "hydrate")]
    {
        if let Some(doc) = web_sys::window().and_then(|w| w.document()) {
            if let Some(el) = doc.document_element() {
                let _ = el.set_attribute("data-theme", if dark { "dark" } else { "light" });
            }
        }
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = dark;
    }
}
