//! Client-side state owned by this crate.
//!
//! SYSTEM CONTEXT
//! ==============
//! `session` is the single writer of auth state; `theme` holds the display
//! preference the session resets on sign-in and sign-out.

pub mod session;
pub mod theme;
