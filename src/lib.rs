//! Session lifecycle and route access policy for a single-page client.
//!
//! SYSTEM CONTEXT
//! ==============
//! `state::session` owns who is signed in, `guard` decides which routes they
//! may enter, and `router` runs every transition through that guard. The
//! auth service is reached through the `net::api::AuthApi` trait so the
//! same logic runs in the browser, in the CLI, and against test doubles.

pub mod config;
pub mod guard;
pub mod net;
pub mod router;
pub mod state;
pub mod util;

#[cfg(test)]
pub(crate) mod test_helpers;
