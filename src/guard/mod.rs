//! Route policy: the route table, permission checks, and the guard that
//! combines them with the session.

pub mod navigation;
pub mod permissions;
pub mod routes;
