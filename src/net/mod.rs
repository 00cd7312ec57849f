//! Network boundary: wire types and the auth service client.

pub mod api;
pub mod types;
