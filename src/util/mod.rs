//! Environment helpers kept apart from session logic.

pub mod persistence;
