//! Data models shared across storage, IdP calls, and API handlers.

pub mod auth;
pub mod session;
pub mod user;
