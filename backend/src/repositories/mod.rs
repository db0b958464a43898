//! Storage access for sessions and users.

pub mod session_store;
pub mod user;

pub use session_store::{MemorySessionStore, PgSessionStore, SessionStore};
pub use user::{PgUserDirectory, UserDirectory};
