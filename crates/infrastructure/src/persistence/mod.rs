//! Persistence module
//!
//! SQLite-backed session storage behind an r2d2 connection pool.

pub mod connection;
pub mod migrations;
pub mod session_store;

pub use connection::{ConnectionPool, DatabaseError, create_pool};
pub use session_store::SqliteSessionStore;
