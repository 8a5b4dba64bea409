#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{InMemorySessionStore, SessionSnapshot, SessionStore, StorageError};
pub use sqlite::{SqliteInitError, SqliteSessionStore};
