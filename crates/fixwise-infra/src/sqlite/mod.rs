//! SQLite storage layer.
//!
//! Session persistence backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod pool;
pub mod session;

pub use pool::DatabasePool;
pub use session::{SessionSummary, SqliteSessionStore};
