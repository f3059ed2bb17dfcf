/// Database layer for persistent storage.
/// One SQLite connection behind an async mutex; every store operation takes
/// the lock once and finishes all of its reads and writes before releasing it.

pub mod directory;
pub mod identity_store;
pub mod init;
pub mod membership_ledger;
pub mod message_log;
pub mod models;
pub mod server_registry;

pub use directory::Directory;
pub use identity_store::IdentityStore;
pub use membership_ledger::MembershipLedger;
pub use message_log::MessageLog;
pub use server_registry::ServerRegistry;

use chrono::Utc;
use rusqlite::{Connection, Result as SqliteResult};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type DbPool = Arc<Mutex<Connection>>;

/// Create a connection pool (simplified for single-threaded SQLite)
pub fn create_pool(db_path: &str) -> SqliteResult<DbPool> {
    let conn = Connection::open(db_path)?;
    init::initialize_database(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Create an in-memory database for testing
pub fn create_test_pool() -> DbPool {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory DB");
    init::initialize_database(&conn).expect("Failed to initialize DB");
    Arc::new(Mutex::new(conn))
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
