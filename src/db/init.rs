/// Database schema initialization.
/// Sets up SQLite WAL mode and creates tables on startup.
use rusqlite::{Connection, Result as SqliteResult};

/// Initialize database connection with WAL mode and schema
pub fn initialize_database(conn: &Connection) -> SqliteResult<()> {
    // Enable WAL mode (for file-based DB only, ignore error for in-memory)
    let _ = conn.execute("PRAGMA journal_mode = WAL", []);
    let _ = conn.execute("PRAGMA synchronous = NORMAL", []);
    // Memberships, servers and messages must reference existing rows
    conn.pragma_update(None, "foreign_keys", true)?;

    create_schema(conn)?;

    Ok(())
}

/// Create all database tables
fn create_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            codename TEXT UNIQUE NOT NULL,
            credential_digest TEXT NOT NULL,
            user_code TEXT UNIQUE NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS servers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            owner_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            visibility TEXT NOT NULL CHECK (visibility IN ('public', 'private')),
            join_secret TEXT,
            FOREIGN KEY(owner_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS memberships (
            server_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            joined_at INTEGER NOT NULL,
            UNIQUE(server_id, user_id),
            FOREIGN KEY(server_id) REFERENCES servers(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY,
            server_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            anonymous INTEGER NOT NULL DEFAULT 0,
            posted_at INTEGER NOT NULL,
            FOREIGN KEY(server_id) REFERENCES servers(id),
            FOREIGN KEY(author_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_servers_created ON servers(created_at);
        CREATE INDEX IF NOT EXISTS idx_memberships_server ON memberships(server_id);
        CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id);
        CREATE INDEX IF NOT EXISTS idx_messages_server_posted
            ON messages(server_id, posted_at);
        CREATE INDEX IF NOT EXISTS idx_messages_posted ON messages(posted_at);
        "#,
    )?;

    Ok(())
}
