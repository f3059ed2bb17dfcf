/// Error types for the chat core.
/// Every policy rejection is a distinct variant so the HTTP layer can render
/// a specific message; storage failures stay opaque.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Codename already exists: {0}")]
    DuplicateCodename(String),

    #[error("Server not found: {0}")]
    ServerNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Invalid server password")]
    InvalidSecret,

    #[error("Only the server owner can invite members")]
    NotOwner,

    #[error("User is not a member of this server")]
    NotAMember,

    #[error("Access denied: Not a member of this server")]
    AccessDenied,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Could not allocate a unique user code after {0} attempts")]
    UserCodeExhausted(usize),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;

/// Returns the constraint message when `err` is a UNIQUE violation,
/// e.g. `"UNIQUE constraint failed: users.codename"`.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Some(msg.as_deref().unwrap_or("UNIQUE constraint failed"))
        }
        _ => None,
    }
}

/// True when `err` is a FOREIGN KEY violation, i.e. a referenced row is missing.
pub(crate) fn foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}
