/// Identity storage: registration, authentication and user lookups.
///
/// Codename uniqueness is enforced by the UNIQUE index on `users.codename`;
/// a constraint violation on insert is the duplicate signal. The user code is
/// a short shareable token that is also UNIQUE in the schema, so generation
/// retries on the rare collision instead of trusting the generator.
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::models::{User, UserId, UserProfile};
use super::{now_millis, DbPool};
use crate::error::{unique_violation, ChatError, Result};

/// Attempts made to find a free user code before giving up
const USER_CODE_ATTEMPTS: usize = 5;

const USER_COLUMNS: &str = "id, codename, credential_digest, user_code, created_at";

pub struct IdentityStore;

impl IdentityStore {
    /// Register a new user.
    ///
    /// Fails with `DuplicateCodename` when the codename is taken (exact,
    /// case-sensitive match), with `Validation` for blank input and with
    /// `UserCodeExhausted` if every generated user code was already taken.
    pub async fn register(pool: &DbPool, codename: &str, credential_digest: &str) -> Result<User> {
        Self::register_with_codes(pool, codename, credential_digest, generate_user_code).await
    }

    async fn register_with_codes(
        pool: &DbPool,
        codename: &str,
        credential_digest: &str,
        mut next_code: impl FnMut(i64) -> String,
    ) -> Result<User> {
        if codename.trim().is_empty() {
            return Err(ChatError::Validation("Codename is required".to_string()));
        }
        if credential_digest.trim().is_empty() {
            return Err(ChatError::Validation("Credential digest is required".to_string()));
        }

        let conn = pool.lock().await;
        let created_at = now_millis();

        for attempt in 1..=USER_CODE_ATTEMPTS {
            let user_code = next_code(created_at);
            let inserted = conn.execute(
                "INSERT INTO users (codename, credential_digest, user_code, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![codename, credential_digest, &user_code, created_at],
            );

            match inserted {
                Ok(_) => {
                    let id = conn.last_insert_rowid();
                    log::info!("Registered user {} ({})", codename, id);
                    return Ok(User {
                        id,
                        codename: codename.to_string(),
                        credential_digest: credential_digest.to_string(),
                        user_code,
                        created_at,
                    });
                }
                Err(e) => match unique_violation(&e) {
                    Some(msg) if msg.contains("users.codename") => {
                        return Err(ChatError::DuplicateCodename(codename.to_string()));
                    }
                    Some(msg) if msg.contains("users.user_code") => {
                        log::warn!("User code collision on attempt {}, regenerating", attempt);
                    }
                    _ => return Err(e.into()),
                },
            }
        }

        log::error!("Gave up allocating a user code for {}", codename);
        Err(ChatError::UserCodeExhausted(USER_CODE_ATTEMPTS))
    }

    /// Check a codename/digest pair.
    ///
    /// Returns `None` for an unknown codename and for a wrong digest alike, so
    /// callers cannot tell which half of the pair was wrong.
    pub async fn authenticate(
        pool: &DbPool,
        codename: &str,
        credential_digest: &str,
    ) -> Result<Option<User>> {
        let conn = pool.lock().await;
        let user = find_by_codename_sync(&conn, codename)?;

        Ok(user.filter(|u| digests_match(&u.credential_digest, credential_digest)))
    }

    /// Get user by codename
    pub async fn lookup_by_codename(pool: &DbPool, codename: &str) -> Result<Option<User>> {
        let conn = pool.lock().await;
        Ok(find_by_codename_sync(&conn, codename)?)
    }

    /// Get user by their shareable user code
    pub async fn lookup_by_code(pool: &DbPool, user_code: &str) -> Result<Option<User>> {
        let conn = pool.lock().await;

        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE user_code = ?1", USER_COLUMNS),
                params![user_code],
                user_from_row,
            )
            .optional()?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn lookup_by_id(pool: &DbPool, user_id: UserId) -> Result<Option<User>> {
        let conn = pool.lock().await;
        Ok(find_by_id_sync(&conn, user_id)?)
    }

    /// Public profile for a user, without the credential digest
    pub async fn profile(pool: &DbPool, user_id: UserId) -> Result<Option<UserProfile>> {
        Ok(Self::lookup_by_id(pool, user_id).await?.map(|u| u.profile()))
    }
}

pub(crate) fn user_from_row(row: &Row<'_>) -> SqliteResult<User> {
    Ok(User {
        id: row.get(0)?,
        codename: row.get(1)?,
        credential_digest: row.get(2)?,
        user_code: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn find_by_id_sync(conn: &Connection, user_id: UserId) -> SqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

fn find_by_codename_sync(conn: &Connection, codename: &str) -> SqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE codename = ?1", USER_COLUMNS),
        params![codename],
        user_from_row,
    )
    .optional()
}

/// Resolve a user's codename inside an already-held connection.
pub(crate) fn codename_for_sync(conn: &Connection, user_id: UserId) -> SqliteResult<Option<String>> {
    conn.query_row(
        "SELECT codename FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

fn digests_match(stored: &str, supplied: &str) -> bool {
    stored.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Six random base-36 characters, a dash, then the last three base-36
/// characters of the registration timestamp, e.g. `k3j9x1-a0z`.
fn generate_user_code(now_ms: i64) -> String {
    let random = to_base36(Uuid::new_v4().as_u128());
    let stamp = to_base36(now_ms.unsigned_abs() as u128);

    let random_part = &random[random.len().saturating_sub(6)..];
    let stamp_part = &stamp[stamp.len().saturating_sub(3)..];
    format!("{:0>6}-{:0>3}", random_part, stamp_part)
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
