/// Read-only directory search over registered users.
use super::models::UserProfile;
use super::DbPool;
use crate::error::Result;

/// Maximum number of profiles returned by a search
pub const SEARCH_LIMIT: usize = 20;

pub struct Directory;

impl Directory {
    /// Case-insensitive substring search over codenames.
    ///
    /// Results are ordered by codename and capped at [`SEARCH_LIMIT`]. An empty
    /// term matches everyone.
    pub async fn search(pool: &DbPool, term: &str) -> Result<Vec<UserProfile>> {
        let needle = term.to_lowercase();
        let conn = pool.lock().await;

        // SQLite's lower() only folds ASCII, so matching happens here.
        let mut stmt = conn.prepare("SELECT id, codename, user_code FROM users ORDER BY codename ASC")?;
        let mut rows = stmt.query([])?;

        let mut profiles = Vec::new();
        while let Some(row) = rows.next()? {
            let codename: String = row.get(1)?;
            if !codename.to_lowercase().contains(&needle) {
                continue;
            }
            profiles.push(UserProfile {
                id: row.get(0)?,
                codename,
                user_code: row.get(2)?,
            });
            if profiles.len() == SEARCH_LIMIT {
                break;
            }
        }

        Ok(profiles)
    }
}
