/// Server registry: creation and metadata of messaging spaces.
///
/// A server and its owner's membership are written in one transaction, so no
/// reader can ever observe a server whose owner is not a member.
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

use super::identity_store::codename_for_sync;
use super::membership_ledger::{insert_membership_sync, member_count_sync};
use super::models::{
    NewServer, Server, ServerId, ServerSummary, UserId, UserServer, Visibility, UNKNOWN_CODENAME,
};
use super::{now_millis, DbPool};
use crate::error::{foreign_key_violation, ChatError, Result};

const SERVER_COLUMNS: &str =
    "id, name, description, owner_id, created_at, visibility, join_secret";

pub struct ServerRegistry;

impl ServerRegistry {
    /// Create a server and enroll its owner as the first member.
    ///
    /// Fields are stored as given; callers validate names and the
    /// secret/visibility pairing beforehand. An owner id with no account
    /// behind it fails with `UserNotFound` and writes nothing.
    pub async fn create_server(pool: &DbPool, new_server: NewServer) -> Result<ServerId> {
        let mut conn = pool.lock().await;
        let created_at = now_millis();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO servers (name, description, owner_id, created_at, visibility, join_secret)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &new_server.name,
                &new_server.description,
                new_server.owner_id,
                created_at,
                new_server.visibility.as_str(),
                &new_server.join_secret,
            ],
        )
        .map_err(|e| {
            if foreign_key_violation(&e) {
                ChatError::UserNotFound(new_server.owner_id)
            } else {
                e.into()
            }
        })?;
        let server_id = tx.last_insert_rowid();
        insert_membership_sync(&tx, server_id, new_server.owner_id, created_at)?;
        tx.commit()?;

        log::info!(
            "Created {} server {} ({}) owned by {}",
            new_server.visibility.as_str(),
            new_server.name,
            server_id,
            new_server.owner_id
        );
        Ok(server_id)
    }

    /// Get a server's metadata with member count and owner codename
    pub async fn get_info(pool: &DbPool, server_id: ServerId) -> Result<Option<ServerSummary>> {
        let conn = pool.lock().await;

        match find_server_sync(&conn, server_id)? {
            Some(server) => Ok(Some(summarize_sync(&conn, server)?)),
            None => Ok(None),
        }
    }

    /// All public servers, oldest first
    pub async fn list_public(pool: &DbPool) -> Result<Vec<ServerSummary>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM servers WHERE visibility = ?1 ORDER BY created_at ASC, id ASC",
            SERVER_COLUMNS
        ))?;
        let servers = stmt
            .query_map(params![Visibility::Public.as_str()], server_from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let summaries = servers
            .into_iter()
            .map(|server| summarize_sync(&conn, server))
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(summaries)
    }

    /// Servers the user belongs to, in the order they were joined
    pub async fn list_for_user(pool: &DbPool, user_id: UserId) -> Result<Vec<UserServer>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.description, s.owner_id, s.created_at, s.visibility, s.join_secret,
                    m.joined_at
             FROM memberships m
             JOIN servers s ON s.id = m.server_id
             WHERE m.user_id = ?1
             ORDER BY m.joined_at ASC, s.id ASC",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| Ok((server_from_row(row)?, row.get::<_, i64>(7)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;

        let servers = rows
            .into_iter()
            .map(|(server, joined_at)| {
                Ok(UserServer {
                    server: summarize_sync(&conn, server)?,
                    joined_at,
                })
            })
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(servers)
    }
}

fn server_from_row(row: &Row<'_>) -> SqliteResult<Server> {
    let visibility: String = row.get(5)?;
    let visibility = Visibility::from_str(&visibility).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown visibility {:?}", visibility).into(),
        )
    })?;

    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: row.get(4)?,
        visibility,
        join_secret: row.get(6)?,
    })
}

pub(crate) fn find_server_sync(conn: &Connection, server_id: ServerId) -> SqliteResult<Option<Server>> {
    conn.query_row(
        &format!("SELECT {} FROM servers WHERE id = ?1", SERVER_COLUMNS),
        params![server_id],
        server_from_row,
    )
    .optional()
}

/// Attach member count and owner codename; drops the join secret.
fn summarize_sync(conn: &Connection, server: Server) -> SqliteResult<ServerSummary> {
    let member_count = member_count_sync(conn, server.id)?;
    let owner_codename =
        codename_for_sync(conn, server.owner_id)?.unwrap_or_else(|| UNKNOWN_CODENAME.to_string());

    Ok(ServerSummary {
        id: server.id,
        name: server.name,
        description: server.description,
        owner_id: server.owner_id,
        owner_codename,
        created_at: server.created_at,
        visibility: server.visibility,
        member_count,
    })
}
