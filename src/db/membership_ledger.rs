/// Membership ledger: who belongs to which server.
///
/// The UNIQUE `(server_id, user_id)` index is the source of truth for
/// "already a member". Inserts use `ON CONFLICT DO NOTHING` and read the
/// affected-row count, so two racing joins can never leave two rows.
use rusqlite::{params, Connection, Result as SqliteResult};

use super::models::{JoinOutcome, Membership, ServerId, UserId, Visibility};
use super::server_registry::find_server_sync;
use super::{now_millis, DbPool};
use crate::error::{foreign_key_violation, ChatError, Result};

pub struct MembershipLedger;

impl MembershipLedger {
    /// Join a server, optionally presenting its secret.
    ///
    /// Private servers require `supplied_secret` to equal the stored secret
    /// exactly; a private server without a stored secret can only be entered
    /// by invite. Joining twice is a successful no-op.
    pub async fn join(
        pool: &DbPool,
        server_id: ServerId,
        user_id: UserId,
        supplied_secret: Option<&str>,
    ) -> Result<JoinOutcome> {
        let conn = pool.lock().await;

        let server = find_server_sync(&conn, server_id)?
            .ok_or(ChatError::ServerNotFound(server_id))?;

        if server.visibility == Visibility::Private {
            let authorized = match (server.join_secret.as_deref(), supplied_secret) {
                (Some(expected), Some(supplied)) => expected == supplied,
                _ => false,
            };
            if !authorized {
                log::debug!("Rejected join of user {} to server {}: bad secret", user_id, server_id);
                return Err(ChatError::InvalidSecret);
            }
        }

        let outcome = enroll_sync(&conn, server_id, user_id)?;
        if outcome == JoinOutcome::Joined {
            log::info!("User {} joined server {}", user_id, server_id);
        }
        Ok(outcome)
    }

    /// Add `target_user_id` on the owner's authority.
    ///
    /// Only the server owner may invite, on public and private servers alike.
    /// Ownership replaces the secret check.
    pub async fn invite(
        pool: &DbPool,
        server_id: ServerId,
        requester_id: UserId,
        target_user_id: UserId,
    ) -> Result<JoinOutcome> {
        let conn = pool.lock().await;

        let server = find_server_sync(&conn, server_id)?
            .ok_or(ChatError::ServerNotFound(server_id))?;

        if server.owner_id != requester_id {
            log::warn!(
                "User {} tried to invite into server {} owned by {}",
                requester_id,
                server_id,
                server.owner_id
            );
            return Err(ChatError::NotOwner);
        }

        let outcome = enroll_sync(&conn, server_id, target_user_id)?;
        if outcome == JoinOutcome::Joined {
            log::info!("User {} invited {} to server {}", requester_id, target_user_id, server_id);
        }
        Ok(outcome)
    }

    /// Membership check used as the access gate for messages
    pub async fn is_member(pool: &DbPool, server_id: ServerId, user_id: UserId) -> Result<bool> {
        let conn = pool.lock().await;
        Ok(is_member_sync(&conn, server_id, user_id)?)
    }

    /// All memberships held by a user, oldest first
    pub async fn list_for_user(pool: &DbPool, user_id: UserId) -> Result<Vec<Membership>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(
            "SELECT server_id, user_id, joined_at FROM memberships
             WHERE user_id = ?1 ORDER BY joined_at ASC, server_id ASC",
        )?;
        let memberships = stmt
            .query_map(params![user_id], membership_from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(memberships)
    }

    /// All memberships of a server, oldest first
    pub async fn list_for_server(pool: &DbPool, server_id: ServerId) -> Result<Vec<Membership>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(
            "SELECT server_id, user_id, joined_at FROM memberships
             WHERE server_id = ?1 ORDER BY joined_at ASC, user_id ASC",
        )?;
        let memberships = stmt
            .query_map(params![server_id], membership_from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(memberships)
    }

    pub async fn member_count(pool: &DbPool, server_id: ServerId) -> Result<u64> {
        let conn = pool.lock().await;
        Ok(member_count_sync(&conn, server_id)?)
    }
}

fn membership_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<Membership> {
    Ok(Membership {
        server_id: row.get(0)?,
        user_id: row.get(1)?,
        joined_at: row.get(2)?,
    })
}

/// Enroll a user in an existing server. A user id with no account behind it
/// is reported as `UserNotFound`.
fn enroll_sync(conn: &Connection, server_id: ServerId, user_id: UserId) -> Result<JoinOutcome> {
    insert_membership_sync(conn, server_id, user_id, now_millis()).map_err(|e| {
        if foreign_key_violation(&e) {
            log::debug!("Rejected membership in server {} for unknown user {}", server_id, user_id);
            ChatError::UserNotFound(user_id)
        } else {
            e.into()
        }
    })
}

/// Insert a membership unless the pair already exists.
pub(crate) fn insert_membership_sync(
    conn: &Connection,
    server_id: ServerId,
    user_id: UserId,
    joined_at: i64,
) -> SqliteResult<JoinOutcome> {
    let inserted = conn.execute(
        "INSERT INTO memberships (server_id, user_id, joined_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(server_id, user_id) DO NOTHING",
        params![server_id, user_id, joined_at],
    )?;

    Ok(if inserted == 0 {
        JoinOutcome::AlreadyMember
    } else {
        JoinOutcome::Joined
    })
}

pub(crate) fn is_member_sync(
    conn: &Connection,
    server_id: ServerId,
    user_id: UserId,
) -> SqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM memberships WHERE server_id = ?1 AND user_id = ?2)",
        params![server_id, user_id],
        |row| row.get(0),
    )
}

pub(crate) fn member_count_sync(conn: &Connection, server_id: ServerId) -> SqliteResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memberships WHERE server_id = ?1",
        params![server_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewServer;
    use crate::db::{create_test_pool, IdentityStore, ServerRegistry};

    async fn setup_server(pool: &DbPool, visibility: Visibility, secret: Option<&str>) -> (UserId, ServerId) {
        let owner = IdentityStore::register(pool, "owner", "h")
            .await
            .expect("Failed to register owner");
        let server_id = ServerRegistry::create_server(
            pool,
            NewServer {
                name: "hideout".to_string(),
                description: None,
                owner_id: owner.id,
                visibility,
                join_secret: secret.map(str::to_string),
            },
        )
        .await
        .expect("Failed to create server");
        (owner.id, server_id)
    }

    #[tokio::test]
    async fn test_join_public_server() {
        let pool = create_test_pool();
        let (_, server_id) = setup_server(&pool, Visibility::Public, None).await;
        let bob = IdentityStore::register(&pool, "bob", "h").await.unwrap();

        let outcome = MembershipLedger::join(&pool, server_id, bob.id, None)
            .await
            .expect("Join failed");
        assert_eq!(outcome, JoinOutcome::Joined);
        assert!(MembershipLedger::is_member(&pool, server_id, bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_join_missing_server() {
        let pool = create_test_pool();
        let result = MembershipLedger::join(&pool, 404, 1, None).await;
        assert!(matches!(result, Err(ChatError::ServerNotFound(404))));
    }

    #[tokio::test]
    async fn test_join_private_server_requires_secret() {
        let pool = create_test_pool();
        let (_, server_id) = setup_server(&pool, Visibility::Private, Some("xyz")).await;
        let carol = IdentityStore::register(&pool, "carol", "h").await.unwrap();

        for bad in [None, Some("wrong"), Some("XYZ")] {
            let result = MembershipLedger::join(&pool, server_id, carol.id, bad).await;
            assert!(matches!(result, Err(ChatError::InvalidSecret)));
        }
        assert!(!MembershipLedger::is_member(&pool, server_id, carol.id).await.unwrap());

        let outcome = MembershipLedger::join(&pool, server_id, carol.id, Some("xyz"))
            .await
            .expect("Join with correct secret failed");
        assert_eq!(outcome, JoinOutcome::Joined);
    }

    #[tokio::test]
    async fn test_private_server_without_secret_is_invite_only() {
        let pool = create_test_pool();
        let (_, server_id) = setup_server(&pool, Visibility::Private, None).await;
        let dave = IdentityStore::register(&pool, "dave", "h").await.unwrap();

        let result = MembershipLedger::join(&pool, server_id, dave.id, None).await;
        assert!(matches!(result, Err(ChatError::InvalidSecret)));
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let pool = create_test_pool();
        let (_, server_id) = setup_server(&pool, Visibility::Private, Some("xyz")).await;
        let erin = IdentityStore::register(&pool, "erin", "h").await.unwrap();

        MembershipLedger::join(&pool, server_id, erin.id, Some("xyz")).await.unwrap();
        let count_before = MembershipLedger::member_count(&pool, server_id).await.unwrap();

        let outcome = MembershipLedger::join(&pool, server_id, erin.id, Some("xyz"))
            .await
            .expect("Second join should succeed");
        assert_eq!(outcome, JoinOutcome::AlreadyMember);
        assert_eq!(
            MembershipLedger::member_count(&pool, server_id).await.unwrap(),
            count_before
        );
    }

    #[tokio::test]
    async fn test_invite_by_non_owner_fails_even_when_public() {
        let pool = create_test_pool();
        let (_, server_id) = setup_server(&pool, Visibility::Public, None).await;
        let mallory = IdentityStore::register(&pool, "mallory", "h").await.unwrap();
        let frank = IdentityStore::register(&pool, "frank", "h").await.unwrap();
        MembershipLedger::join(&pool, server_id, mallory.id, None).await.unwrap();

        let result = MembershipLedger::invite(&pool, server_id, mallory.id, frank.id).await;
        assert!(matches!(result, Err(ChatError::NotOwner)));
        assert!(!MembershipLedger::is_member(&pool, server_id, frank.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_invite_bypasses_secret() {
        let pool = create_test_pool();
        let (owner_id, server_id) = setup_server(&pool, Visibility::Private, Some("xyz")).await;
        let grace = IdentityStore::register(&pool, "grace", "h").await.unwrap();

        let outcome = MembershipLedger::invite(&pool, server_id, owner_id, grace.id)
            .await
            .expect("Owner invite failed");
        assert_eq!(outcome, JoinOutcome::Joined);

        let again = MembershipLedger::invite(&pool, server_id, owner_id, grace.id)
            .await
            .expect("Repeat invite failed");
        assert_eq!(again, JoinOutcome::AlreadyMember);
    }

    #[tokio::test]
    async fn test_invite_missing_server() {
        let pool = create_test_pool();
        let result = MembershipLedger::invite(&pool, 77, 1, 2).await;
        assert!(matches!(result, Err(ChatError::ServerNotFound(77))));
    }

    #[tokio::test]
    async fn test_unknown_user_cannot_be_enrolled() {
        let pool = create_test_pool();
        let (owner_id, server_id) = setup_server(&pool, Visibility::Public, None).await;

        let result = MembershipLedger::invite(&pool, server_id, owner_id, 9999).await;
        assert!(matches!(result, Err(ChatError::UserNotFound(9999))));

        let result = MembershipLedger::join(&pool, server_id, 9999, None).await;
        assert!(matches!(result, Err(ChatError::UserNotFound(9999))));

        assert_eq!(MembershipLedger::member_count(&pool, server_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_for_user_and_server() {
        let pool = create_test_pool();
        let (owner_id, server_id) = setup_server(&pool, Visibility::Public, None).await;
        let heidi = IdentityStore::register(&pool, "heidi", "h").await.unwrap();
        MembershipLedger::join(&pool, server_id, heidi.id, None).await.unwrap();

        let members = MembershipLedger::list_for_server(&pool, server_id).await.unwrap();
        let ids: Vec<UserId> = members.iter().map(|m| m.user_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&owner_id));
        assert!(ids.contains(&heidi.id));

        let heidi_servers = MembershipLedger::list_for_user(&pool, heidi.id).await.unwrap();
        assert_eq!(heidi_servers.len(), 1);
        assert_eq!(heidi_servers[0].server_id, server_id);
    }

    #[tokio::test]
    async fn test_concurrent_joins_create_single_membership() {
        let pool = create_test_pool();
        let (_, server_id) = setup_server(&pool, Visibility::Public, None).await;
        let ivan_id = IdentityStore::register(&pool, "ivan", "h").await.unwrap().id;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                MembershipLedger::join(&pool, server_id, ivan_id, None).await
            }));
        }

        let mut joined = 0;
        for handle in handles {
            if handle.await.unwrap().expect("Join failed") == JoinOutcome::Joined {
                joined += 1;
            }
        }

        assert_eq!(joined, 1);
        let members = MembershipLedger::list_for_server(&pool, server_id).await.unwrap();
        assert_eq!(members.iter().filter(|m| m.user_id == ivan_id).count(), 1);
    }
}
