/// Message log: append-only, membership-gated chat history per server.
use rusqlite::{params, Result as SqliteResult};

use super::identity_store::codename_for_sync;
use super::membership_ledger::is_member_sync;
use super::models::{
    EnrichedMessage, Message, ServerId, UserId, ANONYMOUS_CODENAME, UNKNOWN_CODENAME,
};
use super::{now_millis, DbPool};
use crate::error::{ChatError, Result};

/// Maximum message length in characters (after trimming)
pub const MAX_CONTENT_CHARS: usize = 500;

/// Default and upper bound for `recent` history
pub const RECENT_LIMIT: usize = 100;

pub struct MessageLog;

impl MessageLog {
    /// Append a message. The author must be a member at call time.
    ///
    /// Content is trimmed and stored verbatim otherwise; escaping is left to
    /// whatever renders it.
    pub async fn send(
        pool: &DbPool,
        server_id: ServerId,
        author_id: UserId,
        content: &str,
        anonymous: bool,
    ) -> Result<Message> {
        let content = validate_content(content)?;
        let conn = pool.lock().await;

        if !is_member_sync(&conn, server_id, author_id)? {
            log::warn!("User {} tried to post to server {} without membership", author_id, server_id);
            return Err(ChatError::NotAMember);
        }

        let posted_at = now_millis();
        conn.execute(
            "INSERT INTO messages (server_id, author_id, content, anonymous, posted_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![server_id, author_id, content, anonymous, posted_at],
        )?;

        Ok(Message {
            id: conn.last_insert_rowid(),
            server_id,
            author_id,
            content: content.to_string(),
            anonymous,
            posted_at,
        })
    }

    /// The latest `limit` messages of a server in chronological order.
    ///
    /// `limit` defaults to and is capped at [`RECENT_LIMIT`]. Rows are fetched
    /// newest-first and reversed, so the result reads oldest to newest.
    pub async fn recent(
        pool: &DbPool,
        server_id: ServerId,
        requester_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<EnrichedMessage>> {
        let limit = limit.unwrap_or(RECENT_LIMIT).clamp(1, RECENT_LIMIT);
        let conn = pool.lock().await;

        if !is_member_sync(&conn, server_id, requester_id)? {
            return Err(ChatError::AccessDenied);
        }

        let mut stmt = conn.prepare(
            "SELECT id, server_id, author_id, content, anonymous, posted_at FROM messages
             WHERE server_id = ?1
             ORDER BY posted_at DESC, id DESC
             LIMIT ?2",
        )?;
        let newest_first = stmt
            .query_map(params![server_id, limit as i64], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    server_id: row.get(1)?,
                    author_id: row.get(2)?,
                    content: row.get(3)?,
                    anonymous: row.get(4)?,
                    posted_at: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut messages = Vec::with_capacity(newest_first.len());
        for message in newest_first.into_iter().rev() {
            let (author_id, author_codename) = if message.anonymous {
                (None, ANONYMOUS_CODENAME.to_string())
            } else {
                let codename = codename_for_sync(&conn, message.author_id)?
                    .unwrap_or_else(|| UNKNOWN_CODENAME.to_string());
                (Some(message.author_id), codename)
            };

            messages.push(EnrichedMessage {
                id: message.id,
                server_id: message.server_id,
                author_id,
                author_codename,
                content: message.content,
                anonymous: message.anonymous,
                posted_at: message.posted_at,
            });
        }

        Ok(messages)
    }

    /// Number of stored messages for a server
    pub async fn count_for_server(pool: &DbPool, server_id: ServerId) -> Result<u64> {
        let conn = pool.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE server_id = ?1",
            params![server_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn validate_content(content: &str) -> Result<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("Message content is required".to_string()));
    }
    if trimmed.chars().count() > MAX_CONTENT_CHARS {
        return Err(ChatError::Validation(format!(
            "Message content exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewServer, Visibility};
    use crate::db::{create_test_pool, IdentityStore, MembershipLedger, ServerRegistry};

    struct Fixture {
        pool: DbPool,
        server_id: ServerId,
        alice: UserId,
        bob: UserId,
    }

    async fn fixture() -> Fixture {
        let pool = create_test_pool();
        let alice = IdentityStore::register(&pool, "alice", "h").await.unwrap().id;
        let bob = IdentityStore::register(&pool, "bob", "h").await.unwrap().id;
        let server_id = ServerRegistry::create_server(
            &pool,
            NewServer {
                name: "general".to_string(),
                description: None,
                owner_id: alice,
                visibility: Visibility::Public,
                join_secret: None,
            },
        )
        .await
        .unwrap();
        Fixture { pool, server_id, alice, bob }
    }

    #[tokio::test]
    async fn test_send_message() {
        let f = fixture().await;

        let message = MessageLog::send(&f.pool, f.server_id, f.alice, "  hello  ", false)
            .await
            .expect("Failed to send");

        assert_eq!(message.content, "hello");
        assert_eq!(message.author_id, f.alice);
        assert!(!message.anonymous);
        assert_eq!(MessageLog::count_for_server(&f.pool, f.server_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_send_by_non_member_fails() {
        let f = fixture().await;

        let result = MessageLog::send(&f.pool, f.server_id, f.bob, "let me in", false).await;
        assert!(matches!(result, Err(ChatError::NotAMember)));
        assert_eq!(MessageLog::count_for_server(&f.pool, f.server_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_validates_content() {
        let f = fixture().await;

        let blank = MessageLog::send(&f.pool, f.server_id, f.alice, " \n\t ", false).await;
        assert!(matches!(blank, Err(ChatError::Validation(_))));

        let too_long = "x".repeat(MAX_CONTENT_CHARS + 1);
        let result = MessageLog::send(&f.pool, f.server_id, f.alice, &too_long, false).await;
        assert!(matches!(result, Err(ChatError::Validation(_))));

        // Multi-byte characters count once each
        let exact = "é".repeat(MAX_CONTENT_CHARS);
        MessageLog::send(&f.pool, f.server_id, f.alice, &exact, false)
            .await
            .expect("Message at the limit should be accepted");
    }

    #[tokio::test]
    async fn test_recent_requires_membership() {
        let f = fixture().await;
        MessageLog::send(&f.pool, f.server_id, f.alice, "members only", false)
            .await
            .unwrap();

        let result = MessageLog::recent(&f.pool, f.server_id, f.bob, None).await;
        assert!(matches!(result, Err(ChatError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_recent_is_chronological() {
        let f = fixture().await;
        for text in ["one", "two", "three"] {
            MessageLog::send(&f.pool, f.server_id, f.alice, text, false).await.unwrap();
        }

        let messages = MessageLog::recent(&f.pool, f.server_id, f.alice, None)
            .await
            .expect("Failed to fetch");
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(messages.windows(2).all(|w| w[0].posted_at <= w[1].posted_at));
    }

    #[tokio::test]
    async fn test_recent_keeps_newest_when_limited() {
        let f = fixture().await;
        for i in 0..5 {
            MessageLog::send(&f.pool, f.server_id, f.alice, &format!("m{}", i), false)
                .await
                .unwrap();
        }

        let messages = MessageLog::recent(&f.pool, f.server_id, f.alice, Some(2))
            .await
            .unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn test_recent_caps_limit() {
        let f = fixture().await;
        for i in 0..(RECENT_LIMIT + 5) {
            MessageLog::send(&f.pool, f.server_id, f.alice, &format!("m{}", i), false)
                .await
                .unwrap();
        }

        let messages = MessageLog::recent(&f.pool, f.server_id, f.alice, Some(10_000))
            .await
            .unwrap();
        assert_eq!(messages.len(), RECENT_LIMIT);
        assert_eq!(messages.last().unwrap().content, format!("m{}", RECENT_LIMIT + 4));
    }

    #[tokio::test]
    async fn test_anonymous_messages_hide_author() {
        let f = fixture().await;
        MembershipLedger::join(&f.pool, f.server_id, f.bob, None).await.unwrap();
        MessageLog::send(&f.pool, f.server_id, f.bob, "guess who", true).await.unwrap();
        MessageLog::send(&f.pool, f.server_id, f.bob, "it's bob", false).await.unwrap();

        for requester in [f.alice, f.bob] {
            let messages = MessageLog::recent(&f.pool, f.server_id, requester, None)
                .await
                .unwrap();
            assert_eq!(messages[0].author_codename, ANONYMOUS_CODENAME);
            assert_eq!(messages[0].author_id, None);
            assert_eq!(messages[1].author_codename, "bob");
            assert_eq!(messages[1].author_id, Some(f.bob));
        }
    }

    #[tokio::test]
    async fn test_unresolvable_author_renders_unknown() {
        let f = fixture().await;
        MessageLog::send(&f.pool, f.server_id, f.alice, "ghost", false).await.unwrap();

        {
            let conn = f.pool.lock().await;
            conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
            conn.execute("UPDATE messages SET author_id = 4242", []).unwrap();
            conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        }

        let messages = MessageLog::recent(&f.pool, f.server_id, f.alice, None).await.unwrap();
        assert_eq!(messages[0].author_codename, UNKNOWN_CODENAME);
    }
}
