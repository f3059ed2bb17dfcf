/// Retention sweeper: periodically deletes messages older than the
/// retention window.
///
/// Each pass snapshots the ids of expired messages and deletes exactly those
/// ids inside one transaction. Messages written after the snapshot are never
/// touched by that pass, and re-running a pass is a no-op.
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, Result as SqliteResult};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::db::models::MessageId;
use crate::db::DbPool;
use crate::error::Result;

/// Messages older than this are eligible for deletion
pub const DEFAULT_RETENTION_HOURS: u32 = 24;

/// Upper bound accepted for the retention window (ten years)
pub const MAX_RETENTION_HOURS: u32 = 24 * 365 * 10;

/// How often the sweeper runs
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Delete every message posted before `now - retention`.
/// Returns the number of messages removed.
pub async fn sweep_expired(
    pool: &DbPool,
    now: DateTime<Utc>,
    retention: ChronoDuration,
) -> Result<usize> {
    let cutoff = (now - retention).timestamp_millis();
    let mut conn = pool.lock().await;
    let tx = conn.transaction()?;

    let expired: Vec<MessageId> = {
        let mut stmt = tx.prepare("SELECT id FROM messages WHERE posted_at < ?1")?;
        let ids = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        ids
    };

    let mut deleted = 0;
    for id in &expired {
        deleted += tx.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
    }
    tx.commit()?;

    Ok(deleted)
}

#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    pool: DbPool,
    retention: ChronoDuration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(pool: DbPool, retention: ChronoDuration, interval: Duration) -> Self {
        RetentionSweeper {
            pool,
            retention,
            interval,
        }
    }

    /// Sweeper with the 24 hour window and hourly cadence
    pub fn with_defaults(pool: DbPool) -> Self {
        Self::new(
            pool,
            ChronoDuration::hours(i64::from(DEFAULT_RETENTION_HOURS)),
            Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        )
    }

    /// Run a single pass against the wall clock
    pub async fn run_once(&self) -> Result<usize> {
        let deleted = sweep_expired(&self.pool, Utc::now(), self.retention).await?;
        log::info!("Retention sweep removed {} expired message(s)", deleted);
        Ok(deleted)
    }

    /// Start the periodic sweep on the current runtime.
    ///
    /// The first pass runs immediately. A failed pass is logged and the loop
    /// keeps going; abort the returned handle to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        log::info!(
            "Starting retention sweeper: window {}h, every {}s",
            self.retention.num_hours(),
            self.interval.as_secs()
        );

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.interval);
            loop {
                tick.tick().await;
                if let Err(e) = self.run_once().await {
                    log::error!("Retention sweep failed: {}", e);
                }
            }
        })
    }
}
