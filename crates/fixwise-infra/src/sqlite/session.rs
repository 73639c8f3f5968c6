//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `fixwise-core` using sqlx with split
//! read/write pools. The full session is stored as a JSON document; mode,
//! turn count and timestamps are denormalized into columns for listing and
//! idle sweeps.

use chrono::{DateTime, Utc};
use sqlx::Row;

use fixwise_core::session::SessionStore;
use fixwise_types::error::RepositoryError;
use fixwise_types::session::{Session, SessionId, SessionMode};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Most recently active sessions first, without loading full records.
    pub async fn list(&self, limit: u32) -> Result<Vec<SessionSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, mode, turn_count, created_at, last_activity_ms FROM sessions \
             ORDER BY last_activity_ms DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                SummaryRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))
                    .and_then(SummaryRow::into_summary)
            })
            .collect()
    }
}

/// Listing view of a stored session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub mode: SessionMode,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    record: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            record: row.try_get("record")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let session: Session = serde_json::from_str(&self.record)
            .map_err(|e| RepositoryError::Query(format!("invalid session record: {e}")))?;
        if session.id.as_str() != self.id {
            return Err(RepositoryError::Conflict(format!(
                "record for '{}' carries id '{}'",
                self.id, session.id
            )));
        }
        Ok(session)
    }
}

struct SummaryRow {
    id: String,
    mode: String,
    turn_count: i64,
    created_at: String,
    last_activity_ms: i64,
}

impl SummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            mode: row.try_get("mode")?,
            turn_count: row.try_get("turn_count")?,
            created_at: row.try_get("created_at")?,
            last_activity_ms: row.try_get("last_activity_ms")?,
        })
    }

    fn into_summary(self) -> Result<SessionSummary, RepositoryError> {
        let mode: SessionMode = self
            .mode
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let last_activity_at = DateTime::<Utc>::from_timestamp_millis(self.last_activity_ms)
            .ok_or_else(|| {
                RepositoryError::Query(format!("invalid timestamp: {}", self.last_activity_ms))
            })?;

        Ok(SessionSummary {
            id: SessionId::new(self.id),
            mode,
            turn_count: self.turn_count.max(0) as usize,
            created_at: parse_datetime(&self.created_at)?,
            last_activity_at,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT id, record FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let record = serde_json::to_string(session)
            .map_err(|e| RepositoryError::Query(format!("failed to encode session: {e}")))?;

        sqlx::query(
            r#"INSERT INTO sessions (id, mode, record, turn_count, created_at, last_activity_ms)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   mode = excluded.mode,
                   record = excluded.record,
                   turn_count = excluded.turn_count,
                   last_activity_ms = excluded.last_activity_ms"#,
        )
        .bind(session.id.as_str())
        .bind(session.mode().to_string())
        .bind(&record)
        .bind(session.history().len() as i64)
        .bind(format_datetime(&session.created_at))
        .bind(session.last_activity_at.timestamp_millis())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_idle(&self, before: DateTime<Utc>) -> Result<Vec<SessionId>, RepositoryError> {
        let rows = sqlx::query("DELETE FROM sessions WHERE last_activity_ms < ? RETURNING id")
            .bind(before.timestamp_millis())
            .fetch_all(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("id")
                    .map(SessionId::new)
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }
}
