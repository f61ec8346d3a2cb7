// src/session/store.rs
//! SQLite-backed session persistence. Sessions are stored as one row per
//! session with the base input and image list as JSON document columns.
//!
//! Expiry is explicit: every read filters on `created_at`, and a background
//! sweeper deletes rows past the TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

use super::{GeneratedImage, Session, StoredPart};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

pub struct SessionStore {
    pool: SqlitePool,
    ttl_secs: i64,
}

impl SessionStore {
    pub async fn new(pool: SqlitePool, ttl_secs: i64) -> ApiResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                art_form TEXT NOT NULL,
                product_type TEXT NOT NULL,
                base_input TEXT NOT NULL,
                images TEXT NOT NULL,
                current_turn INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions (created_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool, ttl_secs })
    }

    fn expiry_cutoff(&self) -> i64 {
        Utc::now().timestamp() - self.ttl_secs
    }

    /// Persist a new session. The caller generates the id; a collision is an
    /// invariant violation, not a user error.
    pub async fn create(&self, session: &Session) -> ApiResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions
                (session_id, art_form, product_type, base_input, images, current_turn, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.art_form)
        .bind(&session.product_type)
        .bind(serde_json::to_string(&session.base_input)?)
        .bind(serde_json::to_string(&session.images)?)
        .bind(session.current_turn as i64)
        .bind(session.created_at.timestamp())
        .bind(session.updated_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let collision = err
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                if collision {
                    Err(ApiError::storage(format!(
                        "Session id collision: {}",
                        session.session_id
                    )))
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Append a modification batch. Every image is stamped with `new_turn`,
    /// which must be exactly one past the stored turn; the update is a
    /// compare-and-swap so concurrent modifies surface as conflicts instead
    /// of lost turns.
    pub async fn append(
        &self,
        session_id: &str,
        new_images: Vec<GeneratedImage>,
        new_turn: u32,
    ) -> ApiResult<Session> {
        let mut session = self.get(session_id).await?;
        if new_turn != session.current_turn + 1 {
            return Err(ApiError::conflict(format!(
                "Session {session_id} advanced concurrently"
            )));
        }

        let stamped: Vec<GeneratedImage> = new_images
            .into_iter()
            .map(|mut image| {
                image.turn = new_turn;
                image
            })
            .collect();

        let mut images = session.images.clone();
        images.extend(stamped);
        let updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET images = ?, current_turn = ?, updated_at = ?
            WHERE session_id = ? AND current_turn = ?
            "#,
        )
        .bind(serde_json::to_string(&images)?)
        .bind(new_turn as i64)
        .bind(updated_at.timestamp())
        .bind(session_id)
        .bind(session.current_turn as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::conflict(format!(
                "Session {session_id} advanced concurrently"
            )));
        }

        session.images = images;
        session.current_turn = new_turn;
        session.updated_at = updated_at;
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> ApiResult<Session> {
        let row = sqlx::query(
            "SELECT * FROM sessions WHERE session_id = ? AND created_at > ?",
        )
        .bind(session_id)
        .bind(self.expiry_cutoff())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_session(&row),
            None => Err(ApiError::not_found("Session not found or expired")),
        }
    }

    /// Live sessions newest-first, plus the total live count.
    pub async fn list(&self, limit: i64, skip: i64) -> ApiResult<(Vec<Session>, i64)> {
        let cutoff = self.expiry_cutoff();

        let rows = sqlx::query(
            r#"
            SELECT * FROM sessions
            WHERE created_at > ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        let sessions = rows
            .iter()
            .map(row_to_session)
            .collect::<ApiResult<Vec<_>>>()?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM sessions WHERE created_at > ?")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?
            .get("n");

        Ok((sessions, total))
    }

    /// Delete expired rows; returns how many were removed.
    pub async fn purge_expired(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE created_at <= ?")
            .bind(self.expiry_cutoff())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_session(row: &SqliteRow) -> ApiResult<Session> {
    let base_input: Vec<StoredPart> = serde_json::from_str(row.get("base_input"))?;
    let images: Vec<GeneratedImage> = serde_json::from_str(row.get("images"))?;

    Ok(Session {
        session_id: row.get("session_id"),
        art_form: row.get("art_form"),
        product_type: row.get("product_type"),
        base_input,
        images,
        current_turn: row.get::<i64, _>("current_turn") as u32,
        created_at: timestamp_to_datetime(row.get("created_at"))?,
        updated_at: timestamp_to_datetime(row.get("updated_at"))?,
    })
}

fn timestamp_to_datetime(secs: i64) -> ApiResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ApiError::storage(format!("Corrupt timestamp in session row: {secs}")))
}

/// Spawn the background expiry sweep.
///
/// `interval` is the time between sweep passes.
pub fn spawn_expiry_sweeper(
    store: Arc<SessionStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!("Expiry sweep removed {purged} sessions"),
                Err(err) => warn!("Expiry sweep failed: {err}"),
            }
            tokio::time::sleep(interval).await;
        }
    })
}
