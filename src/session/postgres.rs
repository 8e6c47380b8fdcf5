/// Postgres Session Store
///
/// Backed by the `devices` table (see `migrations/`). Rotation is a single
/// conditional UPDATE: the WHERE clause carries the presented refresh token, so
/// two concurrent rotations of one session cannot both match a row. Under
/// READ COMMITTED the second UPDATE re-evaluates its predicate against the
/// committed row and affects zero rows.
///
/// The UPDATE runs in its own transaction with `SET LOCAL statement_timeout`
/// matching the store deadline, so the server abandons a stalled rotation
/// instead of committing it after the handler has already answered 500. A
/// future dropped before `commit` rolls the transaction back.

use sqlx::PgPool;
use std::time::Duration;

use crate::error::StoreError;
use crate::session::model::{RotateOutcome, RotateTokens, Session};
use crate::session::store::SessionStore;

const SESSION_COLUMNS: &str =
    "device_id, user_id, server_name, access_token, refresh_token, created_at, last_seen_at";

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Bound every rotation on the server side as well
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn lookup_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM devices WHERE refresh_token = $1",
            SESSION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn lookup_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM devices WHERE access_token = $1",
            SESSION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn rotate_tokens(&self, request: &RotateTokens) -> Result<RotateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.statement_timeout {
            sqlx::query(&statement_timeout_sql(timeout))
                .execute(&mut tx)
                .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE devices
            SET access_token = $1, refresh_token = $2
            WHERE device_id = $3 AND user_id = $4 AND refresh_token = $5
            "#,
        )
        .bind(&request.new_access_token)
        .bind(&request.new_refresh_token)
        .bind(&request.device_id)
        .bind(&request.user_id)
        .bind(&request.old_refresh_token)
        .execute(&mut tx)
        .await?;

        match result.rows_affected() {
            0 => Ok(RotateOutcome::LostRace),
            1 => {
                tx.commit().await?;
                Ok(RotateOutcome::Committed)
            }
            n => Err(StoreError::Query(format!(
                "rotation matched {} rows for one device",
                n
            ))),
        }
    }

    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO devices
                (device_id, user_id, server_name, access_token, refresh_token, created_at, last_seen_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&session.device_id)
        .bind(&session.user_id)
        .bind(&session.server_name)
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.created_at)
        .bind(session.last_seen_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// `SET LOCAL` takes no bind parameters; the value is always an integer
fn statement_timeout_sql(timeout: Duration) -> String {
    format!("SET LOCAL statement_timeout = {}", timeout.as_millis().max(1))
}
