use crate::database::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Audit record of one inbound gateway callback, stored verbatim before any
/// parsing so malformed or unmatched deliveries are never lost.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CallbackEvent {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[async_trait]
pub trait CallbackLog: Send + Sync {
    /// Persist a raw callback body as received, returning the audit id.
    async fn record(&self, payload: serde_json::Value) -> StoreResult<Uuid>;

    /// Mark a recorded callback as reconciled against the payment store.
    async fn mark_processed(&self, id: Uuid) -> StoreResult<()>;

    /// Mark a recorded callback as unreconcilable, keeping the reason.
    async fn record_failure(&self, id: Uuid, error: &str) -> StoreResult<()>;

    /// Newest callbacks first, for inspection.
    async fn recent(&self, limit: i64) -> StoreResult<Vec<CallbackEvent>>;
}

/// Postgres-backed callback audit log.
pub struct PgCallbackLog {
    pool: PgPool,
}

impl PgCallbackLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallbackLog for PgCallbackLog {
    async fn record(&self, payload: serde_json::Value) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO callback_events (id, payload, processed, error, received_at) \
             VALUES ($1, $2, FALSE, NULL, $3)",
        )
        .bind(id)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(id)
    }

    async fn mark_processed(&self, id: Uuid) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE callback_events SET processed = TRUE, error = NULL WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(id.to_string()));
        }
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE callback_events SET error = $2 WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(id.to_string()));
        }
        Ok(())
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<CallbackEvent>> {
        sqlx::query_as::<_, CallbackEvent>(
            "SELECT id, payload, processed, error, received_at \
             FROM callback_events ORDER BY received_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }
}
