use crate::database::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A storefront order awaiting (or holding) a payment attempt.
///
/// `transaction_id` stays `None` until the gateway accepts a push for this
/// order; a retried checkout overwrites it with the newest attempt.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub account_id: String,
    pub phone_number: String,
    /// Cart total as submitted; the charged whole-unit amount lives on the
    /// payment transaction row.
    pub amount: f64,
    pub description: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        account_id: impl Into<String>,
        phone_number: impl Into<String>,
        amount: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            account_id: account_id.into(),
            phone_number: phone_number.into(),
            amount,
            description: description.into(),
            transaction_id: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: Order) -> StoreResult<()>;

    /// Record the payment attempt accepted for this order. Later attempts
    /// replace earlier ones; `StoreError::NotFound` if the order is absent.
    async fn attach_transaction(&self, order_id: Uuid, transaction_id: &str) -> StoreResult<()>;

    /// Newest orders first, for reporting.
    async fn recent(&self, limit: i64) -> StoreResult<Vec<Order>>;
}

/// Postgres-backed order store.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, order: Order) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO orders \
             (order_id, account_id, phone_number, amount, description, transaction_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.order_id)
        .bind(&order.account_id)
        .bind(&order.phone_number)
        .bind(order.amount)
        .bind(&order.description)
        .bind(&order.transaction_id)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    async fn attach_transaction(&self, order_id: Uuid, transaction_id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET transaction_id = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(transaction_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(order_id.to_string()));
        }
        Ok(())
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<Order>> {
        sqlx::query_as::<_, Order>(
            "SELECT order_id, account_id, phone_number, amount, description, transaction_id, \
             created_at FROM orders ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }
}
