use crate::database::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Status of a push-payment attempt.
///
/// `Pending` is the only live state; `Completed` and `Failed` are terminal
/// and never mutate again, which is what makes duplicate gateway callbacks
/// harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One push-payment attempt, keyed by the gateway-assigned checkout request
/// id. The key never changes; the receipt number is display-only.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentTransaction {
    pub transaction_id: String,
    pub merchant_request_id: String,
    pub phone_number: String,
    pub amount: i64,
    pub status: TransactionStatus,
    pub receipt_number: Option<String>,
    pub account_reference: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// A freshly accepted push request, not yet resolved by the gateway.
    pub fn pending(
        transaction_id: impl Into<String>,
        merchant_request_id: impl Into<String>,
        phone_number: impl Into<String>,
        amount: i64,
        account_reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: transaction_id.into(),
            merchant_request_id: merchant_request_id.into(),
            phone_number: phone_number.into(),
            amount,
            status: TransactionStatus::Pending,
            receipt_number: None,
            account_reference: account_reference.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of a status update against a live or terminal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    AlreadyTerminal,
}

/// Durable record of payment attempts, keyed by transaction id.
///
/// Rows are created exactly once by the gateway client on provider
/// acceptance, transitioned exactly once by callback reconciliation, and
/// read repeatedly by status watchers. Implementations must guarantee that
/// a terminal row is never overwritten.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new attempt; `StoreError::Duplicate` if the key exists.
    async fn create(&self, transaction: PaymentTransaction) -> StoreResult<()>;

    /// Fetch by transaction id; `StoreError::NotFound` if absent.
    async fn get(&self, transaction_id: &str) -> StoreResult<PaymentTransaction>;

    /// Move a pending row to `new_status`, recording the receipt when one
    /// is supplied. A terminal row is left untouched and reported as
    /// `AlreadyTerminal`; an absent row is `StoreError::NotFound`.
    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        receipt_number: Option<&str>,
    ) -> StoreResult<UpdateOutcome>;

    /// Newest attempts first, for reporting.
    async fn recent(&self, limit: i64) -> StoreResult<Vec<PaymentTransaction>>;
}

#[derive(Debug, Clone, FromRow)]
struct PaymentTransactionRow {
    transaction_id: String,
    merchant_request_id: String,
    phone_number: String,
    amount: i64,
    status: String,
    receipt_number: Option<String>,
    account_reference: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentTransactionRow {
    fn into_transaction(self) -> StoreResult<PaymentTransaction> {
        let status = TransactionStatus::parse(&self.status).ok_or_else(|| {
            StoreError::query(format!(
                "unknown status '{}' on transaction '{}'",
                self.status, self.transaction_id
            ))
        })?;
        Ok(PaymentTransaction {
            transaction_id: self.transaction_id,
            merchant_request_id: self.merchant_request_id,
            phone_number: self.phone_number,
            amount: self.amount,
            status,
            receipt_number: self.receipt_number,
            account_reference: self.account_reference,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const COLUMNS: &str = "transaction_id, merchant_request_id, phone_number, amount, status, \
                       receipt_number, account_reference, description, created_at, updated_at";

/// Postgres-backed transaction store.
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn create(&self, transaction: PaymentTransaction) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payment_transactions \
             (transaction_id, merchant_request_id, phone_number, amount, status, \
              receipt_number, account_reference, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&transaction.transaction_id)
        .bind(&transaction.merchant_request_id)
        .bind(&transaction.phone_number)
        .bind(transaction.amount)
        .bind(transaction.status.as_str())
        .bind(&transaction.receipt_number)
        .bind(&transaction.account_reference)
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = StoreError::from_sqlx(e);
            if err.is_duplicate() {
                StoreError::duplicate(&transaction.transaction_id)
            } else {
                err
            }
        })?;

        Ok(())
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<PaymentTransaction> {
        let row = sqlx::query_as::<_, PaymentTransactionRow>(&format!(
            "SELECT {COLUMNS} FROM payment_transactions WHERE transaction_id = $1",
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        match row {
            Some(row) => row.into_transaction(),
            None => Err(StoreError::not_found(transaction_id)),
        }
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        receipt_number: Option<&str>,
    ) -> StoreResult<UpdateOutcome> {
        // The pending guard is what enforces terminal-state immutability:
        // a second callback matches zero rows.
        let result = sqlx::query(
            "UPDATE payment_transactions \
             SET status = $2, receipt_number = COALESCE($3, receipt_number), updated_at = NOW() \
             WHERE transaction_id = $1 AND status = 'pending'",
        )
        .bind(transaction_id)
        .bind(new_status.as_str())
        .bind(receipt_number)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Applied);
        }

        // Zero rows: either the row is already terminal or it never existed.
        let exists = sqlx::query_scalar::<_, String>(
            "SELECT status FROM payment_transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        match exists {
            Some(_) => Ok(UpdateOutcome::AlreadyTerminal),
            None => Err(StoreError::not_found(transaction_id)),
        }
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<PaymentTransaction>> {
        let rows = sqlx::query_as::<_, PaymentTransactionRow>(&format!(
            "SELECT {COLUMNS} FROM payment_transactions ORDER BY created_at DESC LIMIT $1",
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(|r| r.into_transaction()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_only_pending_is_live() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_pending_constructor_stamps_creation() {
        let tx = PaymentTransaction::pending(
            "ws_CO_191220231020363925",
            "29115-34620561-1",
            "254712345678",
            1500,
            "DK1A2B3C4D5E",
            "Order #42",
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.receipt_number.is_none());
        assert_eq!(tx.created_at, tx.updated_at);
    }
}
