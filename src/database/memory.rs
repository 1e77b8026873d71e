//! In-memory store implementations backing tests and local development,
//! honoring the same contracts as the Postgres stores.

use crate::database::callback_log::{CallbackEvent, CallbackLog};
use crate::database::error::{StoreError, StoreResult};
use crate::database::orders::{Order, OrderStore};
use crate::database::payment_store::{
    PaymentTransaction, TransactionStatus, TransactionStore, UpdateOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryTransactionStore {
    rows: RwLock<HashMap<String, PaymentTransaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, transaction: PaymentTransaction) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&transaction.transaction_id) {
            return Err(StoreError::duplicate(&transaction.transaction_id));
        }
        rows.insert(transaction.transaction_id.clone(), transaction);
        Ok(())
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<PaymentTransaction> {
        self.rows
            .read()
            .await
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(transaction_id))
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        receipt_number: Option<&str>,
    ) -> StoreResult<UpdateOutcome> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(transaction_id)
            .ok_or_else(|| StoreError::not_found(transaction_id))?;

        if row.status.is_terminal() {
            return Ok(UpdateOutcome::AlreadyTerminal);
        }

        row.status = new_status;
        if let Some(receipt) = receipt_number {
            row.receipt_number = Some(receipt.to_string());
        }
        row.updated_at = Utc::now();
        Ok(UpdateOutcome::Applied)
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<PaymentTransaction>> {
        let mut all: Vec<_> = self.rows.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    rows: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: Uuid) -> Option<Order> {
        self.rows.read().await.get(&order_id).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&order.order_id) {
            return Err(StoreError::duplicate(order.order_id.to_string()));
        }
        rows.insert(order.order_id, order);
        Ok(())
    }

    async fn attach_transaction(&self, order_id: Uuid, transaction_id: &str) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        let order = rows
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found(order_id.to_string()))?;
        order.transaction_id = Some(transaction_id.to_string());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<Order>> {
        let mut all: Vec<_> = self.rows.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryCallbackLog {
    rows: RwLock<Vec<CallbackEvent>>,
}

impl InMemoryCallbackLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallbackLog for InMemoryCallbackLog {
    async fn record(&self, payload: serde_json::Value) -> StoreResult<Uuid> {
        let event = CallbackEvent {
            id: Uuid::new_v4(),
            payload,
            processed: false,
            error: None,
            received_at: Utc::now(),
        };
        let id = event.id;
        self.rows.write().await.push(event);
        Ok(id)
    }

    async fn mark_processed(&self, id: Uuid) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        let event = rows
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        event.processed = true;
        event.error = None;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        let event = rows
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        event.error = Some(error.to_string());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<CallbackEvent>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
