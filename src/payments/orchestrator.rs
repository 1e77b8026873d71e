//! Checkout orchestration
//!
//! Ties one storefront order to one push-payment attempt: persist the
//! order, derive a fresh statement reference, fire the push, and attach
//! the accepted transaction to the order. Retried checkouts mint a new
//! reference and a new transaction; nothing here reuses identifiers.

use crate::database::orders::{Order, OrderStore};
use crate::database::payment_store::{PaymentTransaction, TransactionStore};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::poller::{PollOutcome, StatusPoller};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{CheckoutReceipt, InitiateRequest, OrderDraft, SessionContext};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct CheckoutOrchestrator {
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn TransactionStore>,
    poller: StatusPoller,
}

impl CheckoutOrchestrator {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn TransactionStore>,
        poller: StatusPoller,
    ) -> Self {
        Self {
            orders,
            gateway,
            store,
            poller,
        }
    }

    /// Record an order and initiate its push payment.
    ///
    /// Input is validated before any row is written. The order row is
    /// created first; gateway rejection leaves it without an attached
    /// transaction and propagates to the caller, whose retry goes through
    /// the same path with a fresh reference.
    pub async fn place_order(
        &self,
        ctx: &SessionContext,
        draft: OrderDraft,
    ) -> PaymentResult<CheckoutReceipt> {
        if !draft.amount.is_finite() || draft.amount <= 0.0 {
            return Err(PaymentError::initiation_rejected(
                "amount must be a positive number",
            ));
        }
        if draft.phone_number.trim().is_empty() {
            return Err(PaymentError::initiation_rejected("phone number is required"));
        }

        let order = Order::new(
            &ctx.account_id,
            &draft.phone_number,
            draft.amount,
            &draft.description,
        );
        let order_id = order.order_id;
        self.orders.create(order).await?;

        let reference = order_reference(order_id);
        let outcome = self
            .gateway
            .initiate(InitiateRequest {
                phone_number: draft.phone_number,
                amount: draft.amount,
                account_reference: reference,
                description: draft.description,
            })
            .await?;

        self.orders
            .attach_transaction(order_id, &outcome.transaction_id)
            .await?;

        info!(
            order_id = %order_id,
            transaction_id = %outcome.transaction_id,
            account_id = %ctx.account_id,
            "Checkout initiated"
        );

        Ok(CheckoutReceipt {
            order_id,
            transaction_id: outcome.transaction_id,
            customer_message: outcome.customer_message,
        })
    }

    /// Block until the payment resolves or the configured deadline passes.
    pub async fn await_outcome(&self, transaction_id: &str) -> PollOutcome {
        self.poller.watch(transaction_id).await
    }

    /// Current stored state of one payment attempt.
    pub async fn payment_status(&self, transaction_id: &str) -> PaymentResult<PaymentTransaction> {
        Ok(self.store.get(transaction_id).await?)
    }

    /// Recent orders for reporting. Admin role required.
    pub async fn recent_orders(
        &self,
        ctx: &SessionContext,
        limit: i64,
    ) -> PaymentResult<Vec<Order>> {
        if !ctx.role.is_admin() {
            return Err(PaymentError::forbidden("admin role required"));
        }
        Ok(self.orders.recent(limit).await?)
    }
}

/// Statement reference for one payment attempt: `DK` plus ten hex chars
/// derived from the order id, the current time and a nonce. Twelve chars
/// total, unique per attempt, within the gateway's reference length limit.
fn order_reference(order_id: Uuid) -> String {
    let input = format!(
        "{}:{}:{}",
        order_id,
        Utc::now().timestamp_millis(),
        Uuid::new_v4()
    );
    let digest = Sha256::digest(input.as_bytes());
    format!("DK{}", &hex::encode(digest)[..10].to_uppercase())
}
