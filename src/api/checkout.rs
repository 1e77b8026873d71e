use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database::orders::Order;
use crate::database::payment_store::{PaymentTransaction, TransactionStatus};
use crate::payments::error::PaymentError;
use crate::payments::poller::PollOutcome;
use crate::payments::types::{CheckoutReceipt, OrderDraft, SessionContext};

/// POST /api/v1/checkout
pub async fn place_order(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), PaymentError> {
    let receipt = state.orchestrator.place_order(&ctx, draft).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub amount: i64,
    pub phone_number: String,
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentTransaction> for PaymentStatusResponse {
    fn from(tx: PaymentTransaction) -> Self {
        Self {
            transaction_id: tx.transaction_id,
            status: tx.status,
            amount: tx.amount,
            phone_number: tx.phone_number,
            receipt_number: tx.receipt_number,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

/// GET /api/v1/payments/:transaction_id
pub async fn payment_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, PaymentError> {
    let tx = state.orchestrator.payment_status(&transaction_id).await?;
    Ok(Json(tx.into()))
}

#[derive(Serialize)]
pub struct WaitResponse {
    pub transaction_id: String,
    pub outcome: String,
    pub receipt_number: Option<String>,
}

/// GET /api/v1/payments/:transaction_id/wait
///
/// Long-poll until the payment resolves or the watch deadline passes.
/// Client disconnect drops this handler's future, which cancels the watch
/// and both of its timers.
pub async fn await_outcome(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<WaitResponse>, PaymentError> {
    // Unknown ids are a 404 up front rather than a pointless long poll.
    state.orchestrator.payment_status(&transaction_id).await?;

    let outcome = state.orchestrator.await_outcome(&transaction_id).await;

    let receipt_number = match outcome {
        PollOutcome::Completed => state
            .orchestrator
            .payment_status(&transaction_id)
            .await
            .ok()
            .and_then(|tx| tx.receipt_number),
        PollOutcome::Failed | PollOutcome::Timeout => None,
    };

    Ok(Json(WaitResponse {
        transaction_id,
        outcome: outcome.as_str().to_string(),
        receipt_number,
    }))
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/admin/orders/recent?limit=
pub async fn recent_orders(
    State(state): State<AppState>,
    ctx: SessionContext,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Order>>, PaymentError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let orders = state.orchestrator.recent_orders(&ctx, limit).await?;
    Ok(Json(orders))
}
