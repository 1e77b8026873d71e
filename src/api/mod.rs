pub mod callback;
pub mod checkout;
pub mod health;

use crate::config::Config;
use crate::database::callback_log::CallbackLog;
use crate::database::payment_store::TransactionStore;
use crate::payments::error::PaymentError;
use crate::payments::orchestrator::CheckoutOrchestrator;
use crate::payments::types::{Role, SessionContext};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::HeaderName;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler. The pool is optional so the
/// router can run against in-memory stores (tests, local mode).
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: Option<PgPool>,
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub store: Arc<dyn TransactionStore>,
    pub callback_log: Arc<dyn CallbackLog>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: Option<PgPool>,
        orchestrator: Arc<CheckoutOrchestrator>,
        store: Arc<dyn TransactionStore>,
        callback_log: Arc<dyn CallbackLog>,
    ) -> Self {
        Self {
            config,
            pool,
            orchestrator,
            store,
            callback_log,
        }
    }
}

/// Build the HTTP surface with tracing and request-id propagation.
pub fn router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/checkout", post(checkout::place_order))
        .route(
            "/api/v1/payments/:transaction_id",
            get(checkout::payment_status),
        )
        .route(
            "/api/v1/payments/:transaction_id/wait",
            get(checkout::await_outcome),
        )
        .route("/api/v1/payments/callback", post(callback::receive_callback))
        .route("/api/v1/admin/orders/recent", get(checkout::recent_orders))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .with_state(state)
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PaymentError::Configuration { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment gateway is not configured".to_string(),
            ),
            PaymentError::UpstreamAuth { .. } | PaymentError::UpstreamUnavailable { .. } => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            PaymentError::InitiationRejected { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            PaymentError::MalformedCallback { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            PaymentError::Forbidden { .. } => (StatusCode::FORBIDDEN, self.to_string()),
            PaymentError::Store(e) if e.is_not_found() => {
                (StatusCode::NOT_FOUND, "transaction not found".to_string())
            }
            PaymentError::Store(e) if e.is_duplicate() => {
                (StatusCode::CONFLICT, "duplicate transaction".to_string())
            }
            PaymentError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Caller identity from the `x-account-id` / `x-account-role` headers set
/// by the upstream auth proxy. A missing account id is a 401; a missing or
/// unknown role falls back to plain customer.
#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .headers
            .get("x-account-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "missing x-account-id header" })),
                )
            })?
            .to_string();

        let role = parts
            .headers
            .get("x-account-role")
            .and_then(|value| value.to_str().ok())
            .map(Role::parse)
            .unwrap_or(Role::Customer);

        Ok(SessionContext { account_id, role })
    }
}
