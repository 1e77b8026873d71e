use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::payments::callback::{reconcile, CallbackEnvelope};

/// Acknowledgment body in the shape the gateway expects back.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }

    fn rejected() -> Self {
        Self {
            result_code: 1,
            result_desc: "Rejected".to_string(),
        }
    }
}

/// POST /api/v1/payments/callback
///
/// The gateway delivers one result per push request, possibly more than
/// once. Every delivery is recorded to the audit log before parsing;
/// reconciliation failures are logged and recorded there, never surfaced
/// to the gateway, so it does not retry. Only a structurally malformed
/// body earns a client-error response.
pub async fn receive_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<CallbackAck>) {
    // Hand-parsed rather than extracted, so a body that is not JSON at all
    // still lands in the audit trail and gets the acknowledgment shape.
    let payload = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            let raw = serde_json::Value::String(String::from_utf8_lossy(&body).into_owned());
            let audit_id = record_delivery(&state, raw).await;
            warn!(error = %e, "Discarding callback that is not valid JSON");
            record_failure(&state, audit_id, &e.to_string()).await;
            return (StatusCode::BAD_REQUEST, Json(CallbackAck::rejected()));
        }
    };

    let audit_id = record_delivery(&state, payload.clone()).await;

    let envelope = match CallbackEnvelope::from_value(&payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Discarding malformed callback");
            record_failure(&state, audit_id, &e.to_string()).await;
            return (StatusCode::BAD_REQUEST, Json(CallbackAck::rejected()));
        }
    };

    let stk = &envelope.body.stk_callback;
    info!(
        transaction_id = %stk.checkout_request_id,
        result_code = stk.result_code,
        "Callback received"
    );

    match reconcile(state.store.as_ref(), stk).await {
        Ok(_) => {
            if let Some(id) = audit_id {
                if let Err(e) = state.callback_log.mark_processed(id).await {
                    warn!(error = %e, "Failed to mark callback processed");
                }
            }
        }
        Err(e) => {
            error!(
                error = %e,
                transaction_id = %stk.checkout_request_id,
                "Callback reconciliation failed"
            );
            record_failure(&state, audit_id, &e.to_string()).await;
        }
    }

    (StatusCode::OK, Json(CallbackAck::accepted()))
}

async fn record_delivery(state: &AppState, payload: serde_json::Value) -> Option<Uuid> {
    match state.callback_log.record(payload).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "Failed to record callback delivery");
            None
        }
    }
}

async fn record_failure(state: &AppState, audit_id: Option<Uuid>, reason: &str) {
    if let Some(id) = audit_id {
        if let Err(e) = state.callback_log.record_failure(id, reason).await {
            warn!(error = %e, "Failed to update callback audit row");
        }
    }
}
