//! Gateway result callback parsing and reconciliation
//!
//! The provider posts one asynchronous result per push request. The
//! envelope nests the interesting fields under `Body.stkCallback`; the
//! receipt number only exists on success, inside a name/value metadata
//! list.

use crate::database::payment_store::{TransactionStatus, TransactionStore, UpdateOutcome};
use crate::payments::error::{PaymentError, PaymentResult};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<MetadataItem>,
}

/// Some metadata items (e.g. `Balance`) arrive without a value.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<serde_json::Value>,
}

impl CallbackEnvelope {
    /// Parse a raw callback body; structural mismatch is `MalformedCallback`.
    pub fn from_value(payload: &serde_json::Value) -> PaymentResult<Self> {
        serde_json::from_value(payload.clone())
            .map_err(|e| PaymentError::malformed_callback(e.to_string()))
    }
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn metadata_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .item
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// Provider receipt identifier, present on success only.
    pub fn receipt_number(&self) -> Option<String> {
        match self.metadata_value("MpesaReceiptNumber")? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Amount confirmed by the provider, rounded to whole units.
    pub fn amount(&self) -> Option<i64> {
        self.metadata_value("Amount")?.as_f64().map(|a| a.round() as i64)
    }
}

/// What reconciliation did with one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(TransactionStatus),
    AlreadyTerminal,
}

/// Apply a parsed callback to the pending transaction it references.
///
/// Success moves the row to `completed` and records the receipt; failure
/// moves it to `failed`. A row that is already terminal is left alone, so
/// duplicate deliveries are harmless. An unknown transaction id surfaces
/// as a store error for the caller to log.
pub async fn reconcile(
    store: &dyn TransactionStore,
    callback: &StkCallback,
) -> PaymentResult<ReconcileOutcome> {
    let transaction_id = callback.checkout_request_id.as_str();
    let (new_status, receipt) = if callback.is_success() {
        (TransactionStatus::Completed, callback.receipt_number())
    } else {
        (TransactionStatus::Failed, None)
    };

    let outcome = store
        .update_status(transaction_id, new_status, receipt.as_deref())
        .await?;

    match outcome {
        UpdateOutcome::Applied => {
            info!(
                transaction_id,
                status = new_status.as_str(),
                result_code = callback.result_code,
                receipt = receipt.as_deref().unwrap_or(""),
                "Callback reconciled"
            );
            Ok(ReconcileOutcome::Applied(new_status))
        }
        UpdateOutcome::AlreadyTerminal => {
            warn!(
                transaction_id,
                result_code = callback.result_code,
                "Duplicate callback for terminal transaction, ignoring"
            );
            Ok(ReconcileOutcome::AlreadyTerminal)
        }
    }
}
