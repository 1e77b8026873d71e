//! Payment gateway trait definition
//!
//! Defines the interface a push-payment gateway must implement so the
//! checkout orchestrator and the HTTP layer stay provider-agnostic.

use crate::payments::error::PaymentResult;
use crate::payments::types::{InitiateOutcome, InitiateRequest};
use async_trait::async_trait;

/// Trait for push-payment gateway implementations
///
/// A gateway owns the whole initiation exchange: credential acquisition,
/// request signing, the push call itself, and persisting the resulting
/// pending transaction before returning.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Initiate a push payment on the subscriber's handset
    ///
    /// On provider acceptance the pending transaction row is durably
    /// recorded before this method returns, so a status watch started
    /// immediately afterwards observes it on its first check.
    ///
    /// # Arguments
    /// * `request` - Phone number, amount, order reference and description
    ///
    /// # Returns
    /// * `InitiateOutcome` - Correlation ids and the provider's customer text
    async fn initiate(&self, request: InitiateRequest) -> PaymentResult<InitiateOutcome>;
}
