//! Push-payment request and outcome types
//!
//! Common types used by the gateway client, the checkout orchestrator and
//! the HTTP layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to initiate a push payment on a subscriber's handset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRequest {
    /// Subscriber phone number, any customer-entered format
    pub phone_number: String,
    /// Cart total; the provider only takes whole units, so the gateway
    /// rounds to the nearest one before submitting
    pub amount: f64,
    /// Short order reference shown on the subscriber's statement
    pub account_reference: String,
    /// Free-text description of what is being paid for
    pub description: String,
}

/// Identifiers returned when the provider accepts a push request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateOutcome {
    /// Provider-assigned checkout request id, the durable correlation key
    pub transaction_id: String,
    /// Provider-side merchant request id, for support lookups
    pub provider_request_id: String,
    /// Customer-facing text from the provider (e.g. prompt instructions)
    pub customer_message: String,
}

/// What the storefront hands back to the customer after checkout
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    /// Order identifier in our own records
    pub order_id: Uuid,
    /// Payment attempt to watch or query for the outcome
    pub transaction_id: String,
    /// Customer-facing text from the provider
    pub customer_message: String,
}

/// Customer-submitted checkout input, validated by the orchestrator
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub phone_number: String,
    pub amount: f64,
    pub description: String,
}

/// Caller role carried on each request by the upstream auth proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    /// Parse a role claim; anything unrecognized is a plain customer.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            _ => Role::Customer,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Identity and role of the caller, established per request
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub account_id: String,
    pub role: Role,
}

impl SessionContext {
    pub fn new(account_id: impl Into<String>, role: Role) -> Self {
        Self {
            account_id: account_id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_defaults_to_customer() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse(" Admin "), Role::Admin);
        assert_eq!(Role::parse("customer"), Role::Customer);
        assert_eq!(Role::parse(""), Role::Customer);
        assert_eq!(Role::parse("superuser"), Role::Customer);
    }
}
