//! Push-payment integration module
//!
//! Gateway client, callback reconciliation, status polling and checkout
//! orchestration for mobile-money push payments.

pub mod callback;
pub mod error;
pub mod orchestrator;
pub mod phone;
pub mod poller;
pub mod providers;
pub mod traits;
pub mod types;
