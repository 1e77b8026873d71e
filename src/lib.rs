//! dukapay: mobile-money checkout backend for the Duka storefront
//!
//! Orchestrates STK push payments end to end: a checkout creates an order
//! and fires a push request through the Daraja gateway; the provider's
//! asynchronous callback reconciles the pending transaction; status
//! watchers poll the store against a hard deadline so the storefront can
//! long-poll for the outcome.

pub mod api;
pub mod config;
pub mod database;
pub mod payments;

pub use config::Config;
