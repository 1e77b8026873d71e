//! Payment gateway implementations
//!
//! Concrete implementations of the PaymentGateway trait, one per provider.

pub mod daraja;

pub use daraja::DarajaGateway;
