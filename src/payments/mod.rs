//! Payment processor integration module
//!
//! Provider adapters for the intent processor (Stripe) and the direct
//! payment processor (Mercado Pago), plus the orchestration service that
//! shapes their answers and applies webhook status overrides.

pub mod providers;
pub mod service;
pub mod traits;
pub mod types;

pub use service::PaymentService;
