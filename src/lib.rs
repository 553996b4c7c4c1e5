//! Payment broker between client applications and two payment processors:
//! a payment-intent processor (Stripe) and a direct PIX/card processor
//! (Mercado Pago). Webhook notifications are kept as status overrides that
//! take precedence over the processors' own status reads.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod payments;
pub mod webhooks;

pub use api::{router, AppState};
pub use error::{AppError, AppResult};
