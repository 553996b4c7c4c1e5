pub mod error;
pub mod health;
pub mod payments;
pub mod routes;
pub mod webhooks;

use crate::payments::PaymentService;
use crate::webhooks::WebhookReceiver;

pub use routes::router;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub payments: PaymentService,
    pub webhooks: WebhookReceiver,
    /// Publishable key handed to clients for card tokenization
    pub public_key: String,
    pub environment: String,
}
