//! Payment provider trait definitions
//!
//! Each processor adapter implements one of these traits. The orchestration
//! service only ever talks to the traits, so tests can swap in fakes.

use crate::error::AppResult;
use crate::payments::types::{DirectPaymentRequest, IntentRequest, PaymentIntent, ProcessorPayment};
use async_trait::async_trait;

/// Processor that models payments as intents progressing through states
/// (requires action, processing, succeeded, canceled).
#[async_trait]
pub trait PaymentIntentProvider: Send + Sync {
    /// Provider name used in logs and error payloads
    fn name(&self) -> &'static str;

    /// Create a payment intent
    ///
    /// # Arguments
    /// * `request` - Amount in minor units, currency and requested method
    async fn create_intent(&self, request: IntentRequest) -> AppResult<PaymentIntent>;

    /// Fetch the current state of an intent
    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent>;

    /// Confirm an intent, optionally attaching a payment method
    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<String>,
    ) -> AppResult<PaymentIntent>;

    /// Cancel an intent that has not completed yet
    async fn cancel_intent(&self, intent_id: &str) -> AppResult<PaymentIntent>;
}

/// Processor that creates PIX and card-token payments in a single call.
#[async_trait]
pub trait DirectPaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Status value the provider uses for a completed payment
    fn approved_status(&self) -> &'static str {
        "approved"
    }

    /// Create a PIX or card payment
    async fn create_payment(&self, request: DirectPaymentRequest) -> AppResult<ProcessorPayment>;

    /// Fetch a payment by its processor id
    async fn get_payment(&self, payment_id: &str) -> AppResult<ProcessorPayment>;
}
