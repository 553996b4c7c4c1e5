//! Webhook receiver
//!
//! Turns processor notifications into status overrides. Every outcome is an
//! acknowledgement: faults are logged here and never reach the notifier, so
//! processors don't keep retrying a delivery we can't use.

pub mod envelope;
pub mod signature;

use crate::cache::StatusOverrideStore;
use crate::config::Config;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

pub use envelope::{parse_event, WebhookEvent};
pub use signature::SignatureError;

/// Which processor sent a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookSource {
    Stripe,
    MercadoPago,
}

impl fmt::Display for WebhookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookSource::Stripe => write!(f, "stripe"),
            WebhookSource::MercadoPago => write!(f, "mercadopago"),
        }
    }
}

/// Body returned to the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
}

impl WebhookAck {
    pub fn processed() -> Self {
        Self {
            received: true,
            processed: true,
        }
    }

    pub fn ignored() -> Self {
        Self {
            received: true,
            processed: false,
        }
    }
}

/// Request metadata the receiver needs besides the body
#[derive(Debug, Clone, Default)]
pub struct DeliveryMeta {
    pub signature: Option<String>,
    pub request_id: Option<String>,
    /// `data.id` query parameter
    pub data_id: Option<String>,
}

/// Per-source HMAC secrets; `None` leaves that source unauthenticated
#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    pub stripe: Option<String>,
    pub mercado_pago: Option<String>,
}

impl WebhookSecrets {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stripe: config.stripe.webhook_secret.clone(),
            mercado_pago: config.mercado_pago.webhook_secret.clone(),
        }
    }

    fn for_source(&self, source: WebhookSource) -> Option<&str> {
        match source {
            WebhookSource::Stripe => self.stripe.as_deref(),
            WebhookSource::MercadoPago => self.mercado_pago.as_deref(),
        }
    }
}

#[derive(Clone)]
pub struct WebhookReceiver {
    store: Arc<dyn StatusOverrideStore>,
    secrets: WebhookSecrets,
}

impl WebhookReceiver {
    pub fn new(store: Arc<dyn StatusOverrideStore>, secrets: WebhookSecrets) -> Self {
        for source in [WebhookSource::Stripe, WebhookSource::MercadoPago] {
            if secrets.for_source(source).is_none() {
                warn!(
                    "No webhook secret configured for {}, deliveries are accepted unverified",
                    source
                );
            }
        }
        Self { store, secrets }
    }

    /// Handle one delivery and decide the acknowledgement
    pub async fn receive(
        &self,
        source: WebhookSource,
        body: &[u8],
        meta: &DeliveryMeta,
    ) -> WebhookAck {
        let signed_id = match self.verify(source, body, meta) {
            Ok(signed_id) => signed_id,
            Err(e) => {
                warn!("Rejected {} webhook: {}", source, e);
                return WebhookAck::ignored();
            }
        };

        let Some(event) = parse_event(body) else {
            warn!("Unparseable {} webhook body ({} bytes)", source, body.len());
            return WebhookAck::ignored();
        };

        info!(
            "Webhook received from {}: type={}",
            source,
            event.event_type.as_deref().unwrap_or("unknown")
        );

        if !event.is_payment_event() {
            info!(
                "Received webhook type: {}, not a payment event",
                event.event_type.as_deref().unwrap_or_default()
            );
            return WebhookAck::ignored();
        }

        let Some((payment_id, status)) = event.payment_update() else {
            warn!(
                "Payment ID or status missing in {} webhook data (id={:?}, status={:?})",
                source, event.payment_id, event.status
            );
            return WebhookAck::ignored();
        };

        if let Some(signed_id) = signed_id.as_deref() {
            if !signed_id.eq_ignore_ascii_case(payment_id) {
                warn!(
                    "Rejected {} webhook: signature covers {} but body names {}",
                    source, signed_id, payment_id
                );
                return WebhookAck::ignored();
            }
        }

        match self.store.set(payment_id, status).await {
            Ok(_) => {
                info!(
                    "Payment status updated: paymentId={}, status={}",
                    payment_id, status
                );
                WebhookAck::processed()
            }
            Err(e) => {
                error!(
                    "Error processing {} webhook for payment {}: {}",
                    source, payment_id, e
                );
                WebhookAck::ignored()
            }
        }
    }

    /// Check the delivery signature when a secret is configured.
    ///
    /// Returns the resource id the signature is bound to, if it only covers
    /// an id rather than the whole body.
    fn verify(
        &self,
        source: WebhookSource,
        body: &[u8],
        meta: &DeliveryMeta,
    ) -> Result<Option<String>, SignatureError> {
        let Some(secret) = self.secrets.for_source(source) else {
            return Ok(None);
        };
        let now = Utc::now().timestamp();
        match source {
            WebhookSource::Stripe => {
                signature::verify_stripe(secret, meta.signature.as_deref(), body, now)?;
                Ok(None)
            }
            WebhookSource::MercadoPago => {
                let data_id = meta
                    .data_id
                    .clone()
                    .or_else(|| envelope::data_id(body))
                    .ok_or(SignatureError::Malformed("missing data.id"))?;
                signature::verify_mercado_pago(
                    secret,
                    meta.signature.as_deref(),
                    meta.request_id.as_deref(),
                    Some(&data_id),
                    now,
                )?;
                Ok(Some(data_id))
            }
        }
    }
}
