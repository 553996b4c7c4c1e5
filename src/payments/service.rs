//! Payment orchestration
//!
//! Validates client input, delegates to the provider adapters and shapes the
//! results. Status reads consult the override store so that a status
//! delivered by webhook wins over what the processor's query API reports.

use crate::cache::{CacheResult, PaymentStatusOverride, StatusOverrideStore};
use crate::error::AppResult;
use crate::payments::traits::{DirectPaymentProvider, PaymentIntentProvider};
use crate::payments::types::{
    from_minor_units, to_minor_units, validate_amount, CardPaymentView, ConfirmPaymentRequest,
    CreateCardPaymentRequest, CreatePaymentRequest, CreatePixPaymentRequest, DirectMethod,
    IntentRequest, IntentStatusView, IntentView, PaymentIntent, PaymentMethod, PaymentStatusView,
    PixPaymentView, ProcessorPayment, DEFAULT_CURRENCY,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct PaymentService {
    intents: Arc<dyn PaymentIntentProvider>,
    direct: Arc<dyn DirectPaymentProvider>,
    overrides: Arc<dyn StatusOverrideStore>,
}

impl PaymentService {
    pub fn new(
        intents: Arc<dyn PaymentIntentProvider>,
        direct: Arc<dyn DirectPaymentProvider>,
        overrides: Arc<dyn StatusOverrideStore>,
    ) -> Self {
        Self {
            intents,
            direct,
            overrides,
        }
    }

    pub fn override_backend(&self) -> &'static str {
        self.overrides.backend()
    }

    pub async fn override_health(&self) -> CacheResult<()> {
        self.overrides.health_check().await
    }

    /// Create a payment intent; card unless PIX is requested
    pub async fn create_intent(&self, request: CreatePaymentRequest) -> AppResult<IntentView> {
        let amount = validate_amount(request.amount)?;
        let method = request.payment_method.unwrap_or_default();

        let intent = self
            .intents
            .create_intent(IntentRequest {
                amount_minor: to_minor_units(amount)?,
                currency: DEFAULT_CURRENCY.to_string(),
                method,
            })
            .await?;

        let pix = match method {
            PaymentMethod::Pix => intent.pix_instructions(),
            PaymentMethod::Card => None,
        };

        Ok(IntentView {
            id: intent.id,
            client_secret: intent.client_secret,
            amount: from_minor_units(intent.amount),
            currency: intent.currency,
            status: intent.status,
            payment_method: Some(method.as_str().to_string()),
            pix_qr_code: pix.as_ref().and_then(|p| p.qr_code().map(str::to_string)),
            pix_instructions: pix.as_ref().map(|p| p.to_value()),
        })
    }

    /// Current state of an intent, with any webhook override applied
    pub async fn intent_status(&self, intent_id: &str) -> AppResult<IntentStatusView> {
        let intent = self
            .intents
            .retrieve_intent(intent_id)
            .await
            .map_err(|e| e.with_context(format!("intent {}", intent_id)))?;
        let status_override = self.lookup_override(intent_id).await;
        Ok(intent_status_view(intent, status_override.as_ref()))
    }

    pub async fn confirm_intent(
        &self,
        intent_id: &str,
        request: ConfirmPaymentRequest,
    ) -> AppResult<IntentView> {
        let intent = self
            .intents
            .confirm_intent(intent_id, request.payment_method_id)
            .await
            .map_err(|e| e.with_context(format!("confirming intent {}", intent_id)))?;
        Ok(plain_intent_view(intent))
    }

    pub async fn cancel_intent(&self, intent_id: &str) -> AppResult<IntentView> {
        let intent = self
            .intents
            .cancel_intent(intent_id)
            .await
            .map_err(|e| e.with_context(format!("canceling intent {}", intent_id)))?;
        let mut view = plain_intent_view(intent);
        view.client_secret = None;
        Ok(view)
    }

    /// Create a PIX payment and surface its QR code.
    ///
    /// A missing QR payload is logged, not treated as a failure.
    pub async fn create_pix(&self, request: CreatePixPaymentRequest) -> AppResult<PixPaymentView> {
        let request = request.validate()?;
        let payment = self.direct.create_payment(request).await?;

        let pix = payment.pix.clone().unwrap_or_default();
        if pix.is_empty() {
            warn!(
                "QR code not found in {} payment response. Payment ID: {}",
                self.direct.name(),
                payment.id
            );
        } else if let Some(encoded) = pix.qr_code_base64.as_deref().filter(|s| !s.is_empty()) {
            if let Err(e) = BASE64.decode(encoded) {
                warn!(
                    "QR code image for payment {} is not valid base64: {}",
                    payment.id, e
                );
            }
        }

        Ok(PixPaymentView {
            payment_id: payment.id,
            status: payment.status,
            qr_code: pix.qr_code.unwrap_or_default(),
            qr_code_base64: pix.qr_code_base64.unwrap_or_default(),
            ticket_url: pix.ticket_url,
        })
    }

    /// Create a card payment from a client-side token.
    ///
    /// A `rejected` status is a normal outcome and is returned to the caller.
    pub async fn create_card(&self, request: CreateCardPaymentRequest) -> AppResult<CardPaymentView> {
        let request = request.validate()?;
        let requested_amount = request.amount;
        let (requested_installments, requested_brand) = match &request.method {
            DirectMethod::Card(card) => {
                (card.installments, card.payment_method_id.clone())
            }
            DirectMethod::Pix => (1, String::new()),
        };

        let payment = self.direct.create_payment(request).await?;

        if payment.status == "rejected" {
            warn!(
                "{} payment rejected - ID: {}, Status Detail: {}",
                self.direct.name(),
                payment.id,
                payment.status_detail.as_deref().unwrap_or_default()
            );
            for (index, cause) in payment.causes.iter().enumerate() {
                warn!("Rejection cause {}: {}", index + 1, cause);
            }
        }

        Ok(CardPaymentView {
            payment_id: payment.id,
            status: payment.status,
            status_detail: payment.status_detail.unwrap_or_default(),
            transaction_amount: payment.transaction_amount.unwrap_or(requested_amount),
            installments: payment.installments.unwrap_or(requested_installments),
            payment_method_id: payment
                .payment_method_id
                .or_else(|| Some(requested_brand).filter(|b| !b.is_empty())),
        })
    }

    /// Status of a direct payment, with any webhook override applied
    pub async fn payment_status(&self, payment_id: &str) -> AppResult<PaymentStatusView> {
        let payment = self
            .direct
            .get_payment(payment_id)
            .await
            .map_err(|e| e.with_context(format!("payment {}", payment_id)))?;
        let status_override = self.lookup_override(payment_id).await;
        if let Some(found) = &status_override {
            info!(
                "Using cached status for payment {} over {}: {}",
                payment_id,
                self.direct.name(),
                found.status
            );
        }
        Ok(apply_override(
            payment,
            status_override.as_ref(),
            self.direct.approved_status(),
        ))
    }

    /// A store that cannot be read is treated as holding no override
    async fn lookup_override(&self, payment_id: &str) -> Option<PaymentStatusOverride> {
        match self.overrides.get(payment_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Status override lookup failed for {}, using processor status: {}",
                    payment_id, e
                );
                None
            }
        }
    }
}

/// Merge a processor record with an override.
///
/// Only the status (and, for an approved override, the approval time) come
/// from the override; every other field is the processor's.
pub fn apply_override(
    payment: ProcessorPayment,
    status_override: Option<&PaymentStatusOverride>,
    approved_status: &str,
) -> PaymentStatusView {
    let mut view = PaymentStatusView {
        id: payment.id,
        status: payment.status,
        transaction_amount: payment.transaction_amount,
        date_created: payment.date_created,
        date_approved: payment.date_approved,
    };

    if let Some(found) = status_override {
        view.status = found.status.clone();
        if found.status == approved_status {
            view.date_approved = Some(found.updated_at);
        }
    }

    view
}

fn intent_status_view(
    intent: PaymentIntent,
    status_override: Option<&PaymentStatusOverride>,
) -> IntentStatusView {
    let pix = if intent.is_pix() {
        intent.pix_instructions()
    } else {
        None
    };
    let payment_method = intent.payment_method_id();

    IntentStatusView {
        status: status_override
            .map(|found| found.status.clone())
            .unwrap_or(intent.status),
        id: intent.id,
        amount: from_minor_units(intent.amount),
        currency: intent.currency,
        client_secret: intent.client_secret,
        payment_method,
        last_payment_error: intent.last_payment_error,
        pix_qr_code: pix.as_ref().and_then(|p| p.qr_code().map(str::to_string)),
        pix_instructions: pix.as_ref().map(|p| p.to_value()),
    }
}

fn plain_intent_view(intent: PaymentIntent) -> IntentView {
    IntentView {
        id: intent.id,
        client_secret: intent.client_secret,
        amount: from_minor_units(intent.amount),
        currency: intent.currency,
        status: intent.status,
        payment_method: None,
        pix_qr_code: None,
        pix_instructions: None,
    }
}
