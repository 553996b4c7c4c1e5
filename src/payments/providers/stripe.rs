//! Stripe payment intent provider
//!
//! Talks to the Stripe REST API with form-encoded requests. Supports card
//! payments (automatic payment methods) and PIX intents.

use super::endpoint_url;
use crate::config::StripeConfig;
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError, InfrastructureError};
use crate::payments::traits::PaymentIntentProvider;
use crate::payments::types::{IntentRequest, PaymentIntent, PaymentMethod};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use tracing::{error, info, warn};

/// Where PIX is switched on for a Stripe account
pub const PIX_SETTINGS_URL: &str = "https://dashboard.stripe.com/account/payments/settings";

pub struct StripeProvider {
    config: StripeConfig,
    client: Client,
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AppError::infrastructure(InfrastructureError::Configuration {
                    message: format!("Failed to create Stripe HTTP client: {}", e),
                })
            })?;

        Ok(Self { config, client })
    }

    /// Make an authenticated request to the Stripe API. Failures are
    /// returned as-is; nothing is retried.
    async fn make_request(
        &self,
        method: Method,
        path: &[&str],
        form: Option<&[(&str, String)]>,
    ) -> AppResult<PaymentIntent> {
        let url = endpoint_url(&self.config.api_base, path)?;
        let endpoint = url.path().to_string();
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.secret_key);

        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await.map_err(|e| {
            error!("Stripe request to {} failed: {}", endpoint, e);
            AppError::external(ExternalError::Transport {
                provider: self.name().to_string(),
                message: e.to_string(),
                is_timeout: e.is_timeout(),
            })
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read Stripe response from {}: {}", endpoint, e);
            AppError::external(ExternalError::Transport {
                provider: self.name().to_string(),
                message: e.to_string(),
                is_timeout: e.is_timeout(),
            })
        })?;

        if status.is_success() {
            return serde_json::from_str::<PaymentIntent>(&body).map_err(|e| {
                error!("Failed to parse Stripe response: {}", e);
                AppError::external(ExternalError::InvalidResponse {
                    provider: self.name().to_string(),
                    message: e.to_string(),
                })
            });
        }

        Err(stripe_error(self.name(), status.as_u16(), &body))
    }
}

/// Translate a Stripe error body into an [`ExternalError::Processor`]
fn stripe_error(provider: &str, status: u16, body: &str) -> AppError {
    let parsed = serde_json::from_str::<StripeErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    let (message, code, error_type) = match parsed {
        Some(err) => (
            err.message.unwrap_or_else(|| format!("HTTP {}", status)),
            err.code,
            err.error_type,
        ),
        None => (format!("HTTP {}: {}", status, body), None, None),
    };

    error!("Stripe API error: status={}, message={}", status, message);

    AppError::external(ExternalError::Processor {
        provider: provider.to_string(),
        status: Some(status),
        message,
        code,
        error_type,
        causes: Vec::new(),
    })
}

/// Rewrite an invalid-request error that names PIX into a
/// payment-method-not-enabled error with remediation steps
fn explain_pix_not_enabled(provider: &str, err: AppError) -> AppError {
    let message = match &err.kind {
        AppErrorKind::External(ExternalError::Processor {
            message,
            error_type,
            ..
        }) if error_type.as_deref() == Some("invalid_request_error") => message.clone(),
        _ => return err,
    };

    let lowered = message.to_lowercase();
    if !(lowered.contains("pix") && lowered.contains("invalid")) {
        return err;
    }

    warn!("PIX appears to be disabled on the Stripe account: {}", message);

    AppError::external(ExternalError::PaymentMethodNotEnabled {
        provider: provider.to_string(),
        method: PaymentMethod::Pix.as_str().to_string(),
        message: format!(
            "PIX is not enabled on your Stripe account. To enable PIX:\n\
             1. Open: {}\n\
             2. Turn on the \"PIX\" payment method\n\
             3. Make sure the account is set up to operate in Brazil\n\n\
             Original error: {}",
            PIX_SETTINGS_URL, message
        ),
        help_url: PIX_SETTINGS_URL.to_string(),
    })
}

fn intent_form(request: &IntentRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("amount", request.amount_minor.to_string()),
        ("currency", request.currency.clone()),
    ];

    match request.method {
        PaymentMethod::Pix => form.push(("payment_method_types[]", "pix".to_string())),
        PaymentMethod::Card => form.push(("automatic_payment_methods[enabled]", "true".to_string())),
    }

    form
}

#[async_trait]
impl PaymentIntentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "Stripe"
    }

    async fn create_intent(&self, request: IntentRequest) -> AppResult<PaymentIntent> {
        info!(
            "Creating Stripe payment intent: amount={} {} method={}",
            request.amount_minor,
            request.currency,
            request.method.as_str()
        );

        let form = intent_form(&request);
        let intent = self
            .make_request(Method::POST, &["v1", "payment_intents"], Some(form.as_slice()))
            .await
            .map_err(|e| explain_pix_not_enabled(self.name(), e))?;

        info!(
            "Stripe payment intent created: id={}, status={}",
            intent.id, intent.status
        );
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
        info!("Retrieving Stripe payment intent: id={}", intent_id);
        self.make_request(Method::GET, &["v1", "payment_intents", intent_id], None)
            .await
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<String>,
    ) -> AppResult<PaymentIntent> {
        info!("Confirming Stripe payment intent: id={}", intent_id);

        let form: Vec<(&str, String)> = payment_method
            .into_iter()
            .map(|pm| ("payment_method", pm))
            .collect();

        let intent = self
            .make_request(
                Method::POST,
                &["v1", "payment_intents", intent_id, "confirm"],
                Some(form.as_slice()),
            )
            .await?;

        info!(
            "Stripe payment intent confirmed: id={}, status={}",
            intent.id, intent.status
        );
        Ok(intent)
    }

    async fn cancel_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
        info!("Canceling Stripe payment intent: id={}", intent_id);
        self.make_request(
            Method::POST,
            &["v1", "payment_intents", intent_id, "cancel"],
            None,
        )
        .await
    }
}

// Stripe API error wrapper
#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}
