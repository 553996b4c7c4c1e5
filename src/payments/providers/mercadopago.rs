//! Mercado Pago payment provider
//!
//! Direct PIX (QR code) and card-token payments through the
//! `/v1/payments` API. Every create call carries a fresh idempotency key.

use super::endpoint_url;
use crate::config::MercadoPagoConfig;
use crate::error::{AppError, AppResult, ExternalError, InfrastructureError};
use crate::payments::traits::DirectPaymentProvider;
use crate::payments::types::{
    statement_descriptor, DirectMethod, DirectPaymentRequest, ExternalId, PixQrCode,
    ProcessorPayment,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

pub struct MercadoPagoProvider {
    config: MercadoPagoConfig,
    client: Client,
}

impl MercadoPagoProvider {
    pub fn new(config: MercadoPagoConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AppError::infrastructure(InfrastructureError::Configuration {
                    message: format!("Failed to create Mercado Pago HTTP client: {}", e),
                })
            })?;

        Ok(Self { config, client })
    }

    pub fn public_key(&self) -> &str {
        &self.config.public_key
    }

    async fn make_request(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&Value>,
    ) -> AppResult<MercadoPagoPayment> {
        let url = endpoint_url(&self.config.api_base, path)?;
        let endpoint = url.path().to_string();
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.access_token);

        if let Some(body) = body {
            request = request
                .header("X-Idempotency-Key", Uuid::new_v4().to_string())
                .json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("Mercado Pago request to {} failed: {}", endpoint, e);
            AppError::external(ExternalError::Transport {
                provider: self.name().to_string(),
                message: e.to_string(),
                is_timeout: e.is_timeout(),
            })
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read Mercado Pago response from {}: {}", endpoint, e);
            AppError::external(ExternalError::Transport {
                provider: self.name().to_string(),
                message: e.to_string(),
                is_timeout: e.is_timeout(),
            })
        })?;

        if status.is_success() {
            return serde_json::from_str::<MercadoPagoPayment>(&text).map_err(|e| {
                error!("Failed to parse Mercado Pago response: {}", e);
                AppError::external(ExternalError::InvalidResponse {
                    provider: self.name().to_string(),
                    message: e.to_string(),
                })
            });
        }

        Err(mercado_pago_error(self.name(), status.as_u16(), &text))
    }
}

/// Translate a Mercado Pago error body, keeping its cause list verbatim
fn mercado_pago_error(provider: &str, status: u16, body: &str) -> AppError {
    let error = match serde_json::from_str::<MercadoPagoApiError>(body) {
        Ok(api) => {
            let code = api.cause.first().and_then(|c| match c.get("code") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            });
            ExternalError::Processor {
                provider: provider.to_string(),
                status: Some(status),
                message: api.message.unwrap_or_else(|| format!("HTTP {}", status)),
                code,
                error_type: api.error,
                causes: api.cause,
            }
        }
        Err(_) => ExternalError::Processor {
            provider: provider.to_string(),
            status: Some(status),
            message: format!("HTTP {}: {}", status, body),
            code: None,
            error_type: None,
            causes: Vec::new(),
        },
    };

    error!("Mercado Pago API error: {}", error);
    AppError::external(error)
}

/// Request body for `POST /v1/payments`
fn payment_body(request: &DirectPaymentRequest) -> Value {
    match &request.method {
        DirectMethod::Pix => json!({
            "transaction_amount": request.amount,
            "description": request.description,
            "payment_method_id": "pix",
            "payer": { "email": request.email },
        }),
        DirectMethod::Card(card) => {
            let mut body = json!({
                "transaction_amount": request.amount,
                "description": request.description,
                "payment_method_id": card.payment_method_id,
                "payer": { "email": request.email },
                "token": card.token,
                "installments": card.installments,
                "statement_descriptor": statement_descriptor(&request.description),
                "capture": true,
            });

            if let Some(identification) = &card.identification {
                body["payer"]["identification"] = json!({
                    "type": identification.id_type,
                    "number": identification.number,
                });
            }

            if let Some(issuer_id) = card.issuer_id {
                body["issuer_id"] = json!(issuer_id);
            }

            body
        }
    }
}

#[async_trait]
impl DirectPaymentProvider for MercadoPagoProvider {
    fn name(&self) -> &'static str {
        "Mercado Pago"
    }

    async fn create_payment(&self, request: DirectPaymentRequest) -> AppResult<ProcessorPayment> {
        let method = match &request.method {
            DirectMethod::Pix => "pix",
            DirectMethod::Card(_) => "card",
        };
        info!(
            "Creating Mercado Pago {} payment: amount={}, email={}",
            method, request.amount, request.email
        );

        let body = payment_body(&request);
        let payment = self
            .make_request(Method::POST, &["v1", "payments"], Some(&body))
            .await?
            .into_payment();

        info!(
            "Mercado Pago payment created: id={}, status={}, status_detail={}",
            payment.id,
            payment.status,
            payment.status_detail.as_deref().unwrap_or("-")
        );
        Ok(payment)
    }

    async fn get_payment(&self, payment_id: &str) -> AppResult<ProcessorPayment> {
        info!("Getting Mercado Pago payment: id={}", payment_id);
        Ok(self
            .make_request(Method::GET, &["v1", "payments", payment_id], None)
            .await?
            .into_payment())
    }
}

// Payment resource as returned by /v1/payments
#[derive(Debug, Deserialize)]
struct MercadoPagoPayment {
    #[serde(default)]
    id: Option<ExternalId>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    transaction_amount: Option<Decimal>,
    #[serde(default)]
    installments: Option<u32>,
    #[serde(default)]
    payment_method_id: Option<String>,
    #[serde(default)]
    date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    date_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    point_of_interaction: Option<PointOfInteraction>,
    #[serde(default)]
    cause: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    #[serde(default)]
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_base64: Option<String>,
    #[serde(default)]
    ticket_url: Option<String>,
}

impl MercadoPagoPayment {
    fn into_payment(self) -> ProcessorPayment {
        let pix = self
            .point_of_interaction
            .and_then(|poi| poi.transaction_data)
            .map(|data| PixQrCode {
                qr_code: data.qr_code,
                qr_code_base64: data.qr_code_base64,
                ticket_url: data.ticket_url,
            });

        ProcessorPayment {
            id: self.id.and_then(ExternalId::into_string).unwrap_or_default(),
            status: self.status.unwrap_or_else(|| "pending".to_string()),
            status_detail: self.status_detail,
            transaction_amount: self.transaction_amount,
            installments: self.installments,
            payment_method_id: self.payment_method_id,
            date_created: self.date_created,
            date_approved: self.date_approved,
            pix,
            causes: self.cause,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MercadoPagoApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    cause: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppErrorKind;
    use crate::payments::types::{CardDetails, PayerIdentification};
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    async fn spawn_fake_mercado_pago() -> String {
        async fn create(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            assert!(headers.contains_key("x-idempotency-key"));

            if body["payment_method_id"] == "pix" {
                return (
                    StatusCode::CREATED,
                    Json(json!({
                        "id": 1325871234u64,
                        "status": "pending",
                        "status_detail": "pending_waiting_transfer",
                        "transaction_amount": body["transaction_amount"],
                        "payment_method_id": "pix",
                        "date_created": "2024-03-01T10:00:00.000-04:00",
                        "date_approved": null,
                        "point_of_interaction": {
                            "transaction_data": {
                                "qr_code": "00020126580014br.gov.bcb.pix",
                                "qr_code_base64": "iVBORw0KGgo=",
                                "ticket_url": "https://www.mercadopago.com.br/payments/1325871234/ticket"
                            }
                        }
                    })),
                );
            }

            if body["token"] == "bad_token" {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "message": "Invalid card_token_id",
                        "error": "bad_request",
                        "status": 400,
                        "cause": [{"code": 3003, "description": "Invalid card_token_id", "data": null}]
                    })),
                );
            }

            (
                StatusCode::CREATED,
                Json(json!({
                    "id": 1325871299u64,
                    "status": "approved",
                    "status_detail": "accredited",
                    "transaction_amount": body["transaction_amount"],
                    "installments": body["installments"],
                    "payment_method_id": body["payment_method_id"],
                    "statement": body["statement_descriptor"],
                    "payer_identification": body["payer"]["identification"]
                })),
            )
        }

        async fn fetch(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
            if id == "404" {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({"message": "Payment not found", "error": "not_found", "status": 404, "cause": []})),
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "id": id.parse::<u64>().unwrap(),
                    "status": "approved",
                    "transaction_amount": 49.9,
                    "date_created": "2024-03-01T10:00:00.000-04:00",
                    "date_approved": "2024-03-01T10:05:00.000-04:00"
                })),
            )
        }

        let app = Router::new()
            .route("/v1/payments", post(create))
            .route("/v1/payments/:id", get(fetch));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    type SeenPaths = Arc<Mutex<Vec<String>>>;

    async fn spawn_recording_mercado_pago() -> (String, SeenPaths) {
        async fn record(State(seen): State<SeenPaths>, uri: Uri) -> (StatusCode, Json<Value>) {
            seen.lock().unwrap().push(uri.to_string());
            (
                StatusCode::NOT_FOUND,
                Json(json!({"message": "resource not found", "error": "not_found", "status": 404, "cause": []})),
            )
        }

        let seen = SeenPaths::default();
        let app = Router::new().fallback(record).with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn provider(api_base: String) -> MercadoPagoProvider {
        MercadoPagoProvider::new(MercadoPagoConfig {
            access_token: "TEST-token".to_string(),
            public_key: "TEST-public".to_string(),
            api_base,
            timeout: Duration::from_secs(5),
            webhook_secret: None,
        })
        .unwrap()
    }

    fn card_request(token: &str) -> DirectPaymentRequest {
        DirectPaymentRequest {
            amount: dec!(100.00),
            email: "buyer@example.com".to_string(),
            description: "Monthly subscription for premium plan".to_string(),
            method: DirectMethod::Card(CardDetails {
                token: token.to_string(),
                installments: 3,
                payment_method_id: "master".to_string(),
                issuer_id: Some(24),
                identification: Some(PayerIdentification {
                    id_type: "CPF".to_string(),
                    number: "12345678909".to_string(),
                }),
            }),
        }
    }

    #[test]
    fn test_card_body_mapping() {
        let body = payment_body(&card_request("tok_1"));
        assert_eq!(body["payment_method_id"], "master");
        assert_eq!(body["installments"], 3);
        assert_eq!(body["issuer_id"], 24);
        assert_eq!(body["capture"], true);
        assert_eq!(body["statement_descriptor"], "Monthly subscription f");
        assert_eq!(body["payer"]["identification"]["type"], "CPF");
        assert_eq!(body["payer"]["email"], "buyer@example.com");
    }

    #[test]
    fn test_pix_body_mapping() {
        let body = payment_body(&DirectPaymentRequest {
            amount: dec!(49.90),
            email: "buyer@example.com".to_string(),
            description: "Order #42".to_string(),
            method: DirectMethod::Pix,
        });
        assert_eq!(body["payment_method_id"], "pix");
        assert_eq!(body["transaction_amount"], 49.9);
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn test_create_pix_payment_extracts_qr() {
        let base = spawn_fake_mercado_pago().await;
        let payment = provider(base)
            .create_payment(DirectPaymentRequest {
                amount: dec!(49.90),
                email: "buyer@example.com".to_string(),
                description: "Order #42".to_string(),
                method: DirectMethod::Pix,
            })
            .await
            .unwrap();

        assert_eq!(payment.id, "1325871234");
        assert_eq!(payment.status, "pending");
        assert_eq!(payment.transaction_amount, Some(dec!(49.9)));
        let pix = payment.pix.unwrap();
        assert_eq!(pix.qr_code.as_deref(), Some("00020126580014br.gov.bcb.pix"));
        assert_eq!(pix.qr_code_base64.as_deref(), Some("iVBORw0KGgo="));
        assert!(payment.date_approved.is_none());
    }

    #[tokio::test]
    async fn test_create_card_payment() {
        let base = spawn_fake_mercado_pago().await;
        let payment = provider(base)
            .create_payment(card_request("tok_good"))
            .await
            .unwrap();

        assert_eq!(payment.id, "1325871299");
        assert_eq!(payment.status, "approved");
        assert_eq!(payment.installments, Some(3));
        assert_eq!(payment.payment_method_id.as_deref(), Some("master"));
        assert!(payment.pix.is_none());
    }

    #[tokio::test]
    async fn test_rejection_keeps_cause_list() {
        let base = spawn_fake_mercado_pago().await;
        let err = provider(base)
            .create_payment(card_request("bad_token"))
            .await
            .unwrap_err();

        match err.kind {
            AppErrorKind::External(ExternalError::Processor {
                status,
                message,
                code,
                error_type,
                causes,
                ..
            }) => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "Invalid card_token_id");
                assert_eq!(code.as_deref(), Some("3003"));
                assert_eq!(error_type.as_deref(), Some("bad_request"));
                assert_eq!(causes.len(), 1);
                assert_eq!(causes[0]["description"], "Invalid card_token_id");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_payment() {
        let base = spawn_fake_mercado_pago().await;
        let mp = provider(base);

        let payment = mp.get_payment("1325871234").await.unwrap();
        assert_eq!(payment.status, "approved");
        assert_eq!(
            payment.date_approved.unwrap().to_rfc3339(),
            "2024-03-01T14:05:00+00:00"
        );

        let err = mp.get_payment("404").await.unwrap_err();
        assert!(matches!(
            err.kind,
            AppErrorKind::External(ExternalError::Processor { status: Some(404), ref provider, .. })
                if provider == "Mercado Pago"
        ));
    }

    #[tokio::test]
    async fn test_payment_id_cannot_escape_payments_path() {
        let (base, seen) = spawn_recording_mercado_pago().await;
        let mp = provider(base);

        let err = mp.get_payment("../../users/me?x=").await.unwrap_err();
        assert!(matches!(
            err.kind,
            AppErrorKind::External(ExternalError::Processor { status: Some(404), .. })
        ));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["/v1/payments/..%2F..%2Fusers%2Fme%3Fx=".to_string()]
        );

        let err = mp.get_payment("..").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
