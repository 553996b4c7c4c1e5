//! Payment handlers
//!
//! Thin wrappers: body extraction failures become validation errors, every
//! other decision lives in [`PaymentService`](crate::payments::PaymentService).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::AppState;
use crate::error::{AppResult, ValidationError};
use crate::payments::types::{
    CardPaymentView, ConfirmPaymentRequest, CreateCardPaymentRequest, CreatePaymentRequest,
    CreatePixPaymentRequest, IntentStatusView, IntentView, PaymentStatusView, PixPaymentView,
    PublicConfigView,
};

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ValidationError::MalformedBody {
            message: rejection.body_text(),
        }
        .into()
    })
}

pub async fn create_payment(
    State(state): State<AppState>,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<IntentView>)> {
    let request = json_body(payload)?;
    let view = state.payments.create_intent(request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> AppResult<Json<IntentStatusView>> {
    Ok(Json(state.payments.intent_status(&intent_id).await?))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
    payload: Option<Json<ConfirmPaymentRequest>>,
) -> AppResult<Json<IntentView>> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    Ok(Json(state.payments.confirm_intent(&intent_id, request).await?))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> AppResult<Json<IntentView>> {
    Ok(Json(state.payments.cancel_intent(&intent_id).await?))
}

pub async fn create_pix_payment(
    State(state): State<AppState>,
    payload: Result<Json<CreatePixPaymentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PixPaymentView>)> {
    let request = json_body(payload)?;
    let view = state.payments.create_pix(request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn create_card_payment(
    State(state): State<AppState>,
    payload: Result<Json<CreateCardPaymentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CardPaymentView>)> {
    let request = json_body(payload)?;
    let view = state.payments.create_card(request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Shared by the PIX and card status routes
pub async fn get_direct_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> AppResult<Json<PaymentStatusView>> {
    Ok(Json(state.payments.payment_status(&payment_id).await?))
}

pub async fn get_public_config(State(state): State<AppState>) -> Json<PublicConfigView> {
    Json(PublicConfigView {
        public_key: state.public_key.clone(),
    })
}
