//! HTTP translation of [`AppError`]

use crate::error::{AppError, AppErrorKind, ExternalError};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::{json, Value};
use tracing::{error, warn};

/// Status code and JSON body for an error
pub fn error_parts(err: &AppError) -> (StatusCode, Value) {
    match &err.kind {
        AppErrorKind::Validation(e) => (
            StatusCode::BAD_REQUEST,
            json!({
                "statusCode": 400,
                "message": e.to_string(),
                "error": "Bad Request",
            }),
        ),
        AppErrorKind::External(ExternalError::Processor {
            status,
            message,
            code,
            error_type,
            causes,
            ..
        }) => {
            let status = status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut body = json!({
                "statusCode": status.as_u16(),
                "message": message,
                "type": error_type,
                "code": code,
            });
            if !causes.is_empty() {
                body["causes"] = Value::Array(causes.clone());
            }
            (status, body)
        }
        AppErrorKind::External(ExternalError::PaymentMethodNotEnabled {
            message,
            help_url,
            ..
        }) => (
            StatusCode::BAD_REQUEST,
            json!({
                "statusCode": 400,
                "message": message,
                "type": "pix_not_enabled",
                "code": "payment_method_not_available",
                "helpUrl": help_url,
            }),
        ),
        AppErrorKind::External(ExternalError::Transport { is_timeout, .. }) => {
            let status = if *is_timeout {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            (
                status,
                json!({
                    "statusCode": status.as_u16(),
                    "message": err.to_string(),
                    "error": status.canonical_reason().unwrap_or("Bad Gateway"),
                }),
            )
        }
        AppErrorKind::External(ExternalError::InvalidResponse { .. }) => (
            StatusCode::BAD_GATEWAY,
            json!({
                "statusCode": 502,
                "message": err.to_string(),
                "error": "Bad Gateway",
            }),
        ),
        AppErrorKind::Infrastructure(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "statusCode": 500,
                "message": "Internal server error",
                "error": "Internal Server Error",
            }),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = error_parts(&self);
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            warn!("Request rejected with {}: {}", status, self);
        }
        (status, Json(body)).into_response()
    }
}
