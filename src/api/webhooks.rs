//! Webhook endpoints. Both always answer 200.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use http::HeaderMap;
use std::collections::HashMap;

use crate::api::AppState;
use crate::webhooks::signature::{
    MERCADO_PAGO_REQUEST_ID_HEADER, MERCADO_PAGO_SIGNATURE_HEADER, STRIPE_SIGNATURE_HEADER,
};
use crate::webhooks::{DeliveryMeta, WebhookAck, WebhookSource};

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let meta = DeliveryMeta {
        signature: header(&headers, STRIPE_SIGNATURE_HEADER),
        ..Default::default()
    };
    Json(
        state
            .webhooks
            .receive(WebhookSource::Stripe, &body, &meta)
            .await,
    )
}

pub async fn mercado_pago_webhook(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let params = query.map(|Query(params)| params).unwrap_or_default();
    let meta = DeliveryMeta {
        signature: header(&headers, MERCADO_PAGO_SIGNATURE_HEADER),
        request_id: header(&headers, MERCADO_PAGO_REQUEST_ID_HEADER),
        data_id: params.get("data.id").cloned(),
    };
    Json(
        state
            .webhooks
            .receive(WebhookSource::MercadoPago, &body, &meta)
            .await,
    )
}
