use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::api::{health, payments, webhooks, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payments", post(payments::create_payment))
        .route("/payments/config", get(payments::get_public_config))
        .route("/payments/webhook", post(webhooks::stripe_webhook))
        .route("/payments/pix", post(payments::create_pix_payment))
        .route(
            "/payments/pix/:payment_id/status",
            get(payments::get_direct_payment_status),
        )
        .route("/payments/card", post(payments::create_card_payment))
        .route(
            "/payments/card/:payment_id/status",
            get(payments::get_direct_payment_status),
        )
        .route(
            "/payments/:payment_intent_id/status",
            get(payments::get_payment_status),
        )
        .route(
            "/payments/:payment_intent_id/confirm",
            post(payments::confirm_payment),
        )
        .route(
            "/payments/:payment_intent_id/cancel",
            post(payments::cancel_payment),
        )
        .route("/webhooks/mercadopago", post(webhooks::mercado_pago_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::very_permissive()),
        )
        .with_state(state)
}
