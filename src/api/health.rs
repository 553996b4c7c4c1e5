use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub override_store: String,
    pub override_store_status: String,
}

/// Reports `degraded` while the override store is unreachable
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, store_status) = match state.payments.override_health().await {
        Ok(()) => ("healthy", "ok"),
        Err(e) => {
            warn!(
                "Override store '{}' failed its health check: {}",
                state.payments.override_backend(),
                e
            );
            ("degraded", "unavailable")
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        override_store: state.payments.override_backend().to_string(),
        override_store_status: store_status.to_string(),
    })
}
