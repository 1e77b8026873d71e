use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub gateway_configured: bool,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let database = match &state.pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(()) => "reachable".to_string(),
            Err(_) => "unreachable".to_string(),
        },
        None => "disabled".to_string(),
    };

    let mpesa = &state.config.mpesa;
    let gateway_configured = !mpesa.consumer_key.is_empty()
        && !mpesa.consumer_secret.is_empty()
        && !mpesa.shortcode.is_empty()
        && !mpesa.passkey.is_empty()
        && !mpesa.callback_url.is_empty();

    let status = if database == "unreachable" {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    };

    let response = HealthResponse {
        status,
        version,
        environment: state.config.server.environment.clone(),
        database,
        gateway_configured,
    };

    Ok(Json(response))
}
