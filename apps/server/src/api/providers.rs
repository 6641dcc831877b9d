use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use covermesh_quote_engine::{CircuitStats, ProviderConfig, ProviderHealth};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub providers: Vec<ProviderHealth>,
    pub circuits: Vec<CircuitStats>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityResponse {
    pub provider_id: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderConfig>> {
    Json(state.orchestrator.registry().configs())
}

async fn update_provider(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Json(config): Json<ProviderConfig>,
) -> ApiResult<Json<ProviderConfig>> {
    if config.id != provider_id {
        return Err(ApiError::BadRequest(format!(
            "provider id '{}' does not match path '{}'",
            config.id, provider_id
        )));
    }

    let registry = state.orchestrator.registry();
    registry.update_provider_config(config)?;
    let updated = registry.get(&provider_id).ok_or(ApiError::NotFound)?;
    Ok(Json(updated.config()))
}

async fn provider_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        providers: state.orchestrator.provider_health(),
        circuits: state.orchestrator.circuit_stats(),
    })
}

/// Reachability is reported in the body; only unknown providers are errors.
async fn check_connectivity(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> ApiResult<Json<ConnectivityResponse>> {
    if state.orchestrator.registry().get(&provider_id).is_none() {
        return Err(ApiError::NotFound);
    }

    let response = match state.orchestrator.check_connectivity(&provider_id).await {
        Ok(elapsed) => ConnectivityResponse {
            provider_id,
            reachable: true,
            response_time_ms: Some(elapsed.as_millis() as u64),
            error: None,
        },
        Err(e) => ConnectivityResponse {
            provider_id,
            reachable: false,
            response_time_ms: None,
            error: Some(e.to_string()),
        },
    };
    Ok(Json(response))
}

async fn reset_circuit(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> ApiResult<()> {
    state.orchestrator.registry().reset_circuit(&provider_id)?;
    tracing::info!("Circuit for '{}' reset via API", provider_id);
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", get(list_providers))
        .route("/providers/health", get(provider_health))
        .route("/providers/{id}", put(update_provider))
        .route("/providers/{id}/connectivity", get(check_connectivity))
        .route("/providers/{id}/circuit/reset", post(reset_circuit))
}
