use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use covermesh_quote_engine::OrganizationOverride;

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

async fn list_overrides(
    State(state): State<Arc<AppState>>,
    Path(organization_id): Path<String>,
) -> ApiResult<Json<BTreeMap<String, OrganizationOverride>>> {
    let overrides = state.overrides.get_overrides(&organization_id).await?;
    Ok(Json(overrides.into_iter().collect()))
}

async fn set_override(
    State(state): State<Arc<AppState>>,
    Path((organization_id, provider_id)): Path<(String, String)>,
    Json(layer): Json<OrganizationOverride>,
) -> ApiResult<Json<OrganizationOverride>> {
    if state.orchestrator.registry().get(&provider_id).is_none() {
        return Err(ApiError::NotFound);
    }
    state
        .overrides
        .set_override(&organization_id, &provider_id, layer.clone())
        .await?;
    Ok(Json(layer))
}

async fn remove_override(
    State(state): State<Arc<AppState>>,
    Path((organization_id, provider_id)): Path<(String, String)>,
) -> ApiResult<()> {
    state
        .overrides
        .remove_override(&organization_id, &provider_id)
        .await?;
    if let Some(handle) = state.orchestrator.registry().get(&provider_id) {
        handle.release_org_limiter(&organization_id);
    }
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/organizations/{org}/overrides", get(list_overrides))
        .route(
            "/organizations/{org}/overrides/{provider}",
            put(set_override).delete(remove_override),
        )
}
