use crate::auth::Claims;
use crate::error::{ApiError, ApiJson};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use craftd_common::{
    Action, ActionOutcome, CommandRecord, CraftdError, CreationRequest, InstanceDescriptor,
};
use serde_json::json;
use tracing::{info, warn};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.runtime.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "runtime": "reachable" })),
        ),
        Err(e) => {
            warn!(error = %e, "Container runtime unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "runtime": e.message() })),
            )
        }
    }
}

pub async fn me(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(json!({ "id": claims.sub, "username": claims.username }))
}

pub async fn list_servers(
    State(state): State<AppState>,
) -> Result<Json<Vec<InstanceDescriptor>>, ApiError> {
    Ok(Json(state.inspector.list().await?))
}

pub async fn create_server(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(request): ApiJson<CreationRequest>,
) -> Result<(StatusCode, Json<InstanceDescriptor>), ApiError> {
    info!(user = %claims.username, name = %request.name, "Create server requested");
    let descriptor = state.provisioner.create(&request).await?;
    Ok((StatusCode::CREATED, Json(descriptor)))
}

pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstanceDescriptor>, ApiError> {
    Ok(Json(state.inspector.describe(&id).await?))
}

pub async fn server_action(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    ApiJson(action): ApiJson<Action>,
) -> Result<Json<ActionOutcome>, ApiError> {
    info!(
        user = %claims.username,
        container_id = %id,
        action = action.name(),
        "Action requested"
    );
    Ok(Json(state.executor.execute(&id, action).await?))
}

pub async fn command_record(
    State(state): State<AppState>,
    Path((id, dispatch_id)): Path<(String, String)>,
) -> Result<Json<CommandRecord>, ApiError> {
    state
        .executor
        .command_record(&id, &dispatch_id)
        .map(Json)
        .ok_or_else(|| CraftdError::NotFound(format!("{id}/commands/{dispatch_id}")).into())
}
