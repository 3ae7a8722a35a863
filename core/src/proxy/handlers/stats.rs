//! Stats endpoints. Both are backed by HEAD requests whose answers live in
//! `X-*` response headers rather than a body.

use axum::extract::{Extension, Json, Path, State};
use serde_json::{json, Value};

use crate::models::{GroupStats, TenantStats};
use crate::proxy::error::ApiError;
use crate::proxy::handlers::forward;
use crate::proxy::server::AppState;
use crate::proxy::session_manager::SessionContext;
use crate::proxy::upstream::commands;

pub async fn tenant_stats(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    let response = forward(&state, &session, &credentials, commands::tenant_stats(&credentials)).await?;

    let stats = TenantStats::from_headers(&response.headers);
    Ok(Json(json!({ "success": true, "data": stats })))
}

pub async fn group_stats(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    if group_id.trim().is_empty() {
        return Err(ApiError::Validation("Group ID is required".to_string()));
    }

    let response = forward(
        &state,
        &session,
        &credentials,
        commands::group_stats(&credentials, &group_id),
    )
    .await?;

    let stats = GroupStats::from_headers(&response.headers);
    tracing::debug!("Group {} stats: {:?}", group_id, stats);
    Ok(Json(json!({ "success": true, "data": stats })))
}
