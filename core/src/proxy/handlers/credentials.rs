//! `/api/credentials` - save, read and clear session credentials

use axum::extract::{rejection::JsonRejection, Extension, Json, State};
use serde_json::{json, Value};

use crate::proxy::credentials::SaveCredentials;
use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;
use crate::proxy::session_manager::SessionContext;

pub async fn save_credentials(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let input: SaveCredentials = serde_json::from_value(body)
        .map_err(|e| ApiError::Validation(format!("Invalid credentials payload: {}", e)))?;

    state.credentials.save(&session, input)?;

    Ok(Json(json!({
        "success": true,
        "message": "Credentials saved successfully"
    })))
}

pub async fn read_credentials(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, ApiError> {
    let info = state.credentials.read(&session)?;
    Ok(Json(json!({ "success": true, "data": info })))
}

pub async fn clear_credentials(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, ApiError> {
    state.credentials.clear(&session)?;
    Ok(Json(json!({
        "success": true,
        "message": "Credentials cleared successfully"
    })))
}
