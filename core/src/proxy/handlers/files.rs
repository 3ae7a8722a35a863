//! Groups and files: listing, detail, upload, delete and stamping

use axum::{
    extract::{rejection::JsonRejection, Extension, FromRequest, Json, Multipart, Path, Query, Request, State},
    http::header,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{resolve_file_value, GroupStats, Network};
use crate::proxy::error::ApiError;
use crate::proxy::handlers::{forward, required_str};
use crate::proxy::server::AppState;
use crate::proxy::session_manager::SessionContext;
use crate::proxy::upstream::commands::{self, FilePart, UploadOptions};

const DEFAULT_UPLOAD_NAME: &str = "upload.bin";

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    let response = forward(&state, &session, &credentials, commands::list_groups(&credentials)).await?;

    if let Some(groups) = response.body.get("groups").and_then(Value::as_array) {
        tracing::debug!("Listed {} group(s)", groups.len());
    }

    Ok(Json(response.body))
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    #[serde(rename = "groupId")]
    group_id: Option<String>,
}

/// Files in a group, with `is_stamped` re-derived on every entry and
/// a `groupStats` summary computed from the list.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    let group_id = query
        .group_id
        .filter(|g| !g.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Group ID is required".to_string()))?;

    let response = forward(
        &state,
        &session,
        &credentials,
        commands::list_files(&credentials, &group_id),
    )
    .await?;

    let mut body = response.body;
    let stats = body
        .get_mut("files")
        .and_then(Value::as_array_mut)
        .map(|files| {
            for file in files.iter_mut() {
                resolve_file_value(file);
            }
            GroupStats::from_files(files)
        });

    if let (Some(stats), Value::Object(map)) = (stats, &mut body) {
        tracing::debug!(
            "Group {}: {}/{} stamped",
            group_id,
            stats.stamped_files,
            stats.total_files
        );
        map.insert(
            "groupStats".to_string(),
            serde_json::to_value(stats).unwrap_or(Value::Null),
        );
    }

    Ok(Json(body))
}

pub async fn file_info(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    if hash.trim().is_empty() {
        return Err(ApiError::Validation("Hash is required".to_string()));
    }

    let response = forward(&state, &session, &credentials, commands::file_info(&credentials, &hash)).await?;

    let mut body = response.body;
    if let Some(data) = body.get_mut("data") {
        resolve_file_value(data);
    }
    Ok(Json(body))
}

/// Fields accepted by `POST /api/upload`, from either multipart or JSON
#[derive(Debug, Default)]
struct UploadForm {
    group_id: Option<String>,
    network: Option<Network>,
    options: UploadOptions,
    file: Option<FilePart>,
}

impl UploadForm {
    fn set_text(&mut self, name: &str, value: String) -> Result<(), ApiError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Ok(());
        }
        match name {
            "groupId" | "group_id" => {
                if self.group_id.is_none() {
                    self.group_id = Some(value);
                }
            }
            "network" => self.network = Some(parse_network(&value)?),
            "stamp-immediately" | "stampImmediately" => {
                self.options.stamp_immediately = Some(parse_flag(name, &value)?)
            }
            "export-links" | "exportLinks" => {
                self.options.export_links = Some(parse_flag(name, &value)?)
            }
            _ => tracing::debug!("Ignoring upload field {:?}", name),
        }
        Ok(())
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Validation(e.body_text()))? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_UPLOAD_NAME)
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field.bytes().await.map_err(|e| ApiError::Validation(e.body_text()))?;
                form.file = Some(FilePart { file_name, content_type, bytes });
            } else {
                let text = field.text().await.map_err(|e| ApiError::Validation(e.body_text()))?;
                form.set_text(&name, text)?;
            }
        }
        Ok(form)
    }

    fn from_json(body: &Value) -> Result<Self, ApiError> {
        let mut form = Self::default();
        let Some(object) = body.as_object() else {
            return Ok(form);
        };
        for (name, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            form.set_text(name, text)?;
        }
        Ok(form)
    }
}

fn parse_network(value: &str) -> Result<Network, ApiError> {
    value.parse().map_err(|e| ApiError::Validation(format!("{}", e)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ApiError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ApiError::Validation(format!("{} must be true or false", name))),
    }
}

/// Upload a file into a group, or create the group when no file is sent.
pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let form = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        UploadForm::from_multipart(multipart).await?
    } else {
        let Json(body) = Json::<Value>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        UploadForm::from_json(&body)?
    };

    let group_id = form
        .group_id
        .ok_or_else(|| ApiError::Validation("Group ID is required".to_string()))?;
    let network = form.network.unwrap_or(credentials.network);

    let command = match form.file {
        Some(file) => {
            tracing::info!(
                "Uploading {} ({} bytes) to group {} on {}",
                file.file_name,
                file.bytes.len(),
                group_id,
                network
            );
            commands::upload_file(&credentials, &group_id, network, file, form.options)
        }
        None => {
            tracing::info!("Creating group {} on {}", group_id, network);
            commands::create_group(&credentials, &group_id, network)
        }
    };

    let response = forward(&state, &session, &credentials, command).await?;
    Ok(Json(response.body))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    let Json(body) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let (Some(file_hash), Some(group_id)) = (
        required_str(&body, &["fileHash", "file_hash"]),
        required_str(&body, &["groupId", "group_id"]),
    ) else {
        return Err(ApiError::Validation(
            "File hash and group ID are required".to_string(),
        ));
    };

    tracing::info!("Deleting {} from group {}", file_hash, group_id);
    let response = forward(
        &state,
        &session,
        &credentials,
        commands::delete_file(&credentials, group_id, file_hash),
    )
    .await?;
    Ok(Json(response.body))
}

/// Stamp every file in a group. The group's own network wins over the
/// session network when the browser supplies it.
pub async fn stamp_collection(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let credentials = state.credentials.resolve(&session)?;
    let Json(body) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let group_id = required_str(&body, &["groupId", "group_id"])
        .ok_or_else(|| ApiError::Validation("Group ID is required".to_string()))?;
    let network = match required_str(&body, &["network"]) {
        Some(n) => parse_network(n)?,
        None => credentials.network,
    };

    tracing::info!(
        "Stamping collection {} on network {} (session: {})",
        group_id,
        network,
        credentials.network
    );

    let response = forward(
        &state,
        &session,
        &credentials,
        commands::stamp_collection(&credentials, group_id, network),
    )
    .await?;
    Ok(Json(response.body))
}
