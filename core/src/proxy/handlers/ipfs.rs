//! Gateway relay
//!
//! Browsers can't always load gateway content directly (CORS, opaque
//! response blocking), so `/ipfs?url=` fetches it server-side and streams it
//! back with permissive CORS headers.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use serde::Deserialize;

use crate::proxy::error::ApiError;
use crate::proxy::server::AppState;

const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CACHE_CONTROL,
    header::ETAG,
];

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    url: Option<String>,
}

pub async fn relay(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("URL query parameter is required".to_string()))?;

    let upstream = state.upstream.fetch_gateway(&url).await.map_err(|e| {
        tracing::warn!("Gateway relay failed for {}: {}", url, e);
        ApiError::Gateway(e.to_string())
    })?;

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(headers) = builder.headers_mut() {
        for name in FORWARDED_HEADERS {
            if let Some(value) = upstream.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, HEAD"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Range"),
        );
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::Gateway(e.to_string()))
}
