//! Error taxonomy surfaced to the browser
//!
//! Every failure becomes `{success:false, message, code}`. Upstream 401/403
//! collapse into `AUTH_ERROR`; any other upstream failure keeps its status
//! under `API_ERROR`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::proxy::upstream::client::{UpstreamError, UpstreamResponse};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    CredentialsRequired(String),

    #[error("Authentication failed. Please check your credentials.")]
    Auth(StatusCode),

    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    CredentialsLocked(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to fetch IPFS content")]
    Gateway(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CredentialsRequired(_) => "CREDENTIALS_REQUIRED",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::CredentialsLocked(_) => "CREDENTIALS_LOCKED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Gateway(_) => "GATEWAY_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::CredentialsRequired(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(status) => *status,
            Self::Api { status, .. } => *status,
            Self::Validation(_) | Self::CredentialsLocked(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.to_string(),
            "code": self.code(),
        });
        if let Self::Gateway(detail) = &self {
            body["error"] = Value::String(detail.clone());
        }
        (self.status(), Json(body)).into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        tracing::warn!("Upstream request failed: {}", err);
        ApiError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

/// Map an upstream response onto the taxonomy; 2xx passes through
pub fn translate(response: UpstreamResponse) -> Result<UpstreamResponse, ApiError> {
    let status = response.status;
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Auth(status));
    }
    Err(ApiError::Api {
        status,
        message: upstream_message(status, &response.body),
    })
}

fn upstream_message(status: StatusCode, body: &Value) -> String {
    let field = |name: &str| {
        body.get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    field("message")
        .or_else(|| field("error"))
        .or_else(|| body.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn upstream(status: u16, body: Value) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body,
        }
    }

    #[test]
    fn success_passes_through() {
        let resp = translate(upstream(200, json!({"ok": true}))).unwrap();
        assert_eq!(resp.body["ok"], json!(true));
    }

    #[test]
    fn forbidden_becomes_auth_error_with_same_status() {
        let err = translate(upstream(403, json!({"message": "bad secret"}))).unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "AUTH_ERROR");
        assert_eq!(err.to_string(), "Authentication failed. Please check your credentials.");
    }

    #[test]
    fn other_failures_keep_status_and_message() {
        let err = translate(upstream(404, json!({"message": "Group not found"}))).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "API_ERROR");
        assert_eq!(err.to_string(), "Group not found");

        let err = translate(upstream(502, json!("Bad Gateway"))).unwrap_err();
        assert_eq!(err.to_string(), "Bad Gateway");

        let err = translate(upstream(500, Value::Null)).unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status code 500");
    }

    #[test]
    fn error_field_is_used_when_message_missing() {
        let err = translate(upstream(422, json!({"error": "file_hash missing"}))).unwrap_err();
        assert_eq!(err.to_string(), "file_hash missing");
    }

    #[test]
    fn codes_and_statuses() {
        let cases = [
            (ApiError::CredentialsRequired("x".into()), StatusCode::UNAUTHORIZED, "CREDENTIALS_REQUIRED"),
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (ApiError::CredentialsLocked("x".into()), StatusCode::BAD_REQUEST, "CREDENTIALS_LOCKED"),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ApiError::Gateway("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "GATEWAY_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }
}
