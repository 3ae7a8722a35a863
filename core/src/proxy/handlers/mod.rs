//! Browser-facing handlers
//!
//! Each handler resolves credentials, validates its input, then makes exactly
//! one upstream call through [`forward`].

pub mod credentials;
pub mod files;
pub mod ipfs;
pub mod stats;

use serde_json::Value;

use crate::proxy::credentials::Credentials;
use crate::proxy::error::{translate, ApiError};
use crate::proxy::server::AppState;
use crate::proxy::session_manager::SessionContext;
use crate::proxy::upstream::commands::WebhookCommand;
use crate::proxy::upstream::UpstreamResponse;

/// Dispatch a command and translate the outcome. An auth rejection drops
/// the rejected credentials from the session before the error is returned.
pub(crate) async fn forward(
    state: &AppState,
    session: &SessionContext,
    credentials: &Credentials,
    command: WebhookCommand,
) -> Result<UpstreamResponse, ApiError> {
    let response = state.upstream.execute(&credentials.api_key, command).await?;
    match translate(response) {
        Ok(response) => Ok(response),
        Err(err) => {
            if err.is_auth() {
                tracing::warn!(
                    "Upstream rejected credentials {} with {}",
                    credentials.redacted_key(),
                    err.status()
                );
                state.credentials.invalidate(session, credentials);
            }
            Err(err)
        }
    }
}

/// Required, non-empty string field from a JSON body
pub(crate) fn required_str<'a>(body: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| body.get(*name).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|v| !v.is_empty())
}
