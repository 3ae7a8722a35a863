//! Upstream client for the storage and stamping webhook API

use reqwest::{header::HeaderMap, multipart, Client, StatusCode};
use serde_json::Value;
use tokio::time::Duration;

use crate::proxy::credentials::redact;
use crate::proxy::upstream::commands::{CommandBody, WebhookCommand};

const GATEWAY_USER_AGENT: &str = "Mozilla/5.0 (compatible; FileBrowser/1.0)";
const GATEWAY_ACCEPT: &str = "image/*,text/*,application/*,*/*";
const GATEWAY_MAX_REDIRECTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed with status code {}", .0.as_u16())]
    Status(StatusCode),
}

/// Response of a webhook call, body decoded as JSON where possible
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http_client: Client,
    gateway_client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        gateway_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(request_timeout)
            .user_agent(concat!("clstamp-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let gateway_client = Client::builder()
            .timeout(gateway_timeout)
            .redirect(reqwest::redirect::Policy::limited(GATEWAY_MAX_REDIRECTS))
            .user_agent(GATEWAY_USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            gateway_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn webhook_url(&self, api_key: &str) -> String {
        format!("{}/webhook/{}", self.base_url, api_key)
    }

    /// Send one command to `/webhook/{api_key}`. Non-2xx statuses are
    /// returned, not raised; only transport failures are errors.
    pub async fn execute(
        &self,
        api_key: &str,
        command: WebhookCommand,
    ) -> Result<UpstreamResponse, UpstreamError> {
        tracing::debug!(
            "Upstream {} /webhook/{} headers={:?}",
            command.method,
            redact(api_key),
            command.header_names()
        );

        let mut request = self
            .http_client
            .request(command.method.clone(), self.webhook_url(api_key));
        for (name, value) in &command.headers {
            request = request.header(*name, value);
        }

        request = match command.body {
            CommandBody::Empty => request,
            CommandBody::Json(body) => request.json(&body),
            CommandBody::File(file) => {
                let mut part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name);
                part = part.mime_str(
                    file.content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream"),
                )?;
                request.multipart(multipart::Form::new().part("file", part))
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        if !status.is_success() {
            tracing::debug!("Upstream {} returned {}", command.method, status);
        }

        Ok(UpstreamResponse { status, headers, body })
    }

    /// Fetch gateway content for the browser; the body is left unread so the
    /// caller can stream it.
    pub async fn fetch_gateway(&self, url: &str) -> Result<reqwest::Response, UpstreamError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UpstreamError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        tracing::debug!("Relaying gateway content from {}", parsed);

        let response = self
            .gateway_client
            .get(parsed)
            .header(reqwest::header::ACCEPT, GATEWAY_ACCEPT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status()));
        }
        Ok(response)
    }
}
