//! Proxy Server - Axum HTTP server

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use rand::Rng;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::proxy::credentials::{CredentialSource, CredentialStore};
use crate::proxy::handlers;
use crate::proxy::session_manager::{session_layer, SessionManager};
use crate::proxy::upstream::UpstreamClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub upstream: Arc<UpstreamClient>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(credentials: CredentialStore, upstream: UpstreamClient, sessions: SessionManager) -> Self {
        Self {
            credentials: Arc::new(credentials),
            upstream: Arc::new(upstream),
            sessions: Arc::new(sessions),
        }
    }
}

/// Build the axum router.
///
/// Every `/api` route runs inside the session and CORS layers. The gateway
/// relay and the bare health checks sit outside them; the relay sets its own
/// permissive CORS headers.
pub fn router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin: HeaderValue = cors_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin {:?}: {}", cors_origin, e))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = Router::new()
        // Credential store
        .route(
            "/api/credentials",
            get(handlers::credentials::read_credentials)
                .post(handlers::credentials::save_credentials)
                .delete(handlers::credentials::clear_credentials),
        )
        // Stats (HEAD-backed)
        .route("/api/stats", get(handlers::stats::tenant_stats))
        .route("/api/group-stats/:group_id", get(handlers::stats::group_stats))
        // Groups and files
        .route("/api/groups", get(handlers::files::list_groups))
        .route("/api/files", get(handlers::files::list_files))
        .route("/api/file/:hash", get(handlers::files::file_info))
        .route("/api/file", delete(handlers::files::delete_file))
        .route("/api/upload", post(handlers::files::upload))
        .route("/api/stamp", patch(handlers::files::stamp_collection))
        .route("/api/healthcheck", get(health_check_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.sessions),
            session_layer,
        ))
        .layer(cors)
        // Outside the session/CORS layers
        .route("/ipfs", get(handlers::ipfs::relay))
        .route("/health", get(health_check_handler))
        .route("/healthz", get(health_check_handler))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024)) // 100MB
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Proxy server instance
pub struct ProxyServer {
    host: String,
    port: u16,
    cors_origin: String,
    sweep_interval: Duration,
    state: AppState,
}

impl ProxyServer {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(
            config.base_url()?,
            Duration::from_secs(config.upstream.request_timeout),
            Duration::from_secs(config.upstream.gateway_timeout),
        )?;

        let secret = match &config.session.secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                tracing::warn!("SESSION_SECRET not set; generated an ephemeral one (sessions won't survive a restart)");
                generate_secret()
            }
        };
        let sessions = SessionManager::new(
            &secret,
            Duration::from_secs(config.session.max_age_secs),
        )?;

        let credentials = CredentialStore::from_config(&config.credentials);

        Ok(Self {
            host: config.server.bind_address().to_string(),
            port: config.server.port,
            cors_origin: config.server.cors_origin.clone(),
            sweep_interval: Duration::from_secs(config.session.sweep_interval_secs.max(1)),
            state: AppState::new(credentials, upstream, sessions),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the proxy server (blocking)
    pub async fn run(self) -> anyhow::Result<()> {
        match self.state.credentials.source() {
            CredentialSource::Environment => {
                let key = self
                    .state
                    .credentials
                    .environment()
                    .map(|c| c.redacted_key())
                    .unwrap_or_default();
                tracing::info!("Using hardcoded credentials from environment variables ({})", key);
            }
            CredentialSource::Session => tracing::info!("Using session-based credentials"),
        }

        let sweeper = self.state.sessions.spawn_sweeper(self.sweep_interval);
        let app = router(self.state, &self.cors_origin)?;

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!("Proxy server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        sweeper.abort();
        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

/// Random alphanumeric secret suitable for signing session cookies
pub fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Health check handler
async fn health_check_handler() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "clstamp-proxy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
        .into_response()
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let upstream = UpstreamClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let sessions = SessionManager::new("unit-secret", Duration::from_secs(60)).unwrap();
        let state = AppState::new(CredentialStore::new(None), upstream, sessions);
        router(state, "http://localhost:3000").unwrap()
    }

    #[tokio::test]
    async fn preflight_allows_browser_origin_with_credentials() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/groups")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn forged_cookie_does_not_resolve_a_session() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/credentials")
                    .header(header::COOKIE, "clstamp.sid=someone-else.deadbeef")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn saving_credentials_issues_session_cookie() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/credentials")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"apikey":"abc123","secretKey":"xyz"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("clstamp.sid="));
        assert!(cookie.contains("Max-Age=60"));
    }

    #[tokio::test]
    async fn api_healthcheck_answers_browser_origin() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/healthcheck")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(headers.get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn generated_secrets_differ() {
        let a = generate_secret();
        assert_eq!(a.len(), 48);
        assert_ne!(a, generate_secret());
    }

    #[test]
    fn server_requires_base_url() {
        assert!(ProxyServer::new(&Config::default()).is_err());
    }

    #[test]
    fn server_builds_from_config() {
        let mut config = Config::default();
        config.upstream.base_url = Some("http://upstream.test/".into());
        config.credentials.api_key = Some("envkey".into());
        config.credentials.api_secret = Some("envsecret".into());
        let server = ProxyServer::new(&config).unwrap();
        assert_eq!(server.state().upstream.base_url(), "http://upstream.test");
        assert_eq!(server.state().credentials.source(), CredentialSource::Environment);
    }
}
