//! Proxy module - session-scoped forwarder in front of the webhook API

pub mod credentials;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session_manager;
pub mod upstream;

pub use credentials::{CredentialSource, CredentialStore, Credentials};
pub use error::ApiError;
pub use server::{router, AppState, ProxyServer};
pub use session_manager::{SessionContext, SessionManager};
pub use upstream::UpstreamClient;
