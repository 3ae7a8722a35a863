//! Credential store
//!
//! Credentials come from one of two places. Environment credentials are fixed
//! for the life of the process and shadow every session. Otherwise each
//! browser session carries its own set, saved and cleared through the
//! `/api/credentials` endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CredentialsConfig;
use crate::models::Network;
use crate::proxy::error::ApiError;
use crate::proxy::session_manager::SessionContext;

const REDACTED_PREFIX_LEN: usize = 8;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub network: Network,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>, network: Network) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            network,
        }
    }

    /// First 8 characters of the api key followed by `...`
    pub fn redacted_key(&self) -> String {
        redact(&self.api_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.redacted_key())
            .field("secret_key", &"***")
            .field("network", &self.network)
            .finish()
    }
}

pub fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(REDACTED_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    Environment,
    Session,
}

/// Non-sensitive view returned to the browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialsInfo {
    pub apikey: String,
    pub network: Network,
    pub source: CredentialSource,
}

/// Body of `POST /api/credentials`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SaveCredentials {
    #[serde(default)]
    pub apikey: Option<String>,
    #[serde(default, rename = "secretKey")]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub network: Option<Network>,
}

pub struct CredentialStore {
    environment: Option<Credentials>,
}

impl CredentialStore {
    pub fn new(environment: Option<Credentials>) -> Self {
        Self { environment }
    }

    /// Environment credentials exist only when both key and secret are set
    pub fn from_config(config: &CredentialsConfig) -> Self {
        let environment = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key.clone(), secret.clone(), config.network))
            }
            _ => None,
        };
        Self::new(environment)
    }

    pub fn source(&self) -> CredentialSource {
        if self.environment.is_some() {
            CredentialSource::Environment
        } else {
            CredentialSource::Session
        }
    }

    pub fn environment(&self) -> Option<&Credentials> {
        self.environment.as_ref()
    }

    /// Credentials to use for an upstream call, before any network I/O
    pub fn resolve(&self, session: &SessionContext) -> Result<Credentials, ApiError> {
        if let Some(env) = &self.environment {
            return Ok(env.clone());
        }
        session.credentials().ok_or_else(|| {
            ApiError::CredentialsRequired(
                "API credentials not found. Please configure them in the dashboard.".to_string(),
            )
        })
    }

    pub fn save(&self, session: &SessionContext, input: SaveCredentials) -> Result<(), ApiError> {
        if self.environment.is_some() {
            return Err(ApiError::CredentialsLocked(
                "Credentials are hardcoded in environment variables. Cannot override via API."
                    .to_string(),
            ));
        }

        let api_key = input.apikey.filter(|k| !k.is_empty());
        let secret_key = input.secret_key.filter(|s| !s.is_empty());
        let (Some(api_key), Some(secret_key)) = (api_key, secret_key) else {
            return Err(ApiError::Validation(
                "API key and secret key are required".to_string(),
            ));
        };

        let credentials = Credentials::new(api_key, secret_key, input.network.unwrap_or_default());
        tracing::info!(
            "Saved session credentials {} ({})",
            credentials.redacted_key(),
            credentials.network
        );
        session.set_credentials(credentials);
        Ok(())
    }

    pub fn read(&self, session: &SessionContext) -> Result<CredentialsInfo, ApiError> {
        let credentials = self
            .resolve(session)
            .map_err(|_| ApiError::NotFound("No credentials found".to_string()))?;
        Ok(CredentialsInfo {
            apikey: credentials.redacted_key(),
            network: credentials.network,
            source: self.source(),
        })
    }

    pub fn clear(&self, session: &SessionContext) -> Result<(), ApiError> {
        if self.environment.is_some() {
            return Err(ApiError::CredentialsLocked(
                "Credentials are hardcoded in environment variables. Cannot clear via API."
                    .to_string(),
            ));
        }
        session.clear_credentials();
        Ok(())
    }

    /// Upstream rejected `rejected`; forget the session's copy unless it
    /// has been replaced in the meantime
    pub fn invalidate(&self, session: &SessionContext, rejected: &Credentials) {
        if session.clear_credentials_if(rejected) {
            tracing::warn!("Cleared session credentials after upstream auth failure");
        } else {
            tracing::debug!("Rejected credentials are no longer in the session; nothing to clear");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::session_manager::SessionManager;
    use std::sync::Arc;
    use std::time::Duration;

    fn session() -> SessionContext {
        let sessions = Arc::new(SessionManager::new("secret", Duration::from_secs(60)).unwrap());
        SessionContext::new(SessionManager::new_id(), sessions)
    }

    fn input(key: &str, secret: &str) -> SaveCredentials {
        SaveCredentials {
            apikey: Some(key.to_string()),
            secret_key: Some(secret.to_string()),
            network: None,
        }
    }

    #[test]
    fn read_after_save_is_redacted() {
        let store = CredentialStore::new(None);
        let s = session();
        store.save(&s, input("abcdefghijkl", "xyz")).unwrap();

        let info = store.read(&s).unwrap();
        assert_eq!(info.apikey, "abcdefgh...");
        assert_eq!(info.source, CredentialSource::Session);
        assert_eq!(info.network, Network::Public);
    }

    #[test]
    fn short_keys_are_redacted_whole() {
        assert_eq!(redact("abc123"), "abc123...");
    }

    #[test]
    fn missing_fields_fail_validation() {
        let store = CredentialStore::new(None);
        let s = session();
        let err = store.save(&s, input("", "xyz")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        let err = store.save(&s, SaveCredentials::default()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn environment_credentials_lock_save_and_clear() {
        let store = CredentialStore::new(Some(Credentials::new("envkey123456", "envsecret", Network::Private)));
        let s = session();

        assert_eq!(store.save(&s, input("k", "s")).unwrap_err().code(), "CREDENTIALS_LOCKED");
        assert_eq!(store.clear(&s).unwrap_err().code(), "CREDENTIALS_LOCKED");

        let info = store.read(&s).unwrap();
        assert_eq!(info.source, CredentialSource::Environment);
        assert_eq!(info.apikey, "envkey12...");
        assert_eq!(info.network, Network::Private);
    }

    #[test]
    fn resolve_without_credentials_is_required_error() {
        let store = CredentialStore::new(None);
        let err = store.resolve(&session()).unwrap_err();
        assert_eq!(err.code(), "CREDENTIALS_REQUIRED");
        assert_eq!(store.read(&session()).unwrap_err().code(), "NOT_FOUND");
    }

    #[test]
    fn invalidate_drops_session_credentials() {
        let store = CredentialStore::new(None);
        let s = session();
        store.save(&s, input("abc123", "xyz")).unwrap();
        let rejected = store.resolve(&s).unwrap();
        store.invalidate(&s, &rejected);
        assert!(store.resolve(&s).is_err());
    }

    #[test]
    fn invalidate_keeps_credentials_saved_after_the_rejected_call() {
        let store = CredentialStore::new(None);
        let s = session();
        store.save(&s, input("abc123", "xyz")).unwrap();
        let rejected = store.resolve(&s).unwrap();

        store.save(&s, input("newkey456", "fresh")).unwrap();
        store.invalidate(&s, &rejected);

        assert_eq!(store.resolve(&s).unwrap().api_key, "newkey456");
    }

    #[test]
    fn from_config_needs_both_keys() {
        let mut config = CredentialsConfig::default();
        config.api_key = Some("k".into());
        assert_eq!(CredentialStore::from_config(&config).source(), CredentialSource::Session);
        config.api_secret = Some("s".into());
        assert_eq!(CredentialStore::from_config(&config).source(), CredentialSource::Environment);
    }

    #[test]
    fn debug_output_hides_secret() {
        let c = Credentials::new("abcdefghijkl", "top-secret", Network::Public);
        let out = format!("{:?}", c);
        assert!(!out.contains("top-secret"));
        assert!(!out.contains("ijkl"));
    }
}
