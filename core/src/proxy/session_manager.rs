//! Session store for browser credentials
//!
//! Sessions live in memory, keyed by a random id. The browser holds the id in
//! a signed cookie (`<id>.<hex hmac-sha256>`), and every request that touches a
//! live session slides its expiry forward.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::proxy::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "clstamp.sid";

struct SessionEntry {
    credentials: Option<Credentials>,
    expires_at: Instant,
}

pub struct SessionManager {
    entries: DashMap<String, SessionEntry>,
    mac: HmacSha256,
    max_age: Duration,
}

impl SessionManager {
    pub fn new(secret: &str, max_age: Duration) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;
        Ok(Self {
            entries: DashMap::new(),
            mac,
            max_age,
        })
    }

    pub fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn signature(&self, id: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Cookie value for a session id
    pub fn sign(&self, id: &str) -> String {
        format!("{}.{}", id, hex::encode(self.signature(id)))
    }

    /// Session id from a signed cookie value, if the signature holds
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, sig_hex) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let expected = hex::decode(sig_hex).ok()?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&expected).ok()?;
        Some(id.to_string())
    }

    /// Find our cookie in a `Cookie:` header and verify it
    pub fn id_from_cookie_header(&self, header: &str) -> Option<String> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.verify(value))
    }

    /// `Set-Cookie` value that (re)issues the session cookie
    pub fn cookie(&self, id: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            self.sign(id),
            self.max_age.as_secs()
        )
    }

    /// Extend a live session. Returns false (and drops the entry) if it
    /// has expired or never existed.
    pub fn touch(&self, id: &str) -> bool {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(id) {
            if now < entry.expires_at {
                entry.expires_at = now + self.max_age;
                return true;
            }
        } else {
            return false;
        }
        self.entries.remove(id);
        false
    }

    pub fn credentials(&self, id: &str) -> Option<Credentials> {
        let entry = self.entries.get(id)?;
        if Instant::now() >= entry.expires_at {
            drop(entry);
            self.entries.remove(id);
            return None;
        }
        entry.credentials.clone()
    }

    /// Store credentials, creating the session if needed
    pub fn set_credentials(&self, id: &str, credentials: Credentials) {
        let expires_at = Instant::now() + self.max_age;
        self.entries.insert(
            id.to_string(),
            SessionEntry {
                credentials: Some(credentials),
                expires_at,
            },
        );
    }

    /// Drop credentials; the session itself stays alive
    pub fn clear_credentials(&self, id: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => entry.credentials.take().is_some(),
            None => false,
        }
    }

    /// Drop credentials only while they still equal `expected`. The check
    /// and the clear happen under the same entry lock.
    pub fn clear_credentials_if(&self, id: &str, expected: &Credentials) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) if entry.credentials.as_ref() == Some(expected) => {
                entry.credentials = None;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cleanup expired entries
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if now >= entry.expires_at {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Periodically sweep expired sessions until the runtime shuts down
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let sessions = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = sessions.cleanup_expired();
                if removed > 0 {
                    tracing::debug!("Swept {} expired session(s), {} live", removed, sessions.len());
                }
            }
        })
    }
}

/// Per-request view of the caller's session
#[derive(Clone)]
pub struct SessionContext {
    id: String,
    sessions: Arc<SessionManager>,
}

impl SessionContext {
    pub fn new(id: String, sessions: Arc<SessionManager>) -> Self {
        Self { id, sessions }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.sessions.credentials(&self.id)
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.sessions.set_credentials(&self.id, credentials);
    }

    pub fn clear_credentials(&self) -> bool {
        self.sessions.clear_credentials(&self.id)
    }

    pub fn clear_credentials_if(&self, expected: &Credentials) -> bool {
        self.sessions.clear_credentials_if(&self.id, expected)
    }
}

/// Resolve the session cookie before the handler runs and re-issue it after.
///
/// Requests without a valid cookie get a fresh id, but the cookie is only
/// sent once something has been stored under it.
pub async fn session_layer(
    State(sessions): State<Arc<SessionManager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| sessions.id_from_cookie_header(h));

    let id = match presented {
        Some(id) if sessions.touch(&id) => id,
        _ => SessionManager::new_id(),
    };

    req.extensions_mut()
        .insert(SessionContext::new(id.clone(), Arc::clone(&sessions)));

    let mut response = next.run(req).await;

    if sessions.touch(&id) {
        match HeaderValue::from_str(&sessions.cookie(&id)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Failed to encode session cookie: {}", e),
        }
    }

    response
}
