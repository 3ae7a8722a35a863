use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Network;

/// Proxy server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub allow_lan_access: bool,

    /// Browser origin allowed to send credentialed requests
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allow_lan_access: false,
            cors_origin: default_cors_origin(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            &self.host
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the webhook API, e.g. `https://api.chainletter.io`
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: default_request_timeout(),
            gateway_timeout: default_gateway_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for session cookies; generated at startup when absent
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_session_max_age")]
    pub max_age_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            max_age_secs: default_session_max_age(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Environment-sourced credentials. When both keys are set, sessions cannot
/// override or clear them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_secret: Option<String>,

    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Default `EnvFilter` directives for the proxy's own crates.
    /// HTTP tracing stays at debug regardless of `level`.
    pub fn directives(&self) -> Vec<String> {
        let level = self.level.trim().to_ascii_lowercase();
        vec![
            format!("clstamp_proxy={}", level),
            format!("clstamp_core={}", level),
            "tower_http=debug".to_string(),
        ]
    }
}

// Default value functions
fn default_port() -> u16 { 3001 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_cors_origin() -> String { "http://localhost:3000".to_string() }
fn default_request_timeout() -> u64 { 120 }
fn default_gateway_timeout() -> u64 { 10 }
fn default_session_max_age() -> u64 { 24 * 60 * 60 }
fn default_sweep_interval() -> u64 { 15 * 60 }
fn default_log_level() -> String { "info".to_string() }

impl Config {
    /// Overlay the process environment on top of file-based settings.
    ///
    /// Recognised variables: `API_BASE_URL`, `API_KEY`, `API_SECRET`,
    /// `API_NETWORK`, `SESSION_SECRET`, `PORT`.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("API_BASE_URL") {
            self.upstream.base_url = Some(url);
        }
        if let Some(key) = var("API_KEY") {
            self.credentials.api_key = Some(key);
        }
        if let Some(secret) = var("API_SECRET") {
            self.credentials.api_secret = Some(secret);
        }
        if let Some(network) = var("API_NETWORK") {
            self.credentials.network = network.parse()?;
        }
        if let Some(secret) = var("SESSION_SECRET") {
            self.session.secret = Some(secret);
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT {:?}: {}", port, e))?;
        }
        Ok(())
    }

    /// Upstream base URL without a trailing slash
    pub fn base_url(&self) -> anyhow::Result<String> {
        match &self.upstream.base_url {
            Some(url) if !url.trim().is_empty() => Ok(url.trim_end_matches('/').to_string()),
            _ => anyhow::bail!("API_BASE_URL is not configured (set it in the environment or [upstream].base_url)"),
        }
    }
}

/// Get default config file path
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("clstamp-proxy")
        .join("config.toml")
}

/// Load config from file, or return defaults if not found, then apply
/// environment overrides.
///
/// Loading order:
/// 1. Specified path (if provided)
/// 2. ./config.toml (if exists)
/// 3. default_config_path() (usually ~/.config/clstamp-proxy/config.toml)
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = load_file_config(path)?;
    config.apply_env()?;
    Ok(config)
}

fn load_file_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    if let Some(config_path) = path {
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::info!("Loaded config from specified path {:?}", config_path);
            return Ok(config);
        } else {
            anyhow::bail!("Specified config file not found: {:?}", config_path);
        }
    }

    let local_config = PathBuf::from("config.toml");
    if local_config.exists() {
        match std::fs::read_to_string(&local_config) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from current directory {:?}", local_config);
                    return Ok(config);
                }
                Err(e) => {
                    tracing::error!("Failed to parse ./config.toml: {}. Falling back to default path.", e);
                }
            },
            Err(e) => {
                tracing::error!("Failed to read ./config.toml: {}. Falling back to default path.", e);
            }
        }
    }

    let default_path = default_config_path();
    if default_path.exists() {
        let content = std::fs::read_to_string(&default_path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::info!("Loaded config from default path {:?}", default_path);
        Ok(config)
    } else {
        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_match_browser_dev_setup() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.cors_origin, "http://localhost:3000");
        assert_eq!(config.session.max_age_secs, 86_400);
        assert_eq!(config.upstream.gateway_timeout, 10);
        assert_eq!(config.credentials.network, Network::Public);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [upstream]
            base_url = "http://file.example"
            "#,
        )
        .unwrap();

        let env = vars(&[
            ("API_BASE_URL", "http://env.example/"),
            ("API_KEY", "key-from-env"),
            ("API_SECRET", "secret-from-env"),
            ("API_NETWORK", "private"),
            ("PORT", "4000"),
        ]);
        config.apply_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.base_url().unwrap(), "http://env.example");
        assert_eq!(config.credentials.api_key.as_deref(), Some("key-from-env"));
        assert_eq!(config.credentials.network, Network::Private);
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        let env = vars(&[("API_KEY", "  "), ("SESSION_SECRET", "")]);
        config.apply_vars(|k| env.get(k).cloned()).unwrap();
        assert!(config.credentials.api_key.is_none());
        assert!(config.session.secret.is_none());
    }

    #[test]
    fn invalid_port_is_an_error() {
        let mut config = Config::default();
        let env = vars(&[("PORT", "not-a-port")]);
        assert!(config.apply_vars(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn missing_base_url_is_an_error() {
        assert!(Config::default().base_url().is_err());
    }

    #[test]
    fn logging_level_sets_crate_directives() {
        let config: Config = toml::from_str("[logging]\nlevel = \"DEBUG\"\n").unwrap();
        assert_eq!(
            config.logging.directives(),
            vec!["clstamp_proxy=debug", "clstamp_core=debug", "tower_http=debug"]
        );
        assert_eq!(Config::default().logging.directives()[0], "clstamp_proxy=info");
    }
}
