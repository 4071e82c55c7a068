//! Configuration management for the FizikHub gate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the gate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the gate listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Base URL of the upstream FizikHub application
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

/// Rate limiting configuration.
///
/// The route prefixes and budgets are policy data: they describe which parts
/// of the FizikHub URL space belong to which traffic class and how many
/// requests per window each class allows a single client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Window duration in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Minimum interval between bulk sweeps of expired entries, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Hard ceiling on tracked client entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Budget per window for authentication writes
    #[serde(default = "default_auth_limit")]
    pub auth_limit: u32,

    /// Budget per window for password reset writes
    #[serde(default = "default_password_reset_limit")]
    pub password_reset_limit: u32,

    /// Budget per window for programmatic API requests
    #[serde(default = "default_api_limit")]
    pub api_limit: u32,

    /// Path prefixes classified as authentication routes
    #[serde(default = "default_auth_prefixes")]
    pub auth_prefixes: Vec<String>,

    /// Path prefixes classified as password reset routes
    #[serde(default = "default_password_reset_prefixes")]
    pub password_reset_prefixes: Vec<String>,

    /// Path prefixes classified as programmatic API routes
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_entries: default_max_entries(),
            auth_limit: default_auth_limit(),
            password_reset_limit: default_password_reset_limit(),
            api_limit: default_api_limit(),
            auth_prefixes: default_auth_prefixes(),
            password_reset_prefixes: default_password_reset_prefixes(),
            api_prefixes: default_api_prefixes(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_max_entries() -> usize {
    10_000
}

fn default_auth_limit() -> u32 {
    5
}

fn default_password_reset_limit() -> u32 {
    3
}

fn default_api_limit() -> u32 {
    30
}

fn default_auth_prefixes() -> Vec<String> {
    vec![
        "/api/auth".to_string(),
        "/giris".to_string(),
        "/kayit".to_string(),
    ]
}

fn default_password_reset_prefixes() -> Vec<String> {
    vec![
        "/api/auth/sifre-sifirlama".to_string(),
        "/sifremi-unuttum".to_string(),
    ]
}

fn default_api_prefixes() -> Vec<String> {
    vec!["/api".to_string()]
}

impl GateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GateConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::GateError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_policy() {
        let config = GateConfig::default();

        assert_eq!(config.rate_limiting.window_secs, 60);
        assert_eq!(config.rate_limiting.auth_limit, 5);
        assert_eq!(config.rate_limiting.password_reset_limit, 3);
        assert_eq!(config.rate_limiting.api_limit, 30);
        assert_eq!(config.rate_limiting.max_entries, 10_000);
        assert_eq!(config.server.listen_addr.port(), 8080);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:9000"
rate_limiting:
  api_limit: 100
"#;
        let config: GateConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.server.upstream_url, "http://127.0.0.1:3000");
        assert_eq!(config.rate_limiting.api_limit, 100);
        assert_eq!(config.rate_limiting.auth_limit, 5);
        assert!(config
            .rate_limiting
            .auth_prefixes
            .contains(&"/giris".to_string()));
    }
}
