//! Traffic classification and client identity.

use axum::http::{HeaderMap, Method};

use crate::config::RateLimitingConfig;

/// Sentinel client address used when no identity header is present.
///
/// All unidentified clients share one bucket: the gate trades per-client
/// precision for never rejecting a request it cannot attribute.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A named bucket of request types sharing one rate budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    /// Authentication writes (login, registration)
    Auth,
    /// Password reset writes
    PasswordReset,
    /// Programmatic API requests
    Api,
}

impl TrafficClass {
    /// Stable name used in client keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficClass::Auth => "auth",
            TrafficClass::PasswordReset => "password-reset",
            TrafficClass::Api => "api",
        }
    }
}

impl std::fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Route matching policy: which URL prefixes belong to which traffic class,
/// and the per-window budget each class grants a single client.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    auth_prefixes: Vec<String>,
    auth_limit: u32,
    password_reset_prefixes: Vec<String>,
    password_reset_limit: u32,
    api_prefixes: Vec<String>,
    api_limit: u32,
}

impl RoutePolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self {
            auth_prefixes: config.auth_prefixes.clone(),
            auth_limit: config.auth_limit,
            password_reset_prefixes: config.password_reset_prefixes.clone(),
            password_reset_limit: config.password_reset_limit,
            api_prefixes: config.api_prefixes.clone(),
            api_limit: config.api_limit,
        }
    }

    /// Classify a request into exactly one traffic class.
    ///
    /// The most specific class wins: password reset routes sit under the
    /// auth routes, and both sit under the API prefix. Anything that matches
    /// no class is not limited by the gate at all.
    pub fn classify(&self, path: &str, method: &Method) -> Option<TrafficClass> {
        let is_write = matches!(method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE");

        if is_write && matches_any(&self.password_reset_prefixes, path) {
            return Some(TrafficClass::PasswordReset);
        }
        if is_write && matches_any(&self.auth_prefixes, path) {
            return Some(TrafficClass::Auth);
        }
        if matches_any(&self.api_prefixes, path) {
            return Some(TrafficClass::Api);
        }

        None
    }

    /// Budget per window for a traffic class.
    pub fn budget(&self, class: TrafficClass) -> u32 {
        match class {
            TrafficClass::Auth => self.auth_limit,
            TrafficClass::PasswordReset => self.password_reset_limit,
            TrafficClass::Api => self.api_limit,
        }
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::from_config(&RateLimitingConfig::default())
    }
}

fn matches_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| path_matches(path, prefix))
}

/// Prefix match on whole path segments, so `/api` covers `/api/konular`
/// but not `/apikey`.
fn path_matches(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolve the client network address a budget is charged against.
///
/// Trusts the proxy-supplied `x-forwarded-for` chain (first hop), falls back
/// to `x-real-ip`, and finally to the shared [`UNKNOWN_CLIENT`] bucket.
pub fn client_addr(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    UNKNOWN_CLIENT.to_string()
}

/// Composite identity a counter is looked up under: class + client address.
pub fn client_key(class: TrafficClass, addr: &str) -> String {
    format!("{}:{}", class.as_str(), addr)
}
