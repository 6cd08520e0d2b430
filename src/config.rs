use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Runtime settings for the console, read from `UPLINK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub api_base: String,
    pub api_prefix: String,
    pub credential_file: PathBuf,
    pub http_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            credential_file: default_credential_file(),
            http_timeout_secs: 30,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();
        if let Some(v) = get("UPLINK_API_BASE") { cfg.api_base = v.trim_end_matches('/').to_string(); }
        if let Some(v) = get("UPLINK_API_PREFIX") { cfg.api_prefix = normalize_prefix(&v); }
        if let Some(v) = get("UPLINK_CREDENTIAL_FILE") { cfg.credential_file = PathBuf::from(v); }
        if let Some(v) = get("UPLINK_HTTP_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(n) if n > 0 => cfg.http_timeout_secs = n,
                _ => tracing::warn!("ignoring invalid UPLINK_HTTP_TIMEOUT_SECS='{}'", v),
            }
        }
        cfg
    }

    pub fn http_timeout(&self) -> Duration { Duration::from_secs(self.http_timeout_secs) }
}

fn normalize_prefix(p: &str) -> String {
    let t = p.trim_matches('/');
    if t.is_empty() { String::new() } else { format!("/{}", t) }
}

#[inline]
pub fn default_credential_file() -> PathBuf {
    let root = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    root.join(".uplink-console").join("credentials.json")
}
