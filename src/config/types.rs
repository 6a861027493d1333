// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub assets: AssetsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub proxy: ProxyConfig,
}

/// Storefront server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Webhook receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Select the sandbox secret instead of the production one
    pub use_sandbox: bool,
    #[serde(default)]
    pub sandbox_secret: String,
    #[serde(default)]
    pub production_secret: String,
    pub transactions_file: String,
}

impl WebhookConfig {
    /// The events secret for the selected environment
    pub fn active_secret(&self) -> &str {
        if self.use_sandbox {
            &self.sandbox_secret
        } else {
            &self.production_secret
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
    pub max_body_size: u64,
}

/// Static asset serving configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetsConfig {
    /// Directory served as the site root
    pub root: String,
    /// Index document looked up at the root and in directories
    pub index_file: String,
    pub compression_min_size: usize,
    pub compression_level: u32,
}

/// Cache TTL configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,
    /// Extension -> TTL (seconds), applied over the built-in table
    #[serde(default)]
    pub rules: HashMap<String, u64>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_ttl() -> u64 {
    crate::http::cache::DEFAULT_TTL
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            rules: HashMap::new(),
        }
    }
}

/// Payment API proxy configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProxyConfig {
    /// Local path prefix routed to the upstream
    pub prefix: String,
    /// Upstream base URL the remaining path is appended to
    pub upstream_base: String,
    pub timeout_secs: u64,
}
