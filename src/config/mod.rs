// Configuration module entry point
// Loads layered configuration and builds the immutable runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::{AppState, WebhookState};
pub use types::{
    AssetsConfig, CacheConfig, Config, LoggingConfig, PerformanceConfig, ProxyConfig,
    ServerConfig, WebhookConfig,
};

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Missing file is fine: defaults and `SERVER_*` environment variables apply
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults only, no file and no environment
    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("webhook.host", "0.0.0.0")?
            .set_default("webhook.port", 8080)?
            .set_default("webhook.path", "/webhook")?
            .set_default("webhook.use_sandbox", true)?
            .set_default("webhook.transactions_file", "transactions.json")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 60)?
            .set_default("performance.write_timeout", 60)?
            .set_default("performance.max_body_size", 10_485_760)? // 10MB
            .set_default("assets.root", ".")?
            .set_default("assets.index_file", "index.html")?
            .set_default("assets.compression_min_size", 1024)?
            .set_default("assets.compression_level", 6)?
            .set_default("proxy.prefix", "/api/wompi/")?
            .set_default("proxy.upstream_base", "https://production.wompi.co/v1/")?
            .set_default("proxy.timeout_secs", 30)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn get_webhook_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.webhook.host, self.webhook.port)
            .parse()
            .map_err(|e| format!("Invalid webhook address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.webhook.port, 8080);
        assert_eq!(cfg.webhook.path, "/webhook");
        assert_eq!(cfg.proxy.prefix, "/api/wompi/");
        assert_eq!(cfg.proxy.timeout_secs, 30);
        assert_eq!(cfg.assets.index_file, "index.html");
        assert_eq!(cfg.assets.compression_min_size, 1024);
        assert_eq!(cfg.cache.default_ttl, 3600);
        assert!(cfg.cache.rules.is_empty());
        assert!(cfg.webhook.use_sandbox);
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[assets]
root = "dist"

[cache.rules]
json = 60

[webhook]
use_sandbox = false
production_secret = "prod_secret"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().trim_end_matches(".toml").to_string();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.assets.root, "dist");
        assert_eq!(cfg.cache.rules.get("json"), Some(&60));
        assert_eq!(cfg.webhook.active_secret(), "prod_secret");
    }

    #[test]
    fn test_active_secret_selects_sandbox() {
        let mut cfg = Config::defaults().unwrap();
        cfg.webhook.sandbox_secret = "test_events_abc".to_string();
        cfg.webhook.production_secret = "prod_events_abc".to_string();
        assert_eq!(cfg.webhook.active_secret(), "test_events_abc");
        cfg.webhook.use_sandbox = false;
        assert_eq!(cfg.webhook.active_secret(), "prod_events_abc");
    }
}
