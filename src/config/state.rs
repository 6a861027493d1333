// Application state module
// Immutable runtime state built once from Config and shared through Arc

use std::path::PathBuf;

use super::types::Config;
use crate::handler::proxy::UpstreamProxy;
use crate::http::{CacheRules, CompressionPolicy};
use crate::logger;
use crate::webhook::store::TransactionStore;

/// Storefront server state
pub struct AppState {
    pub config: Config,
    /// Served root, canonicalized when it exists
    pub root: PathBuf,
    pub cache_rules: CacheRules,
    pub compression: CompressionPolicy,
    pub proxy: UpstreamProxy,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let root = PathBuf::from(&config.assets.root);
        let root = root.canonicalize().unwrap_or_else(|e| {
            logger::log_warning(&format!(
                "Static root not found or inaccessible '{}': {e}",
                root.display()
            ));
            root
        });

        Ok(Self {
            config: config.clone(),
            root,
            cache_rules: CacheRules::new(config.cache.default_ttl, &config.cache.rules),
            compression: CompressionPolicy::new(
                config.assets.compression_min_size,
                config.assets.compression_level,
            ),
            proxy: UpstreamProxy::new(&config.proxy)?,
        })
    }
}

/// Webhook receiver state
pub struct WebhookState {
    pub config: Config,
    pub secret: String,
    pub store: TransactionStore,
}

impl WebhookState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            secret: config.webhook.active_secret().to_string(),
            store: TransactionStore::new(&config.webhook.transactions_file),
        }
    }
}
