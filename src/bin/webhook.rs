use std::sync::Arc;

use spa_edge::config::{self, Config, WebhookState};
use spa_edge::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    let mode = if cfg.webhook.use_sandbox {
        "sandbox"
    } else {
        "production"
    };
    if cfg.webhook.active_secret().is_empty() {
        return Err(format!(
            "no events secret configured for {mode} mode (set webhook.{mode}_secret)"
        )
        .into());
    }

    let runtime = server::build_runtime(&cfg)?;
    runtime.block_on(async_main(cfg, mode))
}

async fn async_main(cfg: Config, mode: &str) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_webhook_socket_addr()?;
    let state = Arc::new(WebhookState::new(&cfg));

    logger::log_info(&format!(
        "Events endpoint: POST {} ({mode} secret)",
        cfg.webhook.path
    ));
    logger::log_info(&format!("Transactions file: {}", state.store.path().display()));

    server::serve(addr, state, "Webhook receiver").await?;
    Ok(())
}
