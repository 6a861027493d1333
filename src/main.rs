use std::sync::Arc;

use spa_edge::config::{self, AppState, Config};
use spa_edge::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    let runtime = server::build_runtime(&cfg)?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(AppState::new(&cfg)?);

    logger::log_info(&format!("Serving {}", state.root.display()));
    logger::log_info(&format!(
        "Proxy: {} -> {}",
        cfg.proxy.prefix, cfg.proxy.upstream_base
    ));

    server::serve(addr, state, "Storefront server").await?;
    Ok(())
}
