//! Server module
//!
//! Listener setup, the accept loop, per-connection serving and signal driven
//! shutdown, shared by both services.

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module is exposed as `server_loop`
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_listener;
pub use server_loop::run;
pub use signal::{start_signal_handler, SignalHandler};

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::logger;

/// A service the server loop can drive
///
/// Implementations never fail: every error is already a response.
pub trait RequestHandler: Send + Sync + 'static {
    fn config(&self) -> &Config;

    fn call(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> impl Future<Output = Response<Full<Bytes>>> + Send;
}

/// Build the Tokio runtime, sized by `server.workers` when set
pub fn build_runtime(config: &Config) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.server.workers {
        builder.worker_threads(workers);
    }
    builder.build()
}

/// Bind `addr` and serve `handler` until SIGINT or SIGTERM
pub async fn serve<H: RequestHandler>(
    addr: SocketAddr,
    handler: Arc<H>,
    service: &str,
) -> std::io::Result<()> {
    let listener = create_listener(addr)?;
    logger::log_server_start(service, &addr, handler.config());

    let signals = Arc::new(SignalHandler::new());
    start_signal_handler(Arc::clone(&signals));

    run(listener, handler, signals, service).await;
    Ok(())
}
