// Server loop module
// Accepts connections until shutdown is requested, then drains in-flight ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::{RequestHandler, SignalHandler};
use crate::logger;

/// Poll interval while waiting for connections to finish
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Serve `listener` with `handler` until `signals` requests shutdown.
///
/// After shutdown the listener is closed and active connections get up to
/// `performance.write_timeout` seconds to finish.
pub async fn run<H: RequestHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    signals: Arc<SignalHandler>,
    service: &str,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &handler, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = signals.shutdown.notified() => break,
        }
    }

    drop(listener);
    logger::log_shutdown(service, active_connections.load(Ordering::SeqCst));

    let grace = Duration::from_secs(handler.config().performance.write_timeout);
    if !drain(&active_connections, grace).await {
        logger::log_warning(&format!(
            "{} connection(s) still open after {}s, closing",
            active_connections.load(Ordering::SeqCst),
            grace.as_secs()
        ));
    }
}

/// Wait until the counter reaches zero; false if `grace` runs out first
async fn drain(active_connections: &AtomicUsize, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppState, Config};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>ok</html>").unwrap();

        let mut config = Config::defaults().unwrap();
        config.assets.root = dir.path().display().to_string();
        config.logging.access_log = false;
        config.performance.write_timeout = 1;
        let state = Arc::new(AppState::new(&config).unwrap());

        let listener = crate::server::create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let server = tokio::spawn(run(listener, state, Arc::clone(&signals), "test"));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /some/route HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(text.starts_with("HTTP/1.1 200 OK"), "{text}");
        assert!(text.ends_with("<html>ok</html>"), "{text}");

        signals.request_shutdown();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let counter = AtomicUsize::new(1);
        assert!(!drain(&counter, Duration::from_millis(120)).await);
        counter.store(0, Ordering::SeqCst);
        assert!(drain(&counter, Duration::from_millis(120)).await);
    }
}
