// Connection handling module
// Accepts a single TCP connection and serves it with a request handler

use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::RequestHandler;
use crate::logger::{self, AccessLogEntry};

/// Accept a connection, enforcing the connection limit.
///
/// The counter is incremented before the check so concurrent accepts cannot
/// both slip under the limit.
pub fn accept_connection<H: RequestHandler>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: &Arc<H>,
    conn_counter: &Arc<AtomicUsize>,
) {
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = handler.config().performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_debug(&format!("Accepted connection from {peer_addr}"));

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(handler),
        Arc::clone(conn_counter),
    );
}

/// Serve one connection in its own task.
///
/// HTTP/1.1 with keep-alive, bounded by the larger of the read and write
/// timeouts. The counter is decremented when the task ends.
fn handle_connection<H: RequestHandler>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let performance = &handler.config().performance;
        let keep_alive = performance.keep_alive_timeout > 0;
        let timeout_duration = Duration::from_secs(std::cmp::max(
            performance.read_timeout,
            performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        builder.keep_alive(keep_alive);

        let service_handler = Arc::clone(&handler);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let handler = Arc::clone(&service_handler);
                async move { Ok::<_, Infallible>(serve_request(handler, peer_addr, req).await) }
            }),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Run the handler for one request and write its access log line
async fn serve_request<H: RequestHandler>(
    handler: Arc<H>,
    peer_addr: SocketAddr,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let logging = &handler.config().logging;
    if !logging.access_log {
        return Arc::clone(&handler).call(req).await;
    }

    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let mut entry = AccessLogEntry::from_parts(&peer_addr, &parts);

    let response = Arc::clone(&handler).call(Request::from_parts(parts, body)).await;

    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, &logging.access_log_format);

    response
}
