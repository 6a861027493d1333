//! Request routing dispatch module
//!
//! Entry point for storefront request processing: body size check, route
//! selection, dispatch, and conversion of failures into responses.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_LENGTH;
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use std::sync::Arc;

use crate::config::AppState;
use crate::error::ServeError;
use crate::handler::{proxy, static_files};
use crate::http;
use crate::logger;

/// Where a request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Proxy,
    Preflight,
    Static,
    /// Proxy prefix with a method other than GET, POST or OPTIONS
    InvalidMethod,
    NotFound,
}

/// Select the handler for a method and path
pub fn select_route(method: &Method, path: &str, proxy_prefix: &str) -> Route {
    let proxied = path.starts_with(proxy_prefix);
    match *method {
        Method::GET | Method::POST if proxied => Route::Proxy,
        Method::OPTIONS => Route::Preflight,
        Method::GET => Route::Static,
        _ if proxied => Route::InvalidMethod,
        _ => Route::NotFound,
    }
}

/// Main entry point for storefront request handling
pub async fn handle_request<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    match dispatch(&parts, body, &state).await {
        Ok(resp) => resp,
        Err(err) => {
            report(&parts, &err);
            err.into_response()
        }
    }
}

async fn dispatch<B>(
    parts: &Parts,
    body: B,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, ServeError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    check_body_size(parts, state.config.performance.max_body_size)?;

    let path = parts.uri.path();
    match select_route(&parts.method, path, state.proxy.prefix()) {
        Route::Proxy => proxy::handle(parts, body, state).await,
        Route::Preflight => Ok(http::build_options_response()),
        Route::Static => static_files::serve(parts, state).await,
        Route::InvalidMethod => Err(ServeError::InvalidMethod {
            method: parts.method.clone(),
            path: path.to_string(),
        }),
        Route::NotFound => Err(ServeError::NotFound(path.to_string())),
    }
}

/// Reject a declared `Content-Length` above the limit
///
/// Unparsable values are skipped; the body reader enforces the limit again.
fn check_body_size(parts: &Parts, max_body_size: u64) -> Result<(), ServeError> {
    let Some(value) = parts.headers.get(CONTENT_LENGTH) else {
        return Ok(());
    };
    let Some(size) = value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok()) else {
        logger::log_warning(&format!(
            "Invalid Content-Length value: {value:?}, skipping size check"
        ));
        return Ok(());
    };
    if size > max_body_size {
        return Err(ServeError::PayloadTooLarge {
            max: max_body_size,
        });
    }
    Ok(())
}

fn report(parts: &Parts, err: &ServeError) {
    let message = format!("{} {}: {err}", parts.method, parts.uri.path());
    match err {
        // upstream failures are logged by the proxy
        ServeError::UpstreamUnavailable(_) | ServeError::UpstreamError { .. } => {}
        e if e.status().is_server_error() => logger::log_error(&message),
        ServeError::NotFound(_) => logger::log_debug(&message),
        _ => logger::log_warning(&message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::proxy::tests::fake_upstream;
    use flate2::read::GzDecoder;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use std::io::Read;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::time::Duration;

    const PREFIX: &str = "/api/wompi/";

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>storefront</html>").unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/app.js"), "x".repeat(2000)).unwrap();
        std::fs::write(dir.path().join("assets/small.js"), "y".repeat(500)).unwrap();
        std::fs::write(dir.path().join("assets/site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("assets/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(dir.path().join("robots.bin"), "bytes").unwrap();
        dir
    }

    fn state_for(root: &Path, upstream: Option<SocketAddr>) -> Arc<AppState> {
        let mut config = Config::defaults().unwrap();
        config.assets.root = root.display().to_string();
        if let Some(addr) = upstream {
            config.proxy.upstream_base = format!("http://{addr}/v1/");
            config.proxy.timeout_secs = 5;
        }
        config.performance.max_body_size = 1024;
        Arc::new(AppState::new(&config).unwrap())
    }

    fn request(method: Method, uri: &str) -> hyper::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    async fn send(
        state: &Arc<AppState>,
        req: hyper::http::request::Builder,
        body: &'static str,
    ) -> (StatusCode, hyper::HeaderMap, Bytes) {
        let req = req.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap();
        let resp = handle_request(req, Arc::clone(state)).await;
        let (parts, body) = resp.into_parts();
        (parts.status, parts.headers, body.collect().await.unwrap().to_bytes())
    }

    #[test]
    fn test_select_route() {
        assert_eq!(select_route(&Method::GET, "/api/wompi/transactions", PREFIX), Route::Proxy);
        assert_eq!(select_route(&Method::POST, "/api/wompi/transactions", PREFIX), Route::Proxy);
        assert_eq!(select_route(&Method::OPTIONS, "/api/wompi/transactions", PREFIX), Route::Preflight);
        assert_eq!(select_route(&Method::OPTIONS, "/anything", PREFIX), Route::Preflight);
        assert_eq!(select_route(&Method::GET, "/cart/checkout", PREFIX), Route::Static);
        assert_eq!(select_route(&Method::GET, "/api/wompi", PREFIX), Route::Static);
        assert_eq!(select_route(&Method::PUT, "/api/wompi/x", PREFIX), Route::InvalidMethod);
        assert_eq!(select_route(&Method::DELETE, "/api/wompi/x", PREFIX), Route::InvalidMethod);
        assert_eq!(select_route(&Method::POST, "/cart", PREFIX), Route::NotFound);
        assert_eq!(select_route(&Method::HEAD, "/", PREFIX), Route::NotFound);
    }

    #[tokio::test]
    async fn test_spa_fallback_serves_index() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let (status, headers, body) = send(&state, request(Method::GET, "/cart/checkout"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"<html>storefront</html>");
        assert_eq!(headers["content-type"], "text/html; charset=utf-8");
        assert_eq!(headers["cache-control"], "no-cache, no-store, must-revalidate");
        assert_eq!(headers["pragma"], "no-cache");
        assert_eq!(headers["expires"], "0");
    }

    #[tokio::test]
    async fn test_root_and_index_identical() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let (_, _, root) = send(&state, request(Method::GET, "/"), "").await;
        let (_, _, index) = send(&state, request(Method::GET, "/index.html"), "").await;
        assert_eq!(root, index);
    }

    #[tokio::test]
    async fn test_cache_headers_by_extension() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let (_, headers, _) = send(&state, request(Method::GET, "/assets/site.css"), "").await;
        assert_eq!(headers["cache-control"], "public, max-age=31536000");
        assert!(headers["expires"].to_str().unwrap().ends_with(" GMT"));
        assert!(headers.get("pragma").is_none());

        let (_, headers, _) = send(&state, request(Method::GET, "/assets/logo.png"), "").await;
        assert_eq!(headers["cache-control"], "public, max-age=2592000");
        assert_eq!(headers["content-type"], "image/png");

        let (_, headers, _) = send(&state, request(Method::GET, "/robots.bin"), "").await;
        assert_eq!(headers["cache-control"], "public, max-age=3600");

        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    }

    #[tokio::test]
    async fn test_every_builtin_rule() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        let state = state_for(dir.path(), None);

        for (ext, ttl) in crate::http::cache::BUILTIN_RULES {
            std::fs::write(dir.path().join(format!("assets/file.{ext}")), "content").unwrap();
            let uri = format!("/assets/file.{ext}");
            let (status, headers, _) = send(&state, request(Method::GET, &uri), "").await;
            assert_eq!(status, StatusCode::OK, "{ext}");
            assert_eq!(headers["x-content-type-options"], "nosniff", "{ext}");

            if *ttl == 0 {
                assert_eq!(headers["cache-control"], "no-cache, no-store, must-revalidate", "{ext}");
                assert_eq!(headers["pragma"], "no-cache", "{ext}");
                assert_eq!(headers["expires"], "0", "{ext}");
                continue;
            }

            assert_eq!(headers["cache-control"], format!("public, max-age={ttl}").as_str(), "{ext}");
            assert!(headers.get("pragma").is_none(), "{ext}");
            let expires = chrono::DateTime::parse_from_rfc2822(headers["expires"].to_str().unwrap())
                .unwrap()
                .with_timezone(&chrono::Utc);
            let expected = chrono::Utc::now() + chrono::TimeDelta::seconds(i64::try_from(*ttl).unwrap());
            let drift = (expires - expected).num_seconds().abs();
            assert!(drift <= 5, "{ext}: Expires {expires} is {drift}s from {expected}");

            let vary = headers.get("vary").is_some();
            assert_eq!(vary, matches!(*ext, "css" | "js" | "svg"), "{ext}");
        }
    }

    #[tokio::test]
    async fn test_gzip_large_js() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let req = request(Method::GET, "/assets/app.js").header("accept-encoding", "gzip, deflate");
        let (status, headers, body) = send(&state, req, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-encoding"], "gzip");
        assert_eq!(headers["content-length"], body.len().to_string().as_str());

        let mut decoded = String::new();
        GzDecoder::new(&body[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "x".repeat(2000));

        let (_, headers, body) = send(&state, request(Method::GET, "/assets/app.js"), "").await;
        assert!(headers.get("content-encoding").is_none());
        assert_eq!(body.len(), 2000);
    }

    #[tokio::test]
    async fn test_small_file_never_compressed() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let req = request(Method::GET, "/assets/small.js").header("accept-encoding", "gzip");
        let (_, headers, body) = send(&state, req, "").await;
        assert!(headers.get("content-encoding").is_none());
        assert_eq!(body.len(), 500);
    }

    #[tokio::test]
    async fn test_traversal_stays_in_root() {
        let dir = site();
        let state = state_for(dir.path(), None);

        for uri in ["/../../etc/passwd", "/assets/../../../etc/passwd", "/%2e%2e/%2e%2e/etc/passwd"] {
            let (status, _, body) = send(&state, request(Method::GET, uri), "").await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(&body[..], b"<html>storefront</html>", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_preflight() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let (status, headers, body) =
            send(&state, request(Method::OPTIONS, "/api/wompi/transactions"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type, Authorization");
        assert_eq!(headers["access-control-max-age"], "86400");
    }

    #[tokio::test]
    async fn test_other_methods_are_not_found() {
        let dir = site();
        let state = state_for(dir.path(), None);

        for (method, uri) in [
            (Method::PUT, "/api/wompi/transactions"),
            (Method::POST, "/index.html"),
            (Method::DELETE, "/"),
            (Method::HEAD, "/"),
        ] {
            let (status, _, _) = send(&state, request(method.clone(), uri), "").await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path(), None);

        let (status, _, _) = send(&state, request(Method::GET, "/"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_declared_body_too_large() {
        let dir = site();
        let state = state_for(dir.path(), None);

        let req = request(Method::POST, "/api/wompi/transactions").header("content-length", "4096");
        let (status, _, _) = send(&state, req, "").await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_proxy_round_trip() {
        let (addr, seen) = fake_upstream(200, r#"{"data":{"status":"PENDING"}}"#, Duration::ZERO).await;
        let dir = site();
        let state = state_for(dir.path(), Some(addr));

        let req = request(Method::POST, "/api/wompi/transactions")
            .header("authorization", "Bearer X")
            .header("content-type", "application/json");
        let (status, headers, body) = send(&state, req, r#"{"amount":1000}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], br#"{"data":{"status":"PENDING"}}"#);
        assert_eq!(headers["access-control-allow-origin"], "*");

        let calls = seen.lock().unwrap().clone();
        assert_eq!(calls[0].path_and_query, "/v1/transactions");
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer X"));
        assert_eq!(calls[0].body, br#"{"amount":1000}"#);
    }

    #[tokio::test]
    async fn test_proxy_declined_passthrough() {
        let (addr, _) = fake_upstream(402, r#"{"error":"declined"}"#, Duration::ZERO).await;
        let dir = site();
        let state = state_for(dir.path(), Some(addr));

        let (status, _, body) =
            send(&state, request(Method::POST, "/api/wompi/transactions"), r#"{"amount":1000}"#).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(&body[..], br#"{"error":"declined"}"#);
    }
}
