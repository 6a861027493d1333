//! Payment API proxy module
//!
//! Forwards `GET`/`POST` requests under the proxy prefix to the upstream
//! payment API and relays its answer byte for byte.

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::{Method, Response};
use std::time::Duration;

use crate::config::{AppState, ProxyConfig};
use crate::error::ServeError;
use crate::http::response;
use crate::logger;

/// Upstream payment API client
///
/// Holds no per-request state; the inner client only pools connections.
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    client: reqwest::Client,
    base_url: String,
    prefix: String,
    timeout: Duration,
}

impl UpstreamProxy {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.upstream_base.trim_end_matches('/').to_string(),
            prefix: config.prefix.clone(),
            timeout,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Upstream URL for a local path (query string included)
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        let remainder = path_and_query
            .strip_prefix(&self.prefix)
            .unwrap_or(path_and_query)
            .trim_start_matches('/');
        format!("{}/{remainder}", self.base_url)
    }

    /// Forward one call upstream.
    ///
    /// Only POST carries a body. The call runs in its own task, so a client
    /// disconnect does not cancel it.
    pub async fn forward(
        &self,
        method: &Method,
        path_and_query: &str,
        authorization: Option<&str>,
        body: Bytes,
    ) -> Result<Response<Full<Bytes>>, ServeError> {
        let url = self.upstream_url(path_and_query);
        let is_post = *method == Method::POST;

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");
        if is_post {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        if let Some(auth) = authorization {
            request = request.header(AUTHORIZATION, auth);
        }

        let call = tokio::spawn(async move {
            let upstream = request.send().await?;
            let status = upstream.status();
            let body = upstream.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        });

        let (status, body) = call
            .await
            .map_err(|e| ServeError::Internal(format!("upstream task failed: {e}")))?
            .map_err(|e| self.classify_error(&e))?;

        logger::log_proxy(method.as_str(), &url, status.as_u16());

        if !status.is_success() {
            logger::log_warning(&format!(
                "Upstream HTTP {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            ));
            return Err(ServeError::UpstreamError { status, body });
        }

        let allow_methods = if is_post {
            "POST, OPTIONS"
        } else {
            response::CORS_ALLOW_METHODS
        };
        Ok(response::build_proxy_response(status, body, allow_methods))
    }

    fn classify_error(&self, err: &reqwest::Error) -> ServeError {
        let message = if err.is_timeout() {
            format!("upstream timed out after {}s", self.timeout.as_secs())
        } else if err.is_connect() {
            format!("failed to connect to upstream: {err}")
        } else {
            format!("upstream request failed: {err}")
        };
        logger::log_error(&message);
        ServeError::UpstreamUnavailable(message)
    }
}

/// Proxy a request, reading the body for POST
pub async fn handle<B>(
    parts: &Parts,
    body: B,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, ServeError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let payload = if parts.method == Method::POST {
        read_body(body, state.config.performance.max_body_size).await?
    } else {
        Bytes::new()
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    state
        .proxy
        .forward(&parts.method, path_and_query, authorization, payload)
        .await
}

/// Collect a request body, refusing anything above `max` bytes
pub async fn read_body<B>(body: B, max: u64) -> Result<Bytes, ServeError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => {
            Err(ServeError::PayloadTooLarge { max })
        }
        Err(e) => Err(ServeError::Internal(format!("failed to read request body: {e}"))),
    }
}
