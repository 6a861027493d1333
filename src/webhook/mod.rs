//! Payment webhook receiver
//!
//! Verifies the provider's HMAC signature over the raw body, turns the event
//! into a transaction record and appends it to the transactions file.

pub mod event;
pub mod signature;
pub mod store;

use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;

use crate::config::{Config, WebhookState};
use crate::error::ServeError;
use crate::handler::proxy::read_body;
use crate::http::response;
use crate::logger;
use crate::server::RequestHandler;
use event::WebhookEvent;

/// Entry point for the webhook service
pub async fn handle_webhook<B>(req: Request<B>, state: Arc<WebhookState>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    match receive(&parts, body, &state).await {
        Ok(resp) => resp,
        Err(err) => {
            match &err {
                ServeError::SignatureInvalid => {
                    logger::log_warning("Invalid signature - request rejected");
                }
                e if e.status().is_server_error() => {
                    logger::log_error(&format!("Error processing webhook: {e}"));
                }
                e => logger::log_debug(&format!("{} {}: {e}", parts.method, parts.uri.path())),
            }
            err.into_response()
        }
    }
}

async fn receive<B>(
    parts: &Parts,
    body: B,
    state: &WebhookState,
) -> Result<Response<Full<Bytes>>, ServeError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = parts.uri.path();
    if parts.method != Method::POST || path != state.config.webhook.path {
        return Err(ServeError::NotFound(path.to_string()));
    }

    let payload = read_body(body, state.config.performance.max_body_size).await?;

    let provided = parts
        .headers
        .get(signature::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !signature::verify(&state.secret, &payload, provided) {
        return Err(ServeError::SignatureInvalid);
    }

    let event = WebhookEvent::parse(&payload)
        .map_err(|e| ServeError::Internal(format!("invalid event payload: {e}")))?;
    let record = event.into_record();
    record.log_received();

    let reference = record.reference.clone().unwrap_or_default();
    let count = state
        .store
        .append(record)
        .await
        .map_err(|e| ServeError::Internal(e.to_string()))?;
    logger::log_info(&format!("Transaction saved: {reference} ({count} on file)"));

    Ok(response::json_response(
        StatusCode::OK,
        &serde_json::json!({ "status": "success" }),
    ))
}

impl RequestHandler for WebhookState {
    fn config(&self) -> &Config {
        &self.config
    }

    fn call(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> impl Future<Output = Response<Full<Bytes>>> + Send {
        handle_webhook(req, self)
    }
}
