//! Request handler module
//!
//! Storefront request processing: routing dispatch, static asset serving with
//! SPA fallback, and the payment API proxy.

pub mod proxy;
pub mod router;
pub mod static_files;

pub use router::{handle_request, select_route, Route};

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use std::future::Future;
use std::sync::Arc;

use crate::config::{AppState, Config};
use crate::server::RequestHandler;

impl RequestHandler for AppState {
    fn config(&self) -> &Config {
        &self.config
    }

    fn call(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> impl Future<Output = Response<Full<Bytes>>> + Send {
        handle_request(req, self)
    }
}
