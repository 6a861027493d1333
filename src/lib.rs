//! Storefront edge server and payment webhook receiver
//!
//! Two small hyper services sharing configuration, logging and the server
//! runtime:
//! - the storefront serves a single-page application with SPA fallback, gzip
//!   and per-extension cache headers, and proxies `/api/wompi/` to the payment API
//! - the webhook receiver verifies signed payment events and appends them to a
//!   JSON transactions file

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod webhook;
