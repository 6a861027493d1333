//! HTTP protocol layer module
//!
//! Cache policy, compression, MIME detection and response builders, shared by
//! the storefront and webhook services.

pub mod cache;
pub mod compress;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use cache::{CacheHeaders, CacheRules};
pub use compress::{CompressionPolicy, EncodedBody};
pub use response::{build_404_response, build_413_response, build_options_response};
