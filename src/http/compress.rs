//! Response compression module
//!
//! Gzip-encodes compressible payloads when the client accepts it and the result
//! is actually smaller than the original.

use flate2::write::GzEncoder;
use flate2::Compression;
use hyper::body::Bytes;
use std::collections::HashSet;
use std::io::Write;

/// Payloads at or below this size are sent as-is
pub const DEFAULT_MIN_SIZE: usize = 1024;
/// Moderate level: latency/size balance
pub const DEFAULT_LEVEL: u32 = 6;

const COMPRESSIBLE_EXTENSIONS: &[&str] = &["html", "css", "js", "json", "xml", "svg", "txt"];

/// Bytes to write plus the encoding they carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub body: Bytes,
    pub encoding: Option<&'static str>,
    /// Extension is in the compressible set, whatever was sent
    pub compressible: bool,
}

/// Compression decision table, immutable once built
#[derive(Debug, Clone)]
pub struct CompressionPolicy {
    extensions: HashSet<&'static str>,
    min_size: usize,
    level: Compression,
}

impl CompressionPolicy {
    pub fn new(min_size: usize, level: u32) -> Self {
        Self {
            extensions: COMPRESSIBLE_EXTENSIONS.iter().copied().collect(),
            min_size,
            level: Compression::new(level.min(9)),
        }
    }

    /// Whether an extension belongs to the compressible set
    pub fn is_compressible(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| self.extensions.contains(ext.to_ascii_lowercase().as_str()))
    }

    /// Encode `content` for the client.
    ///
    /// Exactly one of the compressed or original buffers is returned.
    pub fn encode(
        &self,
        content: Vec<u8>,
        extension: Option<&str>,
        accept_encoding: Option<&str>,
    ) -> EncodedBody {
        let compressible = self.is_compressible(extension);
        let eligible = compressible
            && accepts_gzip(accept_encoding)
            && content.len() > self.min_size;

        if eligible {
            match gzip(&content, self.level) {
                Ok(compressed) if compressed.len() < content.len() => {
                    return EncodedBody {
                        body: Bytes::from(compressed),
                        encoding: Some("gzip"),
                        compressible,
                    };
                }
                Ok(_) => {}
                Err(e) => crate::logger::log_warning(&format!("Gzip encoding failed: {e}")),
            }
        }

        EncodedBody {
            body: Bytes::from(content),
            encoding: None,
            compressible,
        }
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIZE, DEFAULT_LEVEL)
    }
}

/// Check whether an `Accept-Encoding` value lists gzip with a non-zero q-value
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding.is_some_and(|header| {
        header.split(',').any(|item| {
            let mut parts = item.split(';');
            let coding = parts.next().unwrap_or("").trim();
            if !coding.eq_ignore_ascii_case("gzip") && !coding.eq_ignore_ascii_case("x-gzip") {
                return false;
            }
            // q=0 means "not acceptable"
            !parts.any(|param| {
                param
                    .trim()
                    .strip_prefix("q=")
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            })
        })
    })
}

fn gzip(content: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(content.len() / 2), level);
    encoder.write_all(content)?;
    encoder.finish()
}
